// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Shared plumbing for the serverless log processor.
//!
//! Every outbound call to object storage, the queue, the notification topic or
//! the function-invocation service goes through [`clients::Retrying`], which
//! applies the bounded exponential backoff in [`retry`]. The queue long-poll
//! duration is derived once from configuration by [`poll::WaitTime`]. Both live
//! inside a [`context::ProcessorContext`] that is built once at startup and
//! shared read-only by every worker.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod aws;
pub mod clients;
pub mod config;
pub mod context;
pub mod data_stream;
pub mod error;
pub mod poll;
pub mod retry;
pub mod s3_event;
pub mod worker;

pub use config::EnvConfig;
pub use context::ProcessorContext;
pub use data_stream::{DataStream, ObjectLocation, SourceIntegration};
pub use error::SetupError;
pub use poll::WaitTime;
pub use retry::{CallFailure, FailureKind, RetryPolicy, ServiceError, MAX_RETRIES};
