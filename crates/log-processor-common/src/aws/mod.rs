// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! AWS SDK backed implementations of the service traits.
//!
//! The SDK's own retry layer is disabled in [`load_sdk_config`]; retrying is
//! owned by [`crate::clients::Retrying`]. Every SDK error is mapped onto a
//! [`FailureKind`] here so the retry loop never needs to know SDK error shapes.

mod lambda;
mod s3;
mod sns;
mod sqs;

pub use lambda::LambdaInvoker;
pub use s3::S3ObjectStore;
pub use sns::SnsNotifier;
pub use sqs::SqsQueue;

use std::error::Error as StdError;
use std::time::Duration;

use aws_config::retry::RetryConfig;
use aws_config::timeout::TimeoutConfig;
use aws_config::{BehaviorVersion, SdkConfig};
use aws_smithy_runtime_api::client::orchestrator::HttpResponse;
use aws_smithy_runtime_api::client::result::SdkError;
use aws_smithy_types::error::metadata::ProvideErrorMetadata;

use crate::retry::{CallFailure, FailureKind};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Error codes AWS services use to ask clients to slow down.
const THROTTLING_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "ThrottledException",
    "RequestThrottledException",
    "TooManyRequestsException",
    "ProvisionedThroughputExceededException",
    "TransactionInProgressException",
    "RequestLimitExceeded",
    "BandwidthLimitExceeded",
    "LimitExceededException",
    "RequestThrottled",
    "SlowDown",
    "PriorRequestNotComplete",
    "EC2ThrottledException",
];

/// Error codes for requests that timed out on the service side before being handled.
const TRANSIENT_CODES: &[&str] = &["RequestTimeout", "RequestTimeoutException"];

/// Loads region and credentials from the environment with SDK retries turned off.
pub async fn load_sdk_config() -> SdkConfig {
    aws_config::defaults(BehaviorVersion::latest())
        .retry_config(RetryConfig::disabled())
        .timeout_config(
            TimeoutConfig::builder()
                .connect_timeout(CONNECT_TIMEOUT)
                .build(),
        )
        .load()
        .await
}

/// Maps an SDK error onto the retry taxonomy.
pub fn classify_sdk_error<E>(err: &SdkError<E, HttpResponse>) -> FailureKind
where
    E: ProvideErrorMetadata,
{
    match err {
        SdkError::TimeoutError(_) => FailureKind::Timeout,
        SdkError::DispatchFailure(failure) if failure.is_timeout() => FailureKind::Timeout,
        SdkError::DispatchFailure(failure) if failure.is_user() => FailureKind::Rejected,
        SdkError::DispatchFailure(_) => FailureKind::Connection,
        // the service answered but the response could not be read in full
        SdkError::ResponseError(_) => FailureKind::Connection,
        SdkError::ServiceError(context) => {
            classify_service_error(context.err().code(), context.raw().status().as_u16())
        }
        _ => FailureKind::Rejected,
    }
}

fn classify_service_error(code: Option<&str>, status: u16) -> FailureKind {
    if let Some(code) = code {
        if THROTTLING_CODES.contains(&code) {
            return FailureKind::Throttled;
        }
        if TRANSIENT_CODES.contains(&code) {
            return FailureKind::Timeout;
        }
    }
    match status {
        429 => FailureKind::Throttled,
        500..=599 => FailureKind::ServerError(status),
        _ => FailureKind::Rejected,
    }
}

/// Converts an SDK error into a [`CallFailure`], keeping the SDK error as source.
pub(crate) fn call_failure<E>(err: SdkError<E, HttpResponse>) -> CallFailure
where
    E: ProvideErrorMetadata + StdError + Send + Sync + 'static,
{
    let kind = classify_sdk_error(&err);
    CallFailure::with_source(kind, err)
}
