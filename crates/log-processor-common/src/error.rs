// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::config::ConfigError;

/// Errors that stop the processor from starting
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
}
