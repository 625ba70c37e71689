// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::env;
use std::str::FromStr;

pub const MEMORY_SIZE_VAR: &str = "AWS_LAMBDA_FUNCTION_MEMORY_SIZE";
pub const PROCESSED_DATA_BUCKET_VAR: &str = "PROCESSED_DATA_BUCKET";
pub const SQS_QUEUE_URL_VAR: &str = "SQS_QUEUE_URL";
pub const SQS_DELAY_SEC_VAR: &str = "SQS_DELAY_SEC";
pub const SNS_TOPIC_ARN_VAR: &str = "SNS_TOPIC_ARN";
pub const LOG_LEVEL_VAR: &str = "LOG_LEVEL";
pub const DEFAULT_LOG_LEVEL: &str = "info";

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} environment variable is not set")]
    Missing(&'static str),

    #[error("{key} has invalid value '{value}': {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Configuration read from the function environment at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvConfig {
    /// Memory configured for the function, in MB
    pub memory_size_mb: i64,
    /// Bucket processed logs are written to
    pub processed_data_bucket: String,
    /// Queue delivering object notifications
    pub sqs_queue_url: String,
    /// Queue delay as configured by the operator; the poll wait is derived from it
    pub sqs_delay_secs: i64,
    /// Topic notified about processed objects
    pub sns_topic_arn: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl EnvConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Create configuration from an arbitrary key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = EnvConfig {
            memory_size_mb: parse_required(&lookup, MEMORY_SIZE_VAR)?,
            processed_data_bucket: required(&lookup, PROCESSED_DATA_BUCKET_VAR)?,
            sqs_queue_url: required(&lookup, SQS_QUEUE_URL_VAR)?,
            sqs_delay_secs: parse_required(&lookup, SQS_DELAY_SEC_VAR)?,
            sns_topic_arn: required(&lookup, SNS_TOPIC_ARN_VAR)?,
            log_level: lookup(LOG_LEVEL_VAR)
                .map(|val| normalize_log_level(&val))
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !VALID_LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(ConfigError::Invalid {
                key: LOG_LEVEL_VAR,
                value: self.log_level.clone(),
                reason: "must be one of: trace, debug, info, warn, error".to_string(),
            });
        }

        Ok(())
    }
}

/// Canonical form of a `LOG_LEVEL` value.
pub fn normalize_log_level(raw: &str) -> String {
    raw.trim().to_lowercase()
}

fn required<F>(lookup: &F, key: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(val) if !val.trim().is_empty() => Ok(val.trim().to_string()),
        _ => Err(ConfigError::Missing(key)),
    }
}

fn parse_required<F, T>(lookup: &F, key: &'static str) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = required(lookup, key)?;
    raw.parse::<T>().map_err(|e| ConfigError::Invalid {
        key,
        value: raw.clone(),
        reason: e.to_string(),
    })
}
