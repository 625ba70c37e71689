// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Bounded exponential backoff around outbound calls.
//!
//! Adapters report each failed attempt as a [`CallFailure`] tagged with a
//! [`FailureKind`]. [`retry`] dispatches on that tag only: connection-level
//! kinds are retried with backoff, everything else surfaces immediately. The
//! caller always gets exactly one terminal outcome, and a [`ServiceError`] keeps
//! the original kind so "still failing after retries" and "rejected" can be told
//! apart without looking at message text.

use std::error::Error as StdError;
use std::fmt;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

/// Total attempts made for a single outbound call.
///
/// Together with the default backoff this bounds the cumulative wait to roughly
/// seven minutes.
pub const MAX_RETRIES: u32 = 13;

const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(250);
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(100);

pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Classification of a single failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Could not establish or keep a connection (reset, refused, DNS, truncated response).
    Connection,
    /// Connect or request timed out before the service answered.
    Timeout,
    /// The service asked us to slow down.
    Throttled,
    /// The service failed on its side with the given HTTP status.
    ServerError(u16),
    /// The service rejected a well-formed call: bad request, access denied, not found.
    Rejected,
}

impl FailureKind {
    pub fn is_retryable(self) -> bool {
        !matches!(self, FailureKind::Rejected)
    }

    /// True for failures that never reached a protocol-level answer.
    pub fn is_transient_connection(self) -> bool {
        matches!(self, FailureKind::Connection | FailureKind::Timeout)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Connection => write!(f, "connection error"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Throttled => write!(f, "throttled"),
            FailureKind::ServerError(status) => write!(f, "server error {status}"),
            FailureKind::Rejected => write!(f, "rejected"),
        }
    }
}

/// Error raised by one attempt of an outbound call.
#[derive(Debug, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct CallFailure {
    kind: FailureKind,
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl CallFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        CallFailure {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source<E>(kind: FailureKind, source: E) -> Self
    where
        E: Into<BoxError>,
    {
        let source = source.into();
        CallFailure {
            kind,
            message: source.to_string(),
            source: Some(source),
        }
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Connection, message)
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Rejected, message)
    }

    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Terminal outcome of a wrapped call that did not succeed.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{operation} still failing after {attempts} attempts: {failure}")]
    Exhausted {
        operation: &'static str,
        attempts: u32,
        #[source]
        failure: CallFailure,
    },

    #[error("{operation} failed: {failure}")]
    Permanent {
        operation: &'static str,
        #[source]
        failure: CallFailure,
    },
}

impl ServiceError {
    pub fn is_exhausted(&self) -> bool {
        matches!(self, ServiceError::Exhausted { .. })
    }

    pub fn is_permanent(&self) -> bool {
        matches!(self, ServiceError::Permanent { .. })
    }

    pub fn operation(&self) -> &'static str {
        match self {
            ServiceError::Exhausted { operation, .. } | ServiceError::Permanent { operation, .. } => {
                operation
            }
        }
    }

    /// The last attempt's failure.
    pub fn failure(&self) -> &CallFailure {
        match self {
            ServiceError::Exhausted { failure, .. } | ServiceError::Permanent { failure, .. } => {
                failure
            }
        }
    }

    pub fn kind(&self) -> FailureKind {
        self.failure().kind()
    }
}

/// Decision returned by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    NoRetry,
    RetryAfter(Duration),
}

/// Exponential backoff with equal jitter, capped per wait and bounded in attempts.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Wait before the second attempt, doubled for each one after.
    pub base_delay: Duration,
    /// Upper bound on a single wait.
    pub max_delay: Duration,
    /// Draw each wait from `[d/2, d]` instead of waiting exactly `d`.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Un-jittered wait after failed attempt number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        self.base_delay
            .saturating_mul(1u32 << exp)
            .min(self.max_delay)
    }

    /// Longest total time a call can spend waiting between attempts.
    pub fn worst_case_delay(&self) -> Duration {
        (1..self.max_attempts)
            .map(|attempt| self.backoff(attempt))
            .fold(Duration::ZERO, Duration::saturating_add)
    }

    /// `attempt` is 1-based and counts the attempt that just failed.
    pub fn decide(&self, attempt: u32, kind: FailureKind) -> RetryDecision {
        if !kind.is_retryable() || attempt >= self.max_attempts {
            return RetryDecision::NoRetry;
        }
        let delay = self.backoff(attempt);
        if self.jitter {
            RetryDecision::RetryAfter(equal_jitter(delay))
        } else {
            RetryDecision::RetryAfter(delay)
        }
    }
}

fn equal_jitter(delay: Duration) -> Duration {
    let half = delay / 2;
    let spread = delay.saturating_sub(half);
    if spread.is_zero() {
        return delay;
    }
    half + rand::thread_rng().gen_range(Duration::ZERO..=spread)
}

/// Runs `call` until it succeeds, fails permanently, or the policy runs out of attempts.
pub async fn retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &'static str,
    mut call: F,
) -> Result<T, ServiceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CallFailure>>,
{
    let mut attempt = 1u32;
    loop {
        match call().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!("{operation} succeeded on attempt {attempt}");
                }
                return Ok(value);
            }
            Err(failure) => match policy.decide(attempt, failure.kind()) {
                RetryDecision::RetryAfter(delay) => {
                    warn!(
                        "{operation} attempt {attempt}/{} failed ({failure}), retrying in {} ms",
                        policy.max_attempts,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                RetryDecision::NoRetry if failure.kind().is_retryable() => {
                    return Err(ServiceError::Exhausted {
                        operation,
                        attempts: attempt,
                        failure,
                    });
                }
                RetryDecision::NoRetry => {
                    return Err(ServiceError::Permanent { operation, failure });
                }
            },
        }
    }
}
