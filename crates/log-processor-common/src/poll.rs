// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Long-poll wait derivation for queue receives.

use std::fmt;
use std::time::Duration;

/// Shortest wait we ever ask the queue for. Zero would turn the consumer into a busy loop.
pub const MIN_WAIT_SECS: i32 = 1;
/// Longest long-poll wait SQS accepts on `ReceiveMessage`.
pub const MAX_WAIT_SECS: i32 = 20;

/// How long a queue receive blocks server-side waiting for messages.
///
/// Always within `[MIN_WAIT_SECS, MAX_WAIT_SECS]`.
///
/// # Examples
///
/// ```
/// use log_processor_common::poll::WaitTime;
///
/// assert_eq!(WaitTime::from_delay_secs(0).as_secs(), 1);
/// assert_eq!(WaitTime::from_delay_secs(7).as_secs(), 7);
/// assert_eq!(WaitTime::from_delay_secs(45).as_secs(), 20);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WaitTime(i32);

impl WaitTime {
    /// Clamps the operator-configured queue delay into a legal long-poll wait.
    pub fn from_delay_secs(configured_delay_secs: i64) -> Self {
        let clamped =
            configured_delay_secs.clamp(i64::from(MIN_WAIT_SECS), i64::from(MAX_WAIT_SECS));
        // lossless: clamped fits in [1, 20]
        WaitTime(clamped as i32)
    }

    pub fn as_secs(self) -> i32 {
        self.0
    }

    pub fn as_duration(self) -> Duration {
        Duration::from_secs(self.0.unsigned_abs().into())
    }
}

impl fmt::Display for WaitTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_zero_delay_waits_one_second() {
        assert_eq!(WaitTime::from_delay_secs(0).as_secs(), 1);
    }

    #[test]
    fn test_large_delay_capped_at_twenty() {
        assert_eq!(WaitTime::from_delay_secs(45).as_secs(), 20);
    }

    #[test]
    fn test_in_range_delay_unchanged() {
        assert_eq!(WaitTime::from_delay_secs(7).as_secs(), 7);
    }

    #[test]
    fn test_extreme_inputs() {
        assert_eq!(WaitTime::from_delay_secs(i64::MIN).as_secs(), MIN_WAIT_SECS);
        assert_eq!(WaitTime::from_delay_secs(i64::MAX).as_secs(), MAX_WAIT_SECS);
        assert_eq!(WaitTime::from_delay_secs(1).as_secs(), 1);
        assert_eq!(WaitTime::from_delay_secs(20).as_secs(), 20);
    }

    #[test]
    fn test_as_duration() {
        assert_eq!(
            WaitTime::from_delay_secs(5).as_duration(),
            Duration::from_secs(5)
        );
        assert_eq!(WaitTime::from_delay_secs(-3).to_string(), "1s");
    }

    proptest! {
        #[test]
        fn prop_below_range_is_one(delay in i64::MIN..1i64) {
            prop_assert_eq!(WaitTime::from_delay_secs(delay).as_secs(), 1);
        }

        #[test]
        fn prop_above_range_is_twenty(delay in 21i64..=i64::MAX) {
            prop_assert_eq!(WaitTime::from_delay_secs(delay).as_secs(), 20);
        }

        #[test]
        fn prop_identity_on_valid_range(delay in 1i64..=20) {
            prop_assert_eq!(i64::from(WaitTime::from_delay_secs(delay).as_secs()), delay);
        }
    }
}
