//! Exponential reconnect backoff with jitter.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;

use vibecraft_core::config::BackoffConfig;
use vibecraft_core::{Error, Result};

/// Delay curve: `min(max, base * multiplier^(failures-1))`, then +/- jitter.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    base_secs: f64,
    max_secs: f64,
    multiplier: f64,
    jitter: f64,
}

impl BackoffPolicy {
    pub fn new(base_secs: f64, max_secs: f64, multiplier: f64, jitter: f64) -> Self {
        Self {
            base_secs: base_secs.max(0.0),
            max_secs: max_secs.max(0.0),
            multiplier: multiplier.max(1.0),
            jitter: jitter.clamp(0.0, 1.0),
        }
    }

    pub fn from_config(config: &BackoffConfig) -> Self {
        Self::new(
            config.base_secs,
            config.max_secs,
            config.multiplier,
            config.jitter,
        )
    }

    /// Un-jittered delay after `failures` consecutive failures.
    pub fn base_delay(&self, failures: u32) -> Duration {
        if failures == 0 {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(failures - 1).unwrap_or(i32::MAX);
        let delay = (self.base_secs * self.multiplier.powi(exponent)).min(self.max_secs);
        Duration::from_secs_f64(delay)
    }

    /// Delay with uniform jitter applied, floored at zero.
    pub fn jittered_delay<R: Rng + ?Sized>(&self, failures: u32, rng: &mut R) -> Duration {
        let delay = self.base_delay(failures).as_secs_f64();
        let spread = delay * self.jitter;
        let jittered = if spread > 0.0 {
            delay + rng.gen_range(-spread..=spread)
        } else {
            delay
        };
        Duration::from_secs_f64(jittered.max(0.0))
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::from_config(&BackoffConfig::default())
    }
}

/// Snapshot reported to operators.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BackoffStatus {
    pub consecutive_failures: u32,
    pub in_backoff: bool,
    pub backoff_remaining: f64,
    pub last_failure_time: Option<DateTime<Utc>>,
}

/// Failure counter gating reconnect attempts.
#[derive(Debug, Default)]
pub struct BackoffState {
    consecutive_failures: u32,
    last_failure_at: Option<DateTime<Utc>>,
    backoff_until: Option<Instant>,
}

impl BackoffState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    fn remaining(&self, now: Instant) -> Duration {
        self.backoff_until
            .map(|until| until.saturating_duration_since(now))
            .unwrap_or(Duration::ZERO)
    }

    /// Refuse with `BackoffActive` while the backoff window is open.
    pub fn check(&self, now: Instant) -> Result<()> {
        let remaining = self.remaining(now);
        if remaining.is_zero() {
            return Ok(());
        }
        Err(Error::BackoffActive {
            remaining_secs: remaining.as_secs_f64(),
            failures: self.consecutive_failures,
        })
    }

    /// Count a failed attempt and open a new window. Returns its length.
    pub fn record_failure(&mut self, policy: &BackoffPolicy, now: Instant) -> Duration {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_failure_at = Some(Utc::now());
        let delay = policy.jittered_delay(self.consecutive_failures, &mut rand::thread_rng());
        self.backoff_until = Some(now + delay);
        tracing::debug!(
            failures = self.consecutive_failures,
            delay_secs = delay.as_secs_f64(),
            "Connection failure, backing off"
        );
        delay
    }

    pub fn reset(&mut self) {
        if self.consecutive_failures > 0 {
            tracing::debug!(
                failures = self.consecutive_failures,
                "Connection succeeded, resetting backoff"
            );
        }
        *self = Self::default();
    }

    pub fn status(&self, now: Instant) -> BackoffStatus {
        let remaining = self.remaining(now);
        BackoffStatus {
            consecutive_failures: self.consecutive_failures,
            in_backoff: !remaining.is_zero(),
            backoff_remaining: remaining.as_secs_f64(),
            last_failure_time: self.last_failure_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_base_delay_curve() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.base_delay(0), Duration::ZERO);
        assert_eq!(policy.base_delay(1), Duration::from_secs(1));
        assert_eq!(policy.base_delay(2), Duration::from_secs(2));
        assert_eq!(policy.base_delay(3), Duration::from_secs(4));
        assert_eq!(policy.base_delay(7), Duration::from_secs(60));
        assert_eq!(policy.base_delay(u32::MAX), Duration::from_secs(60));
    }

    #[test]
    fn test_base_delay_is_monotonic_up_to_cap() {
        let policy = BackoffPolicy::new(0.5, 30.0, 1.7, 0.25);
        let mut previous = Duration::ZERO;
        for failures in 0..64 {
            let delay = policy.base_delay(failures);
            assert!(delay >= previous, "delay shrank at {} failures", failures);
            assert!(delay <= Duration::from_secs(30));
            previous = delay;
        }
    }

    #[test]
    fn test_jitter_stays_within_quarter() {
        let policy = BackoffPolicy::default();
        let mut rng = StdRng::seed_from_u64(7);
        for failures in 1..10 {
            let base = policy.base_delay(failures).as_secs_f64();
            for _ in 0..50 {
                let d = policy.jittered_delay(failures, &mut rng).as_secs_f64();
                assert!(d >= base * 0.75 - 1e-9 && d <= base * 1.25 + 1e-9);
            }
        }
    }

    #[test]
    fn test_state_blocks_then_resets() {
        let policy = BackoffPolicy::new(10.0, 60.0, 2.0, 0.0);
        let mut state = BackoffState::new();
        let now = Instant::now();
        assert!(state.check(now).is_ok());

        let delay = state.record_failure(&policy, now);
        assert_eq!(delay, Duration::from_secs(10));
        let err = state.check(now).unwrap_err();
        assert!(err.to_string().contains("backoff period"));

        let status = state.status(now);
        assert_eq!(status.consecutive_failures, 1);
        assert!(status.in_backoff);
        assert!(status.last_failure_time.is_some());

        assert!(state.check(now + Duration::from_secs(11)).is_ok());

        state.reset();
        assert_eq!(state.consecutive_failures(), 0);
        assert!(state.check(now).is_ok());
        // after a reset the next failure starts from the first step again
        assert_eq!(state.record_failure(&policy, now), Duration::from_secs(10));
    }
}
