//! Reconnect scheduling: capped exponential backoff with bounded jitter.
//!
//! The policy is a pure function of the attempt count. Jitter spreads the
//! retry dials of independent sessions so a host restart does not see a
//! synchronized thundering herd.

use std::time::Duration;

use crate::config::ReconnectConfig;

/// What to do about reconnect attempt `n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Schedule the next dial after this delay.
    Delay(Duration),
    /// The attempt budget is spent; the session transitions to Failed.
    Exhausted,
}

/// Backoff policy for a session's reconnect run.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    base_delay: Duration,
    max_delay: Duration,
    max_attempts: u32,
    jitter: f64,
}

impl ReconnectPolicy {
    pub fn new(config: &ReconnectConfig) -> Self {
        Self {
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            max_attempts: config.max_attempts,
            jitter: config.jitter.clamp(0.0, 1.0),
        }
    }

    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before attempt `attempt` (0-indexed), or `Exhausted` once the
    /// budget is spent. The raw delay is `min(max_delay, base * 2^n)`;
    /// jitter adds up to `jitter * raw` on top.
    pub fn delay_for(&self, attempt: u32) -> RetryDecision {
        if attempt >= self.max_attempts {
            return RetryDecision::Exhausted;
        }

        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        let raw = self.base_delay.saturating_mul(factor).min(self.max_delay);
        let jitter = raw.mul_f64(self.jitter * rand::random::<f64>());

        RetryDecision::Delay(raw.saturating_add(jitter))
    }
}
