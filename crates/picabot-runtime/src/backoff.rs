//! Reconnection backoff.
//!
//! The delay before reconnection attempt `n` is
//! `min(max_delay, base_delay * 2^n)`, then spread by a random factor in
//! `[1 - jitter, 1 + jitter]`. The attempt counter has no upper bound; the
//! retry ceiling is enforced by the connection driver.

use std::time::Duration;

use rand::Rng;

/// Parameters of the exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    /// Delay unit. Also the delay right after a successful authentication.
    pub base_delay: Duration,
    /// Cap applied before jitter.
    pub max_delay: Duration,
    /// Relative jitter, in `[0, 1)`.
    pub jitter: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            jitter: 0.2,
        }
    }
}

impl BackoffPolicy {
    /// Pre-jitter delay for `attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        2u32.checked_pow(attempt)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// Applies the configured jitter to `delay`.
    pub fn jittered(&self, delay: Duration) -> Duration {
        if self.jitter <= 0.0 {
            return delay;
        }
        let factor = 1.0 + rand::rng().random_range(-self.jitter..=self.jitter);
        delay.mul_f64(factor.max(0.0))
    }
}

/// Mutable backoff state: `{ attempt_count, next_delay }`.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: BackoffPolicy,
    attempt: u32,
    next_delay: Duration,
}

impl Backoff {
    /// Creates a fresh state for `policy`.
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            attempt: 0,
            next_delay: policy.base_delay,
        }
    }

    /// Consecutive failures since the last reset.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Pre-jitter delay that the next wait will use.
    pub fn next_delay(&self) -> Duration {
        self.next_delay
    }

    /// The policy in use.
    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    /// Records one more failure and returns the new pre-jitter delay.
    pub fn record_failure(&mut self) -> Duration {
        self.attempt = self.attempt.saturating_add(1);
        self.next_delay = self.policy.delay_for(self.attempt);
        self.next_delay
    }

    /// Returns the delay to actually sleep for, jitter included.
    pub fn jittered_delay(&self) -> Duration {
        self.policy.jittered(self.next_delay)
    }

    /// Back to `{ 0, base_delay }`.
    pub fn reset(&mut self) {
        self.attempt = 0;
        self.next_delay = self.policy.base_delay;
    }
}
