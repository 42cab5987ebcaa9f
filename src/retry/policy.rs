//! Exponential backoff policy with a cap and bounded jitter.

use crate::error::{Error, Result};

use rand::Rng;
use std::time::Duration;

/// How many attempts a task gets and how long to wait between them.
///
/// ```rust
/// use haul::retry::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy {
///     base_delay: Duration::from_secs(1),
///     max_delay: Duration::from_secs(5),
///     ..RetryPolicy::default()
/// };
/// assert_eq!(policy.backoff(1), Duration::from_secs(1));
/// assert_eq!(policy.backoff(3), Duration::from_secs(4));
/// assert_eq!(policy.backoff(4), Duration::from_secs(5));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Delay after the first failed attempt.
    pub base_delay: Duration,
    /// Growth factor applied per failed attempt.
    pub multiplier: f64,
    /// Upper bound on the delay before jitter.
    pub max_delay: Duration,
    /// Jitter is drawn uniformly from `[0, jitter_fraction * delay]`.
    pub jitter_fraction: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(2),
            multiplier: 2.0,
            max_delay: Duration::from_secs(60),
            jitter_fraction: 0.1,
        }
    }
}

impl RetryPolicy {
    /// Delay after `attempt` failed, without jitter.
    ///
    /// `attempt` is 1-based: `base_delay × multiplier^(attempt−1)`, capped at
    /// `max_delay`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);
        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            self.max_delay
        } else {
            Duration::from_secs_f64(secs.max(0.0))
        }
    }

    /// Random extra wait for `delay`, within `[0, jitter_fraction × delay]`.
    pub fn jitter<R: Rng>(&self, delay: Duration, rng: &mut R) -> Duration {
        let ceiling = delay.as_secs_f64() * self.jitter_fraction;
        if ceiling <= 0.0 || !ceiling.is_finite() {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(rng.random_range(0.0..=ceiling))
    }

    /// Full wait after `attempt` failed: backoff plus jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let delay = self.backoff(attempt);
        delay + self.jitter(delay, &mut rand::rng())
    }

    /// Whether another attempt fits after `attempts_made` attempts.
    pub fn has_budget(&self, attempts_made: u32) -> bool {
        attempts_made < self.max_attempts
    }

    /// Reject policies that cannot produce a sane schedule.
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(Error::InvalidConfig(
                "max_attempts must be at least 1".into(),
            ));
        }
        if !(self.multiplier >= 1.0 && self.multiplier.is_finite()) {
            return Err(Error::InvalidConfig(format!(
                "backoff multiplier must be a finite value >= 1, got {}",
                self.multiplier
            )));
        }
        if !(0.0..=1.0).contains(&self.jitter_fraction) {
            return Err(Error::InvalidConfig(format!(
                "jitter fraction must be within [0, 1], got {}",
                self.jitter_fraction
            )));
        }
        Ok(())
    }
}
