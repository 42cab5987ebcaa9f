//! Rolling transfer speed.

use std::time::Duration;
use tokio::time::Instant;

/// Weight given to the newest sample.
pub const SPEED_SMOOTHING: f64 = 0.3;

/// Exponential moving average of per-chunk transfer rates.
#[derive(Debug, Clone)]
pub struct SpeedEstimator {
    last: Instant,
    rate: Option<f64>,
}

impl SpeedEstimator {
    pub fn new(start: Instant) -> Self {
        Self {
            last: start,
            rate: None,
        }
    }

    /// Fold in `bytes` received since the previous sample.
    pub fn record(&mut self, bytes: u64, now: Instant) -> f64 {
        let elapsed = now.saturating_duration_since(self.last).as_secs_f64();
        self.last = now;
        if elapsed <= f64::EPSILON {
            return self.bytes_per_second();
        }
        let sample = bytes as f64 / elapsed;
        let rate = match self.rate {
            Some(rate) => SPEED_SMOOTHING * sample + (1.0 - SPEED_SMOOTHING) * rate,
            None => sample,
        };
        self.rate = Some(rate);
        rate
    }

    pub fn bytes_per_second(&self) -> f64 {
        self.rate.unwrap_or(0.0)
    }

    /// Time left for `remaining` bytes at the current rate.
    pub fn eta(&self, remaining: u64) -> Option<Duration> {
        let rate = self.bytes_per_second();
        if rate <= 0.0 {
            return None;
        }
        Duration::try_from_secs_f64(remaining as f64 / rate).ok()
    }
}
