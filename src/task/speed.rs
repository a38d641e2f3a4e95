//! Transfer speed estimation
//!
//! Instantaneous throughput between two snapshots is noisy (push intervals jitter,
//! the agent reports in bursts), so the displayed speed is a first-order
//! exponential moving average:
//!
//! ```text
//! instantaneous = (loaded - last_loaded) / max(elapsed_ms, 1) * 1000
//! speed        += (instantaneous - speed) / K
//! ```

use std::time::Instant;

/// Default smoothing constant K
pub const DEFAULT_SMOOTHING: f64 = 5.0;

/// Floor on the sampling interval, in milliseconds
const MIN_ELAPSED_MS: f64 = 1.0;

/// Exponential moving average of bytes per second
#[derive(Clone, Debug)]
pub struct SpeedEstimator {
    speed: f64,
    updated_at: Instant,
    smoothing: f64,
}

impl SpeedEstimator {
    /// Create an estimator at 0 B/s whose first sample is measured from `now`
    ///
    /// `smoothing` values below 1 are raised to 1 (no smoothing).
    pub fn new(now: Instant, smoothing: f64) -> Self {
        Self {
            speed: 0.0,
            updated_at: now,
            smoothing: if smoothing.is_nan() { DEFAULT_SMOOTHING } else { smoothing.max(1.0) },
        }
    }

    /// Current estimate in bytes per second
    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Time of the last sample (or reset)
    pub fn updated_at(&self) -> Instant {
        self.updated_at
    }

    /// Smoothing constant in use
    pub fn smoothing(&self) -> f64 {
        self.smoothing
    }

    /// Fold one observation into the estimate and return the new speed
    ///
    /// A counter that went backwards yields a negative instantaneous sample;
    /// callers that rewind the counter should [`reset`](Self::reset) first.
    pub fn sample(&mut self, loaded: u64, last_loaded: u64, now: Instant) -> f64 {
        let elapsed_ms = now.saturating_duration_since(self.updated_at).as_secs_f64() * 1000.0;
        let instantaneous = (loaded as f64 - last_loaded as f64) / elapsed_ms.max(MIN_ELAPSED_MS) * 1000.0;

        self.speed += (instantaneous - self.speed) / self.smoothing;
        self.updated_at = now;
        self.speed
    }

    /// Restart the sampling interval at `now` without touching the estimate
    pub fn reset(&mut self, now: Instant) {
        self.updated_at = now;
    }
}
