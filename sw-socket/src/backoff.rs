//! Reconnect backoff policy.

use std::time::Duration;

use sw_core::config::StreamConfig;
use sw_core::constants::stream;

/// Capped exponential backoff.
///
/// `initial <= current <= max` holds at all times. The delay returned by
/// [`next_delay`](Self::next_delay) is the current interval; the interval
/// then grows by `decay` for the next failure.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    initial: Duration,
    decay: f64,
    max: Duration,
    current: Duration,
}

impl BackoffPolicy {
    /// `max` below `initial` is raised to `initial`; a `decay` below 1 or
    /// non-finite is treated as 1.
    pub fn new(initial: Duration, decay: f64, max: Duration) -> Self {
        let max = max.max(initial);
        let decay = if decay.is_finite() && decay >= 1.0 {
            decay
        } else {
            1.0
        };
        Self {
            initial,
            decay,
            max,
            current: initial,
        }
    }

    pub fn from_config(config: &StreamConfig) -> Self {
        Self::new(
            Duration::from_millis(config.reconnect_interval_ms),
            config.reconnect_decay,
            Duration::from_millis(config.max_reconnect_interval_ms),
        )
    }

    pub fn initial(&self) -> Duration {
        self.initial
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    pub fn decay(&self) -> f64 {
        self.decay
    }

    /// Delay that the next failure will wait.
    pub fn current(&self) -> Duration {
        self.current
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }

    /// Return the delay to wait now and advance for the following failure.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        let grown = Duration::try_from_secs_f64(self.current.as_secs_f64() * self.decay)
            .unwrap_or(self.max);
        self.current = grown.clamp(self.initial, self.max);
        delay
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(
            Duration::from_millis(stream::RECONNECT_INTERVAL_MS),
            stream::RECONNECT_DECAY,
            Duration::from_millis(stream::MAX_RECONNECT_INTERVAL_MS),
        )
    }
}
