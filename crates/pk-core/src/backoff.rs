//! Exponential backoff for launch confirmation

use std::time::Duration;

use crate::config::ConfirmConfig;

/// Exponential backoff with jitter between confirmation checks
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    /// Current delay
    current: Duration,
    /// Maximum delay
    max: Duration,
    /// Multiplier
    multiplier: f64,
    /// Jitter factor (0.0 to 1.0)
    jitter: f64,
}

impl ExponentialBackoff {
    /// Create a new backoff from configuration
    pub fn from_config(config: &ConfirmConfig) -> Self {
        Self::new(config.initial, config.max, config.multiplier, config.jitter)
    }

    /// Create a new backoff with custom parameters
    ///
    /// A multiplier below 1.0 and a jitter outside 0.0..=1.0 are clamped;
    /// non-finite values fall back to a constant delay without jitter.
    pub fn new(initial: Duration, max: Duration, multiplier: f64, jitter: f64) -> Self {
        Self {
            current: std::cmp::min(initial, max),
            max,
            multiplier: if multiplier.is_finite() { multiplier.max(1.0) } else { 1.0 },
            jitter: if jitter.is_finite() { jitter.clamp(0.0, 1.0) } else { 0.0 },
        }
    }

    /// Get the next delay and advance the backoff
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;

        let next = Duration::try_from_secs_f64(self.current.as_secs_f64() * self.multiplier)
            .unwrap_or(self.max);
        self.current = std::cmp::min(next, self.max);

        let jitter_amount = delay.as_secs_f64() * self.jitter * rand::random::<f64>();
        delay + Duration::try_from_secs_f64(jitter_amount).unwrap_or(Duration::ZERO)
    }
}
