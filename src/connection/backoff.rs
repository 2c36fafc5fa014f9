use std::time::Duration;

use rand::Rng;

use crate::config::ConnectionConfig;

/// Exponential backoff with up to 20% jitter, capped at the configured maximum.
#[derive(Debug, Clone)]
pub struct Backoff {
    max_ms: u64,
    multiplier: f64,
    current_ms: u64,
}

impl Backoff {
    pub fn new(config: &ConnectionConfig) -> Self {
        Self {
            max_ms: config.max_delay_ms.max(config.initial_delay_ms),
            multiplier: config.backoff_multiplier.max(1.0),
            current_ms: config.initial_delay_ms,
        }
    }

    /// Return the delay for this attempt and advance to the next step.
    pub fn next_delay(&mut self) -> Duration {
        let base = self.current_ms;
        let jitter_range = base / 5;
        let jitter = if jitter_range == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=jitter_range)
        };

        let next = (self.current_ms as f64 * self.multiplier) as u64;
        self.current_ms = next.min(self.max_ms);

        Duration::from_millis((base + jitter).min(self.max_ms))
    }
}
