//! Reconnect delay calculation for the relay client

use std::time::Duration;

use rand::Rng;

use crate::config::ClientConfig;

/// Backoff configuration. A multiplier of 1.0 with no jitter gives a fixed delay.
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Delay before the first retry in milliseconds
    pub initial_delay_ms: u64,
    /// Maximum delay in milliseconds
    pub max_delay_ms: u64,
    /// Multiplier for exponential growth
    pub multiplier: f64,
    /// Jitter factor (0.0 to 1.0)
    pub jitter_factor: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 3000,
            max_delay_ms: 30_000,
            multiplier: 1.0,
            jitter_factor: 0.0,
        }
    }
}

impl From<&ClientConfig> for BackoffConfig {
    fn from(config: &ClientConfig) -> Self {
        Self {
            initial_delay_ms: config.reconnect_delay_ms,
            max_delay_ms: config.max_reconnect_delay_ms,
            multiplier: config.backoff_multiplier.max(1.0),
            jitter_factor: config.jitter_factor.clamp(0.0, 1.0),
        }
    }
}

/// Delay calculator with optional growth and jitter. Attempts are not capped.
pub struct ReconnectBackoff {
    config: BackoffConfig,
    current_delay_ms: f64,
    attempt: u32,
}

impl ReconnectBackoff {
    pub fn new(config: BackoffConfig) -> Self {
        let initial = config.initial_delay_ms as f64;
        Self {
            config,
            current_delay_ms: initial,
            attempt: 0,
        }
    }

    /// Get the next delay duration
    pub fn next_delay(&mut self) -> Duration {
        self.attempt = self.attempt.saturating_add(1);

        // Never cap below the configured starting delay
        let ceiling = self.config.max_delay_ms.max(self.config.initial_delay_ms) as f64;
        let base_delay = self.current_delay_ms.min(ceiling);
        self.current_delay_ms = (base_delay * self.config.multiplier).min(ceiling);

        let jitter_range = base_delay * self.config.jitter_factor;
        let final_delay = if jitter_range > 0.0 {
            let jitter = rand::rng().random_range(-jitter_range..=jitter_range);
            (base_delay + jitter).max(0.0)
        } else {
            base_delay
        };

        Duration::from_millis(final_delay as u64)
    }

    /// Reset the backoff after a successful connect
    pub fn reset(&mut self) {
        self.current_delay_ms = self.config.initial_delay_ms as f64;
        self.attempt = 0;
    }

    /// Get the current attempt number
    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

impl Default for ReconnectBackoff {
    fn default() -> Self {
        Self::new(BackoffConfig::default())
    }
}
