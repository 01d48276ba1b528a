use crate::config::ReconnectConfig;
use std::time::Duration;

/// Exponential reconnect delay: `initial` doubling per failed attempt, capped at `max`.
/// With `max_attempts` set, `next_delay` returns `None` once the attempts are used up.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    max_attempts: Option<u32>,
    attempt: u32,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration, max_attempts: Option<u32>) -> Self {
        Self {
            initial,
            max,
            max_attempts,
            attempt: 0,
        }
    }

    pub fn from_config(cfg: &ReconnectConfig) -> Self {
        Self::new(
            Duration::from_millis(cfg.initial_ms),
            Duration::from_millis(cfg.max_ms),
            cfg.max_attempts,
        )
    }

    pub fn next_delay(&mut self) -> Option<Duration> {
        if let Some(limit) = self.max_attempts {
            if self.attempt >= limit {
                return None;
            }
        }

        let factor = 2u32.saturating_pow(self.attempt);
        self.attempt = self.attempt.saturating_add(1);
        Some(self.initial.saturating_mul(factor).min(self.max))
    }

    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}
