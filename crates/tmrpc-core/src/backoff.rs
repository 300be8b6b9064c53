//! Exponential backoff with random jitter, used between reconnect attempts.

use std::time::Duration;

use rand::Rng;

/// Configuration for the backoff policy.
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Delay before the first attempt.
    pub initial: Duration,
    /// Cap on the exponential part of the delay.
    pub max: Duration,
    /// Multiplier applied on each further attempt.
    pub multiplier: f64,
    /// Upper bound of the uniformly random delay added on top (zero disables).
    pub jitter: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(60),
            multiplier: 2.0,
            jitter: Duration::from_secs(1),
        }
    }
}

impl BackoffConfig {
    /// Fixed short delays without jitter, handy for local nodes and tests.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            initial: delay,
            max: delay,
            multiplier: 1.0,
            jitter: Duration::ZERO,
        }
    }
}

/// Stateless backoff policy. Computes the delay for a given attempt.
#[derive(Debug, Clone)]
pub struct Backoff {
    pub config: BackoffConfig,
}

impl Backoff {
    pub fn new(config: BackoffConfig) -> Self {
        Self { config }
    }

    /// Deterministic part of the delay before the `attempt`-th try (0-based).
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let base_ms = self.config.initial.as_millis() as f64
            * self.config.multiplier.powi(attempt.min(i32::MAX as u32) as i32);
        let cap_ms = self.config.max.as_millis() as f64;
        Duration::from_millis(base_ms.min(cap_ms) as u64)
    }

    /// Full delay before the `attempt`-th try: base plus random jitter.
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        let jitter_ms = self.config.jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return base;
        }
        base + Duration::from_millis(rand::thread_rng().gen_range(0..jitter_ms))
    }
}
