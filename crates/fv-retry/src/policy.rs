//! Retry policy and backoff calculation.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Immutable retry policy.
///
/// Backoff before retry `n` (1-based) is
/// `min(initial_delay * multiplier^(n-1), max_delay)`, then jittered by a
/// uniform factor in `[1 - jitter_ratio, 1 + jitter_ratio]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Default: 3.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry (ms). Default: 100.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Upper bound of the un-jittered delay (ms). Default: 2000.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Growth factor per retry. Default: 2.0.
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    /// Relative jitter (0.1 = ±10%). Default: 0.1.
    #[serde(default = "default_jitter_ratio")]
    pub jitter_ratio: f64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    100
}

fn default_max_delay_ms() -> u64 {
    2_000
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_jitter_ratio() -> f64 {
    0.1
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            multiplier: default_multiplier(),
            jitter_ratio: default_jitter_ratio(),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn new(
        max_attempts: u32,
        initial_delay: Duration,
        max_delay: Duration,
        multiplier: f64,
        jitter_ratio: f64,
    ) -> Self {
        Self {
            max_attempts,
            initial_delay_ms: initial_delay.as_millis() as u64,
            max_delay_ms: max_delay.as_millis() as u64,
            multiplier,
            jitter_ratio,
        }
    }

    /// Same policy without jitter. Makes backoff deterministic.
    #[must_use]
    pub fn no_jitter(mut self) -> Self {
        self.jitter_ratio = 0.0;
        self
    }

    #[inline]
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    #[inline]
    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    /// Un-jittered delay before retry `retry` (1-based).
    pub fn base_delay(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(63) as i32;
        let scaled = self.initial_delay_ms as f64 * self.multiplier.max(1.0).powi(exponent);
        let capped = scaled.min(self.max_delay_ms as f64);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Duration::from_millis(capped.max(0.0) as u64)
    }

    /// Jittered delay before retry `retry` (1-based). Never negative.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let base = self.base_delay(retry);
        let ratio = self.jitter_ratio.clamp(0.0, 1.0);
        if ratio == 0.0 || base.is_zero() {
            return base;
        }

        let factor = rand::rng().random_range((1.0 - ratio)..=(1.0 + ratio));
        base.mul_f64(factor)
    }
}
