//! Exponential backoff with uniform jitter, used both for pacing between
//! store calls and for retrying transient failures.

use std::time::Duration;

use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub base: Duration,
    /// Upper bound of the random extra delay at step zero.
    pub jitter: Duration,
    pub max: Duration,
}

impl Backoff {
    pub const fn new(base: Duration, jitter: Duration) -> Self {
        Self {
            base,
            jitter,
            max: Duration::from_secs(60),
        }
    }

    /// No waiting at all.
    pub const fn none() -> Self {
        Self {
            base: Duration::ZERO,
            jitter: Duration::ZERO,
            max: Duration::ZERO,
        }
    }

    pub fn from_millis(base_ms: u64, jitter_ms: u64) -> Self {
        Self::new(Duration::from_millis(base_ms), Duration::from_millis(jitter_ms))
    }

    /// Delay for `step`: `base * 2^step` plus up to `jitter * 2^step`,
    /// clamped to `max`.
    pub fn delay(&self, step: u32) -> Duration {
        let factor = 2u32.saturating_pow(step.min(16));
        let fixed = self.base.saturating_mul(factor);
        let spread = self.jitter.saturating_mul(factor);
        let extra = if spread.is_zero() {
            Duration::ZERO
        } else {
            let ms = spread.as_millis().min(u64::MAX as u128) as u64;
            Duration::from_millis(rand::thread_rng().gen_range(0..=ms))
        };
        fixed.saturating_add(extra).min(self.max)
    }

    pub async fn pause(&self, step: u32) {
        let d = self.delay(step);
        if !d.is_zero() {
            tracing::trace!(delay_ms = d.as_millis() as u64, step, "pausing");
            tokio::time::sleep(d).await;
        }
    }
}

/// How many times a call is attempted and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first included. Zero behaves like one.
    pub attempts: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub const fn once() -> Self {
        Self {
            attempts: 1,
            backoff: Backoff::none(),
        }
    }

    pub const fn new(attempts: u32, backoff: Backoff) -> Self {
        Self { attempts, backoff }
    }
}
