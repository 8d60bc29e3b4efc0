//! Exponential backoff with jitter.
//!
//! Both the outbox relay (between publish attempts) and the notification
//! consumer (between redeliveries) space their retries with this policy.

use std::time::Duration;

use rand::RngExt;

/// Exponential backoff: `min(cap, base * 2^(attempt - 1))`, optionally jittered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    cap: Duration,
}

impl Backoff {
    pub const fn new(base: Duration, cap: Duration) -> Self {
        Self { base, cap }
    }

    pub fn from_millis(base_ms: u64, cap_ms: u64) -> Self {
        Self::new(Duration::from_millis(base_ms), Duration::from_millis(cap_ms))
    }

    pub fn base(&self) -> Duration {
        self.base
    }

    pub fn cap(&self) -> Duration {
        self.cap
    }

    /// Un-jittered delay for the given 1-based attempt number.
    ///
    /// Attempt 0 is treated as attempt 1.
    pub fn ceiling(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        self.base.saturating_mul(1u32 << exp).min(self.cap)
    }

    /// Jittered delay: half of [`Backoff::ceiling`] is fixed, the other half is random.
    ///
    /// Keeps a lower bound so retries never collapse to zero while still
    /// spreading out instances that failed at the same moment.
    pub fn delay(&self, attempt: u32) -> Duration {
        let ceiling_ms = self.ceiling(attempt).as_millis() as u64;
        let half = ceiling_ms / 2;
        let jitter = if half == 0 {
            0
        } else {
            rand::rng().random_range(0..=half)
        };
        Duration::from_millis(ceiling_ms - half + jitter)
    }
}

impl Default for Backoff {
    /// 1 s base, 60 s cap.
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(60))
    }
}
