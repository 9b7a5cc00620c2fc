// src/throttle.rs
//! Process-wide token bucket bounding calls to the destination API.
//! One instance is shared by every tenant; it is never persisted.

use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::SyncError;

pub const DEFAULT_RATE_PER_SEC: u32 = 10;

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

#[derive(Debug)]
pub struct DeliveryThrottle {
    rate_per_sec: f64,
    burst: f64,
    bucket: Mutex<Bucket>,
}

impl DeliveryThrottle {
    /// `rate_per_sec` and `burst` are clamped to at least 1. Starts full.
    pub fn new(rate_per_sec: u32, burst: u32) -> Self {
        let burst = f64::from(burst.max(1));
        Self {
            rate_per_sec: f64::from(rate_per_sec.max(1)),
            burst,
            bucket: Mutex::new(Bucket {
                tokens: burst,
                last_refill: Instant::now(),
            }),
        }
    }

    pub fn rate_per_sec(&self) -> f64 {
        self.rate_per_sec
    }

    pub fn burst(&self) -> f64 {
        self.burst
    }

    /// Take one token or report how long until one is available.
    fn try_take(&self) -> Result<(), Duration> {
        let mut b = self.bucket.lock().expect("throttle mutex poisoned");
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(b.last_refill).as_secs_f64();
        b.tokens = (b.tokens + elapsed * self.rate_per_sec).min(self.burst);
        b.last_refill = now;

        if b.tokens >= 1.0 {
            b.tokens -= 1.0;
            Ok(())
        } else {
            let missing = 1.0 - b.tokens;
            Err(Duration::from_secs_f64(missing / self.rate_per_sec))
        }
    }

    /// Wait for a token. Returns `SyncError::Cancelled` if `cancel` fires first;
    /// callers treat that as fatal for the current cycle.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<(), SyncError> {
        loop {
            if cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }
            let wait = match self.try_take() {
                Ok(()) => return Ok(()),
                Err(wait) => wait,
            };
            tokio::select! {
                _ = cancel.cancelled() => return Err(SyncError::Cancelled),
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }
}

impl Default for DeliveryThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_RATE_PER_SEC, DEFAULT_RATE_PER_SEC)
    }
}
