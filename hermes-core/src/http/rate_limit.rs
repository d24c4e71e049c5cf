//! Minimum-spacing rate limiter
//!
//! One limiter belongs to one tool instance. Callers are suspended until at
//! least `1 / rate` seconds have passed since the previous attempt; there is
//! no queue and no burst allowance.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Spaces attempts at a fixed minimum interval
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_attempt: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Limiter admitting at most `per_sec` attempts per second.
    ///
    /// Returns `None` for a non-positive or non-finite rate.
    pub fn per_second(per_sec: f64) -> Option<Self> {
        if !per_sec.is_finite() || per_sec <= 0.0 {
            return None;
        }
        Some(Self {
            min_interval: Duration::from_secs_f64(1.0 / per_sec),
            last_attempt: Mutex::new(None),
        })
    }

    /// Spacing enforced between attempts
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait until the next attempt is allowed, then claim it
    pub async fn acquire(&self) {
        let mut last = self.last_attempt.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                let wait = self.min_interval - elapsed;
                tracing::debug!(wait_ms = wait.as_millis() as u64, "rate limit wait");
                tokio::time::sleep(wait).await;
            }
        }
        *last = Some(Instant::now());
    }
}
