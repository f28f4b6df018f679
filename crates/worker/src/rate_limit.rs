//! Token bucket limiting how fast the consumer pool starts jobs.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::config::RateLimitConfig;

struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn replenish(&mut self, rate_per_sec: f64, capacity: f64) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();
        self.last_update = now;
        self.tokens = (self.tokens + elapsed * rate_per_sec).min(capacity);
    }
}

/// Allows bursts of up to `max_jobs`, refilling `max_jobs` per window.
pub struct RateLimiter {
    bucket: Mutex<TokenBucket>,
    capacity: f64,
    rate_per_sec: f64,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        let capacity = f64::from(config.max_jobs.max(1));
        let window_secs = Duration::from_millis(config.window_ms.max(1)).as_secs_f64();
        Self {
            bucket: Mutex::new(TokenBucket {
                tokens: capacity,
                last_update: Instant::now(),
            }),
            capacity,
            rate_per_sec: capacity / window_secs,
        }
    }

    /// Take a token if one is available.
    pub fn try_acquire(&self) -> bool {
        self.reserve().is_none()
    }

    /// Wait until a token is available, then take it.
    pub async fn acquire(&self) {
        while let Some(wait) = self.reserve() {
            tokio::time::sleep(wait).await;
        }
    }

    /// Takes a token, or returns how long until one accrues.
    fn reserve(&self) -> Option<Duration> {
        let mut bucket = self.bucket.lock();
        bucket.replenish(self.rate_per_sec, self.capacity);

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            None
        } else {
            let missing = 1.0 - bucket.tokens;
            Some(Duration::from_secs_f64(missing / self.rate_per_sec))
        }
    }
}
