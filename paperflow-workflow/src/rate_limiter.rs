//! Token-bucket rate limiter for resource-tagged steps.

use std::time::Instant;

use tokio::sync::Mutex;
use tokio::time::{sleep, Duration};

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Async token bucket: refills at `rate_per_second` up to `burst` capacity.
///
/// `acquire` returns immediately while tokens remain and otherwise sleeps
/// roughly one refill interval before retrying. Dropping an in-flight
/// `acquire` future abandons the wait, so caller cancellation is honored.
pub struct TokenBucketRateLimiter {
    rate: f64,
    burst: f64,
    state: Mutex<BucketState>,
}

impl TokenBucketRateLimiter {
    pub fn new(rate_per_second: f64, burst: u32) -> Self {
        Self {
            rate: rate_per_second,
            burst: burst as f64,
            state: Mutex::new(BucketState {
                tokens: burst as f64,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Wait until a token is available, then consume it.
    pub async fn acquire(&self) {
        loop {
            {
                let mut state = self.state.lock().await;
                let now = Instant::now();
                let elapsed = now.duration_since(state.last_refill).as_secs_f64();
                state.tokens = (state.tokens + elapsed * self.rate).min(self.burst);
                state.last_refill = now;

                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    return;
                }
            }
            // No token available; wait one refill interval and retry.
            sleep(Duration::from_secs_f64(1.0 / self.rate)).await;
        }
    }

    /// Tokens currently in the bucket (after refill), for diagnostics.
    pub async fn available(&self) -> f64 {
        let mut state = self.state.lock().await;
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.rate).min(self.burst);
        state.last_refill = now;
        state.tokens
    }
}
