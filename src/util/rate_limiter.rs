use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Token bucket limiting the aggregate request rate across all concurrent
/// tasks of a run. Capacity and refill rate are both `rate_per_second`, so
/// bursts never exceed one second's worth of tokens.
pub struct RateLimiter {
    rate: f64,
    capacity: f64,
    state: Mutex<BucketState>,
}

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl RateLimiter {
    pub fn new(rate_per_second: u32) -> RateLimiter {
        let rate = f64::from(rate_per_second.max(1));
        RateLimiter {
            rate,
            capacity: rate,
            state: Mutex::new(BucketState {
                tokens: rate,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Waits until a token is available and consumes it. The bucket lock is
    /// held across the wait so concurrent callers are served one at a time
    /// and the refill-then-consume pair stays atomic.
    pub async fn acquire(&self) {
        let mut state = self.state.lock().await;
        loop {
            let now = Instant::now();
            let elapsed = now.duration_since(state.last_refill).as_secs_f64();
            state.tokens = (state.tokens + elapsed * self.rate).min(self.capacity);
            state.last_refill = now;
            if state.tokens >= 1.0 {
                state.tokens -= 1.0;
                return;
            }
            let wait = (1.0 - state.tokens) / self.rate;
            // Floating point residue can round the wait down to zero, which
            // would spin instead of suspending.
            let wait = Duration::from_secs_f64(wait).max(Duration::from_millis(1));
            tokio::time::sleep(wait).await;
        }
    }
}
