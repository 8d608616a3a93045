use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

/// Shortest sleep between refill checks.
const MIN_POLL: Duration = Duration::from_millis(5);

/// Token bucket for one budget dimension
///
/// Implements the token bucket algorithm with lazy refill.
///
/// # Algorithm
/// - Capacity: maximum number of tokens (burst size), the bucket starts full
/// - Refill rate: tokens added per second
/// - Refill: `available = min(available + elapsed * refill_rate, capacity)`
/// - On acquire: wait until `amount` tokens are available or the timeout
///   elapses; the check and the decrement happen under one lock
#[derive(Debug)]
pub struct TokenBucket {
    state: Mutex<BucketState>,
    capacity: f64,
    refill_rate: f64,
}

#[derive(Debug)]
struct BucketState {
    available: f64,
    last_refill: Instant,
}

impl BucketState {
    fn refill(&mut self, now: Instant, capacity: f64, refill_rate: f64) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.available = (elapsed.mul_add(refill_rate, self.available)).clamp(0.0, capacity);
        self.last_refill = now;
    }
}

impl TokenBucket {
    /// Create a full bucket.
    ///
    /// # Arguments
    /// * `capacity` - Burst size; negative values are treated as 0
    /// * `refill_rate` - Tokens per second; 0 means the bucket never refills
    pub fn new(capacity: f64, refill_rate: f64) -> Self {
        let capacity = capacity.max(0.0);
        Self {
            state: Mutex::new(BucketState {
                available: capacity,
                last_refill: Instant::now(),
            }),
            capacity,
            refill_rate: refill_rate.max(0.0),
        }
    }

    /// Bucket sized for a per-minute budget.
    pub fn per_minute(per_minute: f64) -> Self {
        Self::new(per_minute, per_minute / 60.0)
    }

    pub const fn capacity(&self) -> f64 {
        self.capacity
    }

    pub const fn refill_rate(&self) -> f64 {
        self.refill_rate
    }

    /// Take `amount` tokens, waiting up to `timeout` for them.
    ///
    /// Returns `false` once the timeout elapses without a grant. The lock is
    /// released while sleeping so other callers can proceed.
    pub async fn acquire(&self, amount: f64, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;

        loop {
            let wait = {
                let mut state = self.state.lock().await;
                let now = Instant::now();
                state.refill(now, self.capacity, self.refill_rate);

                if state.available >= amount {
                    state.available -= amount;
                    return true;
                }

                if amount > self.capacity || self.refill_rate <= 0.0 {
                    // Cannot be satisfied by refill; wait out the timeout.
                    deadline.saturating_duration_since(now)
                } else {
                    Duration::from_secs_f64((amount - state.available) / self.refill_rate)
                }
            };

            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let remaining = deadline - now;
            sleep(wait.max(MIN_POLL).min(remaining)).await;
        }
    }

    /// Currently available tokens after a lazy refill.
    pub async fn available(&self) -> f64 {
        let mut state = self.state.lock().await;
        state.refill(Instant::now(), self.capacity, self.refill_rate);
        state.available
    }
}
