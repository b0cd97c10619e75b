// ================= Token bucket =================

use std::time::Instant;

pub trait TokenBucketLimiter {
    fn can_spend(&mut self, cost: usize) -> bool;
    fn consume(&mut self, cost: usize) -> bool;
}

pub struct TokenBucket {
    tokens: f64,   // current balance
    rate: f64,     // bytes per second
    capacity: f64, // burst
    last_update: Instant,
    name: String,
}

impl TokenBucket {
    pub fn new(rate_bytes_per_sec: f64, burst_bytes: f64, bucket_name: &str) -> Self {
        Self {
            tokens: burst_bytes, // start full
            rate: rate_bytes_per_sec,
            capacity: burst_bytes,
            last_update: Instant::now(),
            name: bucket_name.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tokens(&self) -> f64 {
        self.tokens
    }

    pub fn refill_at(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_update).as_secs_f64();

        // skip sub-100us slices to keep float error down
        if elapsed > 0.0001 {
            self.tokens = (self.tokens + self.rate * elapsed).min(self.capacity);
            self.last_update = now;
        }
    }

    fn refill(&mut self) {
        self.refill_at(Instant::now());
    }
}

impl TokenBucketLimiter for TokenBucket {
    fn consume(&mut self, cost: usize) -> bool {
        self.refill();

        let cost = cost as f64;
        if self.tokens >= cost {
            self.tokens -= cost;
            true
        } else {
            false
        }
    }

    fn can_spend(&mut self, cost: usize) -> bool {
        self.refill();
        self.tokens >= cost as f64
    }
}
