// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token-bucket rate limiter for outbound publishes.
//!
//! Exceeding the rate never drops work: callers wait, consuming wall-clock
//! time toward their own deadlines.

use parking_lot::Mutex;
use std::time::{Duration, Instant};

struct Bucket {
    tokens: f64,
    refilled_at: Instant,
}

/// Token bucket refilled at `per_second`, with burst capacity equal to
/// one second of tokens. A rate of 0 disables limiting.
pub struct RateLimiter {
    per_second: f64,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    pub fn new(per_second: u32) -> Self {
        Self {
            per_second: per_second as f64,
            bucket: Mutex::new(Bucket { tokens: per_second as f64, refilled_at: Instant::now() }),
        }
    }

    /// Take one token if available without waiting.
    pub fn try_acquire(&self) -> bool {
        if self.per_second == 0.0 {
            return true;
        }
        let mut bucket = self.bucket.lock();
        self.refill(&mut bucket);
        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Take one token, waiting for a refill when the bucket is empty.
    pub async fn acquire(&self) {
        if self.per_second == 0.0 {
            return;
        }
        loop {
            let wait = {
                let mut bucket = self.bucket.lock();
                self.refill(&mut bucket);
                if bucket.tokens >= 1.0 {
                    bucket.tokens -= 1.0;
                    return;
                }
                // Time until one token accrues.
                Duration::from_secs_f64((1.0 - bucket.tokens) / self.per_second)
            };
            tokio::time::sleep(wait).await;
        }
    }

    fn refill(&self, bucket: &mut Bucket) {
        let now = Instant::now();
        let elapsed = now.duration_since(bucket.refilled_at).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.per_second).min(self.per_second);
        bucket.refilled_at = now;
    }
}

#[cfg(test)]
#[path = "limiter_tests.rs"]
mod tests;
