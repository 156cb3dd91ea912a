// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn burst_capacity_equals_rate() {
    let limiter = RateLimiter::new(5);
    for _ in 0..5 {
        assert!(limiter.try_acquire());
    }
    assert!(!limiter.try_acquire());
}

#[test]
fn zero_rate_is_unlimited() {
    let limiter = RateLimiter::new(0);
    for _ in 0..10_000 {
        assert!(limiter.try_acquire());
    }
}

#[tokio::test]
async fn acquire_waits_for_refill() {
    let limiter = RateLimiter::new(1_000);
    // Drain the burst.
    while limiter.try_acquire() {}
    let start = Instant::now();
    limiter.acquire().await;
    // One token at 1000/s accrues in about a millisecond; the wait must
    // have been non-zero but bounded.
    assert!(start.elapsed() < Duration::from_millis(500));
}

#[test]
fn refill_restores_tokens_over_time() {
    let limiter = RateLimiter::new(1_000);
    while limiter.try_acquire() {}
    std::thread::sleep(Duration::from_millis(20));
    assert!(limiter.try_acquire());
}
