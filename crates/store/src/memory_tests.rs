// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::store::StateStoreExt;
use convoy_core::FakeClock;
use std::time::Duration;

fn store() -> (MemoryStore<FakeClock>, FakeClock) {
    let clock = FakeClock::new();
    (MemoryStore::with_clock(clock.clone()), clock)
}

#[tokio::test]
async fn set_get_round_trip() {
    let (store, _) = store();
    store.set_raw("k", "v".into(), None).await.unwrap();
    assert_eq!(store.get_raw("k").await.unwrap().as_deref(), Some("v"));
}

#[tokio::test]
async fn ttl_expires_against_clock() {
    let (store, clock) = store();
    store.set_raw("k", "v".into(), Some(Duration::from_secs(10))).await.unwrap();
    clock.advance(Duration::from_secs(9));
    assert!(store.exists("k").await.unwrap());
    clock.advance(Duration::from_secs(2));
    assert!(!store.exists("k").await.unwrap());
    assert_eq!(store.get_raw("k").await.unwrap(), None);
}

#[tokio::test]
async fn typed_accessors_serialize_json() {
    let (store, _) = store();
    store.set("n", &42u32, None).await.unwrap();
    assert_eq!(store.get::<u32>("n").await.unwrap(), Some(42));
    assert_eq!(store.get_raw("n").await.unwrap().as_deref(), Some("42"));
}

#[tokio::test]
async fn delete_by_pattern_counts() {
    let (store, _) = store();
    for key in ["workflow:a", "workflow:b", "lease:a"] {
        store.set_raw(key, "x".into(), None).await.unwrap();
    }
    let removed = store.delete_by_pattern("workflow:*").await.unwrap();
    assert_eq!(removed, 2);
    assert!(store.exists("lease:a").await.unwrap());
}

#[tokio::test]
async fn keys_lists_matching_sorted() {
    let (store, _) = store();
    for key in ["workflow:b", "workflow:a", "other"] {
        store.set_raw(key, "x".into(), None).await.unwrap();
    }
    let keys = store.keys("workflow:*").await.unwrap();
    assert_eq!(keys, vec!["workflow:a".to_string(), "workflow:b".to_string()]);
}

#[tokio::test]
async fn hash_operations() {
    let (store, _) = store();
    store.hset("h", "f1", "v1".into()).await.unwrap();
    store.hset("h", "f2", "v2".into()).await.unwrap();
    assert_eq!(store.hget("h", "f1").await.unwrap().as_deref(), Some("v1"));
    assert_eq!(store.hgetall("h").await.unwrap().len(), 2);
    assert!(store.hdelete("h", "f1").await.unwrap());
    assert!(!store.hdelete("h", "f1").await.unwrap());
}

#[tokio::test]
async fn list_operations_preserve_order() {
    let (store, _) = store();
    store.rpush("l", "a".into()).await.unwrap();
    store.rpush("l", "b".into()).await.unwrap();
    store.lpush("l", "z".into()).await.unwrap();
    assert_eq!(store.llen("l").await.unwrap(), 3);
    assert_eq!(store.lpop("l").await.unwrap().as_deref(), Some("z"));
    assert_eq!(store.rpop("l").await.unwrap().as_deref(), Some("b"));
}

#[tokio::test]
async fn set_operations() {
    let (store, _) = store();
    assert!(store.sadd("s", "m").await.unwrap());
    assert!(!store.sadd("s", "m").await.unwrap());
    assert!(store.scontains("s", "m").await.unwrap());
    assert!(store.srem("s", "m").await.unwrap());
    assert!(!store.scontains("s", "m").await.unwrap());
}

#[tokio::test]
async fn incr_starts_from_zero() {
    let (store, _) = store();
    assert_eq!(store.incr("c", 1).await.unwrap(), 1);
    assert_eq!(store.incr("c", 5).await.unwrap(), 6);
    assert_eq!(store.incr("c", -2).await.unwrap(), 4);
}

#[tokio::test]
async fn wrong_type_errors() {
    let (store, _) = store();
    store.set_raw("k", "v".into(), None).await.unwrap();
    assert!(store.lpush("k", "x".into()).await.is_err());
    assert!(store.hget("k", "f").await.is_err());
}

// ── Leases ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn lease_is_exclusive() {
    let (store, _) = store();
    assert!(store.acquire_lease("r", "engine-a", Duration::from_secs(30)).await.unwrap());
    assert!(!store.acquire_lease("r", "engine-b", Duration::from_secs(30)).await.unwrap());
}

#[tokio::test]
async fn lease_reacquire_by_owner_refreshes() {
    let (store, clock) = store();
    assert!(store.acquire_lease("r", "engine-a", Duration::from_secs(30)).await.unwrap());
    clock.advance(Duration::from_secs(20));
    assert!(store.acquire_lease("r", "engine-a", Duration::from_secs(30)).await.unwrap());
    clock.advance(Duration::from_secs(20));
    // Still held: the reacquire pushed expiry out.
    assert!(!store.acquire_lease("r", "engine-b", Duration::from_secs(30)).await.unwrap());
}

#[tokio::test]
async fn expired_lease_can_be_taken() {
    let (store, clock) = store();
    assert!(store.acquire_lease("r", "engine-a", Duration::from_secs(30)).await.unwrap());
    clock.advance(Duration::from_secs(31));
    assert!(store.acquire_lease("r", "engine-b", Duration::from_secs(30)).await.unwrap());
}

#[tokio::test]
async fn renew_fails_for_non_owner() {
    let (store, _) = store();
    assert!(store.acquire_lease("r", "engine-a", Duration::from_secs(30)).await.unwrap());
    assert!(!store.renew_lease("r", "engine-b", Duration::from_secs(30)).await.unwrap());
    assert!(store.renew_lease("r", "engine-a", Duration::from_secs(30)).await.unwrap());
}

#[tokio::test]
async fn release_only_by_owner() {
    let (store, _) = store();
    assert!(store.acquire_lease("r", "engine-a", Duration::from_secs(30)).await.unwrap());
    assert!(!store.release_lease("r", "engine-b").await.unwrap());
    assert!(store.release_lease("r", "engine-a").await.unwrap());
    assert!(store.acquire_lease("r", "engine-b", Duration::from_secs(30)).await.unwrap());
}

// ── Glob matching ───────────────────────────────────────────────────────

#[yare::parameterized(
    star_tail = { "workflow:*", "workflow:abc", true },
    star_mid = { "workflow:*:lease", "workflow:abc:lease", true },
    question = { "wfl-?", "wfl-x", true },
    no_match = { "workflow:*", "lease:abc", false },
    exact = { "plain", "plain", true },
    star_empty = { "a*b", "ab", true },
)]
fn glob_cases(pattern: &str, input: &str, expected: bool) {
    assert_eq!(glob_match(pattern, input), expected);
}
