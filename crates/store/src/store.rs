// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `StateStore` trait: scalar, batch, hash, list, set, and lease
//! operations over JSON-encoded values.

use crate::error::StoreError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;

/// Key/value façade with TTLs and structured operations.
///
/// Values are serialized as UTF-8 JSON. Typed accessors are provided as
/// default methods on top of the raw string operations so implementations
/// only deal in strings.
#[async_trait::async_trait]
pub trait StateStore: Send + Sync {
    // ── Scalar ──────────────────────────────────────────────────────────

    async fn get_raw(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn set_raw(
        &self,
        key: &str,
        value: String,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError>;
    async fn exists(&self, key: &str) -> Result<bool, StoreError>;
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;
    /// Delete every key matching a glob pattern; returns the count removed.
    async fn delete_by_pattern(&self, pattern: &str) -> Result<u64, StoreError>;
    /// List keys matching a glob pattern.
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, StoreError>;

    // ── Batch ───────────────────────────────────────────────────────────

    async fn get_many_raw(
        &self,
        keys: &[String],
    ) -> Result<HashMap<String, String>, StoreError>;
    async fn set_many_raw(
        &self,
        entries: HashMap<String, String>,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError>;

    // ── Hash ────────────────────────────────────────────────────────────

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, StoreError>;
    async fn hset(&self, key: &str, field: &str, value: String) -> Result<(), StoreError>;
    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, StoreError>;
    async fn hdelete(&self, key: &str, field: &str) -> Result<bool, StoreError>;

    // ── List ────────────────────────────────────────────────────────────

    async fn lpush(&self, key: &str, value: String) -> Result<u64, StoreError>;
    async fn rpush(&self, key: &str, value: String) -> Result<u64, StoreError>;
    async fn lpop(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn rpop(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn llen(&self, key: &str) -> Result<u64, StoreError>;

    // ── Set ─────────────────────────────────────────────────────────────

    async fn sadd(&self, key: &str, member: &str) -> Result<bool, StoreError>;
    async fn srem(&self, key: &str, member: &str) -> Result<bool, StoreError>;
    async fn scontains(&self, key: &str, member: &str) -> Result<bool, StoreError>;

    // ── Counter ─────────────────────────────────────────────────────────

    async fn incr(&self, key: &str, by: i64) -> Result<i64, StoreError>;

    // ── Lease ───────────────────────────────────────────────────────────

    /// Put-if-absent with expiry. Returns `true` when the lease was taken
    /// or is already held by `owner` (reacquire refreshes the TTL).
    async fn acquire_lease(
        &self,
        resource: &str,
        owner: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError>;

    /// Extend the lease only while `owner` still holds it.
    async fn renew_lease(
        &self,
        resource: &str,
        owner: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError>;

    /// Release the lease only while `owner` still holds it.
    async fn release_lease(&self, resource: &str, owner: &str) -> Result<bool, StoreError>;
}

/// Typed JSON accessors layered over the raw string operations.
#[async_trait::async_trait]
pub trait StateStoreExt: StateStore {
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>, StoreError> {
        match self.get_raw(key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn set<T: Serialize + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        self.set_raw(key, serde_json::to_string(value)?, ttl).await
    }

    async fn get_many<T: DeserializeOwned + Send>(
        &self,
        keys: &[String],
    ) -> Result<HashMap<String, T>, StoreError> {
        let raw = self.get_many_raw(keys).await?;
        let mut out = HashMap::with_capacity(raw.len());
        for (key, value) in raw {
            out.insert(key, serde_json::from_str(&value)?);
        }
        Ok(out)
    }

    async fn set_many<T: Serialize + Sync>(
        &self,
        entries: &HashMap<String, T>,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        let mut raw = HashMap::with_capacity(entries.len());
        for (key, value) in entries {
            raw.insert(key.clone(), serde_json::to_string(value)?);
        }
        self.set_many_raw(raw, ttl).await
    }
}

impl<S: StateStore + ?Sized> StateStoreExt for S {}
