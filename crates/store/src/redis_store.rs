// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Redis-backed state store.

use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::store::StateStore;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::time::Duration;

/// State store over a Redis connection manager.
///
/// The manager multiplexes operations over a single auto-reconnecting
/// connection, so clones are cheap and safe to share across tasks.
#[derive(Clone)]
pub struct RedisStore {
    manager: ConnectionManager,
    key_prefix: String,
}

impl RedisStore {
    pub async fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        let client = redis::Client::open(config.url())
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        tracing::info!(host = %config.host, port = config.port, "state store connected");
        Ok(Self { manager, key_prefix: config.key_prefix.clone() })
    }

    fn conn(&self) -> ConnectionManager {
        self.manager.clone()
    }

    fn k(&self, key: &str) -> String {
        if self.key_prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}{}", self.key_prefix, key)
        }
    }

    fn strip(&self, key: String) -> String {
        key.strip_prefix(&self.key_prefix).map(str::to_string).unwrap_or(key)
    }

    async fn scan(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn();
        let mut keys = Vec::new();
        let mut iter = conn.scan_match::<String, String>(self.k(pattern)).await?;
        while let Some(key) = iter.next_item().await {
            keys.push(key);
        }
        Ok(keys)
    }
}

#[async_trait::async_trait]
impl StateStore for RedisStore {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.conn().get(self.k(key)).await?)
    }

    async fn set_raw(
        &self,
        key: &str,
        value: String,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn();
        match ttl {
            Some(ttl) => {
                let mut cmd = redis::cmd("SET");
                cmd.arg(self.k(key)).arg(value).arg("PX").arg(ttl.as_millis() as u64);
                cmd.query_async::<_, ()>(&mut conn).await?;
            }
            None => conn.set::<_, _, ()>(self.k(key), value).await?,
        }
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.conn().exists(self.k(key)).await?)
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let removed: u64 = self.conn().del(self.k(key)).await?;
        Ok(removed > 0)
    }

    async fn delete_by_pattern(&self, pattern: &str) -> Result<u64, StoreError> {
        let keys = self.scan(pattern).await?;
        if keys.is_empty() {
            return Ok(0);
        }
        let removed: u64 = self.conn().del(keys).await?;
        Ok(removed)
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        Ok(self.scan(pattern).await?.into_iter().map(|k| self.strip(k)).collect())
    }

    async fn get_many_raw(
        &self,
        keys: &[String],
    ) -> Result<HashMap<String, String>, StoreError> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }
        let prefixed: Vec<String> = keys.iter().map(|k| self.k(k)).collect();
        let values: Vec<Option<String>> = redis::cmd("MGET")
            .arg(&prefixed)
            .query_async(&mut self.conn())
            .await?;
        let mut out = HashMap::new();
        for (key, value) in keys.iter().zip(values) {
            if let Some(value) = value {
                out.insert(key.clone(), value);
            }
        }
        Ok(out)
    }

    async fn set_many_raw(
        &self,
        entries: HashMap<String, String>,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut pipe = redis::pipe();
        for (key, value) in &entries {
            match ttl {
                Some(ttl) => {
                    pipe.cmd("SET")
                        .arg(self.k(key))
                        .arg(value)
                        .arg("PX")
                        .arg(ttl.as_millis() as u64)
                        .ignore();
                }
                None => {
                    pipe.cmd("SET").arg(self.k(key)).arg(value).ignore();
                }
            }
        }
        pipe.query_async::<_, ()>(&mut self.conn()).await?;
        Ok(())
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        Ok(self.conn().hget(self.k(key), field).await?)
    }

    async fn hset(&self, key: &str, field: &str, value: String) -> Result<(), StoreError> {
        self.conn().hset::<_, _, _, ()>(self.k(key), field, value).await?;
        Ok(())
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        Ok(self.conn().hgetall(self.k(key)).await?)
    }

    async fn hdelete(&self, key: &str, field: &str) -> Result<bool, StoreError> {
        let removed: u64 = self.conn().hdel(self.k(key), field).await?;
        Ok(removed > 0)
    }

    async fn lpush(&self, key: &str, value: String) -> Result<u64, StoreError> {
        Ok(self.conn().lpush(self.k(key), value).await?)
    }

    async fn rpush(&self, key: &str, value: String) -> Result<u64, StoreError> {
        Ok(self.conn().rpush(self.k(key), value).await?)
    }

    async fn lpop(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.conn().lpop(self.k(key), None).await?)
    }

    async fn rpop(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.conn().rpop(self.k(key), None).await?)
    }

    async fn llen(&self, key: &str) -> Result<u64, StoreError> {
        Ok(self.conn().llen(self.k(key)).await?)
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let added: u64 = self.conn().sadd(self.k(key), member).await?;
        Ok(added > 0)
    }

    async fn srem(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let removed: u64 = self.conn().srem(self.k(key), member).await?;
        Ok(removed > 0)
    }

    async fn scontains(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        Ok(self.conn().sismember(self.k(key), member).await?)
    }

    async fn incr(&self, key: &str, by: i64) -> Result<i64, StoreError> {
        Ok(self.conn().incr(self.k(key), by).await?)
    }

    async fn acquire_lease(
        &self,
        resource: &str,
        owner: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let key = self.k(resource);
        let mut conn = self.conn();
        let taken: Option<String> = redis::cmd("SET")
            .arg(&key)
            .arg(owner)
            .arg("NX")
            .arg("PX")
            .arg(ttl.as_millis() as u64)
            .query_async(&mut conn)
            .await?;
        if taken.is_some() {
            return Ok(true);
        }
        // Reacquire by the current owner refreshes the TTL.
        self.renew_lease(resource, owner, ttl).await
    }

    async fn renew_lease(
        &self,
        resource: &str,
        owner: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        // Extend only while held; comparing the owner string server-side
        // avoids a get/expire race between two engines.
        let script = redis::Script::new(
            r"if redis.call('GET', KEYS[1]) == ARGV[1] then
                return redis.call('PEXPIRE', KEYS[1], ARGV[2])
              else
                return 0
              end",
        );
        let extended: i64 = script
            .key(self.k(resource))
            .arg(owner)
            .arg(ttl.as_millis() as u64)
            .invoke_async(&mut self.conn())
            .await?;
        Ok(extended == 1)
    }

    async fn release_lease(&self, resource: &str, owner: &str) -> Result<bool, StoreError> {
        let script = redis::Script::new(
            r"if redis.call('GET', KEYS[1]) == ARGV[1] then
                return redis.call('DEL', KEYS[1])
              else
                return 0
              end",
        );
        let removed: i64 = script
            .key(self.k(resource))
            .arg(owner)
            .invoke_async(&mut self.conn())
            .await?;
        Ok(removed == 1)
    }
}
