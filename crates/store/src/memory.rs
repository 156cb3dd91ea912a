// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory state store.
//!
//! Backs tests and the daemon's `--memory` escape hatch. TTLs are honored
//! against the injected clock so tests can advance time deterministically.

use crate::error::StoreError;
use crate::store::StateStore;
use convoy_core::{Clock, SystemClock};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
enum Value {
    Str(String),
    Hash(HashMap<String, String>),
    List(VecDeque<String>),
    Set(HashSet<String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at_ms: Option<u64>,
}

/// Shared-state in-memory store. Clones share the same map.
#[derive(Clone)]
pub struct MemoryStore<C: Clock = SystemClock> {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
    clock: C,
}

impl MemoryStore<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for MemoryStore<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> MemoryStore<C> {
    pub fn with_clock(clock: C) -> Self {
        Self { entries: Arc::new(Mutex::new(HashMap::new())), clock }
    }

    fn now_ms(&self) -> u64 {
        self.clock.epoch_ms()
    }

    /// Drop the entry if its TTL has lapsed; returns whether it survives.
    fn live<'a>(
        entries: &'a mut HashMap<String, Entry>,
        key: &str,
        now_ms: u64,
    ) -> Option<&'a mut Entry> {
        let expired = entries
            .get(key)
            .and_then(|e| e.expires_at_ms)
            .map(|at| now_ms >= at)
            .unwrap_or(false);
        if expired {
            entries.remove(key);
            return None;
        }
        entries.get_mut(key)
    }

    fn insert(&self, key: &str, value: Value, ttl: Option<Duration>) {
        let expires_at_ms = ttl.map(|t| self.now_ms() + t.as_millis() as u64);
        self.entries
            .lock()
            .insert(key.to_string(), Entry { value, expires_at_ms });
    }

    fn with_str<T>(
        &self,
        key: &str,
        f: impl FnOnce(Option<&str>) -> T,
    ) -> Result<T, StoreError> {
        let mut entries = self.entries.lock();
        match Self::live(&mut entries, key, self.now_ms()) {
            Some(Entry { value: Value::Str(s), .. }) => Ok(f(Some(s.as_str()))),
            Some(_) => Err(StoreError::Operation(format!("wrong type for key {key}"))),
            None => Ok(f(None)),
        }
    }

    fn with_hash<T>(
        &self,
        key: &str,
        f: impl FnOnce(&mut HashMap<String, String>) -> T,
    ) -> Result<T, StoreError> {
        let mut entries = self.entries.lock();
        let now = self.now_ms();
        match Self::live(&mut entries, key, now) {
            Some(Entry { value: Value::Hash(h), .. }) => Ok(f(h)),
            Some(_) => Err(StoreError::Operation(format!("wrong type for key {key}"))),
            None => {
                let mut h = HashMap::new();
                let out = f(&mut h);
                if !h.is_empty() {
                    entries.insert(
                        key.to_string(),
                        Entry { value: Value::Hash(h), expires_at_ms: None },
                    );
                }
                Ok(out)
            }
        }
    }

    fn with_list<T>(
        &self,
        key: &str,
        f: impl FnOnce(&mut VecDeque<String>) -> T,
    ) -> Result<T, StoreError> {
        let mut entries = self.entries.lock();
        let now = self.now_ms();
        match Self::live(&mut entries, key, now) {
            Some(Entry { value: Value::List(l), .. }) => Ok(f(l)),
            Some(_) => Err(StoreError::Operation(format!("wrong type for key {key}"))),
            None => {
                let mut l = VecDeque::new();
                let out = f(&mut l);
                if !l.is_empty() {
                    entries.insert(
                        key.to_string(),
                        Entry { value: Value::List(l), expires_at_ms: None },
                    );
                }
                Ok(out)
            }
        }
    }

    fn with_set<T>(
        &self,
        key: &str,
        f: impl FnOnce(&mut HashSet<String>) -> T,
    ) -> Result<T, StoreError> {
        let mut entries = self.entries.lock();
        let now = self.now_ms();
        match Self::live(&mut entries, key, now) {
            Some(Entry { value: Value::Set(s), .. }) => Ok(f(s)),
            Some(_) => Err(StoreError::Operation(format!("wrong type for key {key}"))),
            None => {
                let mut s = HashSet::new();
                let out = f(&mut s);
                if !s.is_empty() {
                    entries.insert(
                        key.to_string(),
                        Entry { value: Value::Set(s), expires_at_ms: None },
                    );
                }
                Ok(out)
            }
        }
    }
}

/// Minimal glob match supporting `*` (any run) and `?` (any one char).
fn glob_match(pattern: &str, input: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let s: Vec<char> = input.chars().collect();
    // Iterative wildcard match with single backtrack point.
    let (mut pi, mut si) = (0usize, 0usize);
    let (mut star, mut mark) = (None::<usize>, 0usize);
    while si < s.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == s[si]) {
            pi += 1;
            si += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some(pi);
            mark = si;
            pi += 1;
        } else if let Some(sp) = star {
            pi = sp + 1;
            mark += 1;
            si = mark;
        } else {
            return false;
        }
    }
    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}

#[async_trait::async_trait]
impl<C: Clock + 'static> StateStore for MemoryStore<C> {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.with_str(key, |s| s.map(str::to_string))
    }

    async fn set_raw(
        &self,
        key: &str,
        value: String,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        self.insert(key, Value::Str(value), ttl);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let mut entries = self.entries.lock();
        Ok(Self::live(&mut entries, key, self.now_ms()).is_some())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.entries.lock().remove(key).is_some())
    }

    async fn delete_by_pattern(&self, pattern: &str) -> Result<u64, StoreError> {
        let mut entries = self.entries.lock();
        let matched: Vec<String> =
            entries.keys().filter(|k| glob_match(pattern, k)).cloned().collect();
        for key in &matched {
            entries.remove(key);
        }
        Ok(matched.len() as u64)
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let mut entries = self.entries.lock();
        let now = self.now_ms();
        let all: Vec<String> = entries.keys().cloned().collect();
        let mut out = Vec::new();
        for key in all {
            if glob_match(pattern, &key) && Self::live(&mut entries, &key, now).is_some() {
                out.push(key);
            }
        }
        out.sort();
        Ok(out)
    }

    async fn get_many_raw(
        &self,
        keys: &[String],
    ) -> Result<HashMap<String, String>, StoreError> {
        let mut out = HashMap::new();
        for key in keys {
            if let Some(value) = self.with_str(key, |s| s.map(str::to_string))? {
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
        for (key, value) in entries {
            self.insert(&key, Value::Str(value), ttl);
        }
        Ok(())
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        self.with_hash(key, |h| h.get(field).cloned())
    }

    async fn hset(&self, key: &str, field: &str, value: String) -> Result<(), StoreError> {
        self.with_hash(key, |h| {
            h.insert(field.to_string(), value);
        })
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        self.with_hash(key, |h| h.clone())
    }

    async fn hdelete(&self, key: &str, field: &str) -> Result<bool, StoreError> {
        self.with_hash(key, |h| h.remove(field).is_some())
    }

    async fn lpush(&self, key: &str, value: String) -> Result<u64, StoreError> {
        self.with_list(key, |l| {
            l.push_front(value);
            l.len() as u64
        })
    }

    async fn rpush(&self, key: &str, value: String) -> Result<u64, StoreError> {
        self.with_list(key, |l| {
            l.push_back(value);
            l.len() as u64
        })
    }

    async fn lpop(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.with_list(key, |l| l.pop_front())
    }

    async fn rpop(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.with_list(key, |l| l.pop_back())
    }

    async fn llen(&self, key: &str) -> Result<u64, StoreError> {
        self.with_list(key, |l| l.len() as u64)
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        self.with_set(key, |s| s.insert(member.to_string()))
    }

    async fn srem(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        self.with_set(key, |s| s.remove(member))
    }

    async fn scontains(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        self.with_set(key, |s| s.contains(member))
    }

    async fn incr(&self, key: &str, by: i64) -> Result<i64, StoreError> {
        let mut entries = self.entries.lock();
        let now = self.now_ms();
        let current = match Self::live(&mut entries, key, now) {
            Some(Entry { value: Value::Str(s), .. }) => s
                .parse::<i64>()
                .map_err(|_| StoreError::Operation(format!("not an integer: {key}")))?,
            Some(_) => return Err(StoreError::Operation(format!("wrong type for key {key}"))),
            None => 0,
        };
        let next = current + by;
        entries.insert(
            key.to_string(),
            Entry { value: Value::Str(next.to_string()), expires_at_ms: None },
        );
        Ok(next)
    }

    async fn acquire_lease(
        &self,
        resource: &str,
        owner: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let mut entries = self.entries.lock();
        let now = self.now_ms();
        let expires_at_ms = Some(now + ttl.as_millis() as u64);
        match Self::live(&mut entries, resource, now) {
            Some(entry) => match &entry.value {
                Value::Str(held) if held == owner => {
                    entry.expires_at_ms = expires_at_ms;
                    Ok(true)
                }
                _ => Ok(false),
            },
            None => {
                entries.insert(
                    resource.to_string(),
                    Entry { value: Value::Str(owner.to_string()), expires_at_ms },
                );
                Ok(true)
            }
        }
    }

    async fn renew_lease(
        &self,
        resource: &str,
        owner: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let mut entries = self.entries.lock();
        let now = self.now_ms();
        match Self::live(&mut entries, resource, now) {
            Some(entry) => match &entry.value {
                Value::Str(held) if held == owner => {
                    entry.expires_at_ms = Some(now + ttl.as_millis() as u64);
                    Ok(true)
                }
                _ => Ok(false),
            },
            None => Ok(false),
        }
    }

    async fn release_lease(&self, resource: &str, owner: &str) -> Result<bool, StoreError> {
        let mut entries = self.entries.lock();
        let now = self.now_ms();
        let held = match Self::live(&mut entries, resource, now) {
            Some(Entry { value: Value::Str(held), .. }) => held == owner,
            _ => false,
        };
        if held {
            entries.remove(resource);
        }
        Ok(held)
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
