// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Store connection configuration

use serde::{Deserialize, Serialize};

/// Connection settings for the Redis-backed store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub database: u8,
    pub tls: bool,
    /// Prefix prepended to every key, for shared instances.
    pub key_prefix: String,
    pub connect_timeout_s: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            username: None,
            password: None,
            database: 0,
            tls: false,
            key_prefix: String::new(),
            connect_timeout_s: 5,
        }
    }
}

impl StoreConfig {
    /// Connection URL in the form `redis://[user[:pass]@]host:port/db`.
    pub fn url(&self) -> String {
        let scheme = if self.tls { "rediss" } else { "redis" };
        let auth = match (&self.username, &self.password) {
            (Some(user), Some(pass)) => format!("{user}:{pass}@"),
            (None, Some(pass)) => format!(":{pass}@"),
            _ => String::new(),
        };
        format!("{}://{}{}:{}/{}", scheme, auth, self.host, self.port, self.database)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
