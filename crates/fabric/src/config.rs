// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Broker configuration and per-message properties.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Broker connection and behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FabricConfig {
    pub host_name: String,
    pub port: u16,
    pub user_name: String,
    pub password: String,
    pub vhost: String,
    pub tls: bool,
    pub heartbeat_s: u16,
    pub recovery_interval_s: u64,
    pub auto_recover: bool,
    /// Topic exchange all traffic routes through.
    pub exchange: String,
    /// Direct dead-letter exchange.
    pub dlx: String,
    /// Default per-queue message TTL.
    pub message_ttl_s: u64,
    pub max_retries: u32,
    /// Additional hosts tried in order when the primary is unreachable.
    pub cluster_hosts: Vec<String>,
    pub max_conn_pool: usize,
    pub min_conn_pool: usize,
    /// Unacked deliveries dispatched concurrently per consumer.
    pub prefetch: u16,
    pub batch_size: usize,
    pub consumer_threads: usize,
    /// Token-bucket cap on outbound publishes.
    pub max_messages_per_second: u32,
    pub max_concurrent_operations: usize,
    /// Deadline for a publish to be confirmed by the broker.
    pub publish_timeout_s: u64,
}

impl Default for FabricConfig {
    fn default() -> Self {
        Self {
            host_name: "127.0.0.1".to_string(),
            port: 5672,
            user_name: "guest".to_string(),
            password: "guest".to_string(),
            vhost: "/".to_string(),
            tls: false,
            heartbeat_s: 30,
            recovery_interval_s: 5,
            auto_recover: true,
            exchange: "convoy".to_string(),
            dlx: "convoy.dlx".to_string(),
            message_ttl_s: 3_600,
            max_retries: 5,
            cluster_hosts: Vec::new(),
            max_conn_pool: 4,
            min_conn_pool: 1,
            prefetch: 32,
            batch_size: 100,
            consumer_threads: 4,
            max_messages_per_second: 500,
            max_concurrent_operations: 256,
            publish_timeout_s: 10,
        }
    }
}

impl FabricConfig {
    /// AMQP URI for the primary host.
    pub fn amqp_uri(&self) -> String {
        self.uri_for(&self.host_name)
    }

    /// AMQP URI for a specific host (primary or cluster member).
    pub fn uri_for(&self, host: &str) -> String {
        let scheme = if self.tls { "amqps" } else { "amqp" };
        let vhost = if self.vhost == "/" { String::new() } else { self.vhost.clone() };
        format!(
            "{}://{}:{}@{}:{}/{}",
            scheme, self.user_name, self.password, host, self.port, vhost
        )
    }

    /// Primary host followed by cluster members, in connection order.
    pub fn hosts(&self) -> Vec<String> {
        let mut hosts = vec![self.host_name.clone()];
        hosts.extend(self.cluster_hosts.iter().cloned());
        hosts
    }
}

/// Per-message publish properties.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageProps {
    /// 0–10; only honored by `priority.*` queues.
    pub priority: Option<u8>,
    pub correlation_id: Option<String>,
    /// Per-message expiration override.
    pub expiration_ms: Option<u64>,
    /// Defaults to a fresh UUID when unset.
    pub message_id: Option<String>,
    pub headers: HashMap<String, String>,
}

impl MessageProps {
    pub fn priority(mut self, priority: u8) -> Self {
        self.priority = Some(priority.min(10));
        self
    }

    pub fn correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    pub fn expiration_ms(mut self, ms: u64) -> Self {
        self.expiration_ms = Some(ms);
        self
    }

    pub fn message_id(mut self, id: impl Into<String>) -> Self {
        self.message_id = Some(id.into());
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
