// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connection and channel pooling with bounded-backoff recovery.

use crate::config::FabricConfig;
use crate::error::FabricError;
use lapin::options::ConfirmSelectOptions;
use lapin::{Channel, Connection, ConnectionProperties};
use parking_lot::Mutex;
use rand::Rng;
use std::time::Duration;

/// Pooled broker connections and channels.
///
/// Channels are never shared by concurrent publishers: each publisher
/// borrows one with [`checkout`](Self::checkout) and returns it with
/// [`checkin`](Self::checkin). All channels have publisher confirms
/// enabled.
pub struct ChannelPool {
    config: FabricConfig,
    connections: tokio::sync::Mutex<Vec<Connection>>,
    idle: Mutex<Vec<Channel>>,
}

impl ChannelPool {
    /// Connect to the broker, trying the primary host then cluster members,
    /// retrying with bounded exponential backoff up to `max_retries`.
    pub async fn connect(config: FabricConfig) -> Result<Self, FabricError> {
        let connection = Self::connect_any(&config).await?;
        let pool = Self {
            config,
            connections: tokio::sync::Mutex::new(vec![connection]),
            idle: Mutex::new(Vec::new()),
        };
        // Warm the pool to the configured minimum.
        for _ in 0..pool.config.min_conn_pool.saturating_sub(1) {
            let conn = Self::connect_any(&pool.config).await?;
            pool.connections.lock().await.push(conn);
        }
        Ok(pool)
    }

    async fn connect_any(config: &FabricConfig) -> Result<Connection, FabricError> {
        let mut last_err = None;
        for attempt in 0..=config.max_retries {
            for host in config.hosts() {
                match Connection::connect(&config.uri_for(&host), ConnectionProperties::default())
                    .await
                {
                    Ok(conn) => {
                        tracing::info!(%host, attempt, "broker connected");
                        return Ok(conn);
                    }
                    Err(e) => {
                        tracing::warn!(%host, attempt, error = %e, "broker connect failed");
                        last_err = Some(e);
                    }
                }
            }
            if attempt < config.max_retries {
                tokio::time::sleep(backoff(config.recovery_interval_s, attempt)).await;
            }
        }
        Err(FabricError::Unavailable(
            last_err.map(|e| e.to_string()).unwrap_or_else(|| "no hosts configured".to_string()),
        ))
    }

    /// Borrow a channel with confirms enabled.
    pub async fn checkout(&self) -> Result<Channel, FabricError> {
        loop {
            let candidate = self.idle.lock().pop();
            match candidate {
                Some(channel) if channel.status().connected() => return Ok(channel),
                Some(_) => continue, // dead channel, drop and try the next
                None => break,
            }
        }
        self.create_channel().await
    }

    /// Return a borrowed channel to the pool.
    pub fn checkin(&self, channel: Channel) {
        if !channel.status().connected() {
            return;
        }
        let mut idle = self.idle.lock();
        if idle.len() < self.config.max_conn_pool * 4 {
            idle.push(channel);
        }
    }

    async fn create_channel(&self) -> Result<Channel, FabricError> {
        let mut connections = self.connections.lock().await;

        // Drop dead connections; reconnect if the pool ran dry.
        connections.retain(|c| c.status().connected());
        if connections.is_empty() {
            if !self.config.auto_recover {
                return Err(FabricError::Unavailable("connection lost".to_string()));
            }
            let conn = Self::connect_any(&self.config).await?;
            connections.push(conn);
        } else if connections.len() < self.config.min_conn_pool {
            // Refill toward the configured minimum after a partial outage.
            if let Ok(conn) = Self::connect_any(&self.config).await {
                connections.push(conn);
            }
        }

        // Round-robin over live connections.
        let index = self.idle.lock().len() % connections.len();
        let channel = connections[index].create_channel().await?;
        channel.confirm_select(ConfirmSelectOptions::default()).await?;
        Ok(channel)
    }
}

/// Exponential backoff with jitter, capped at 60s.
pub(crate) fn backoff(base_s: u64, attempt: u32) -> Duration {
    let base = base_s.max(1);
    let exp = base.saturating_mul(1u64 << attempt.min(6));
    let capped = exp.min(60);
    let jitter_ms = rand::thread_rng().gen_range(0..500);
    Duration::from_secs(capped) + Duration::from_millis(jitter_ms)
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;
