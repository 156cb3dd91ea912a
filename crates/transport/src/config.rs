// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transport configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Listener and session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// TCP bind address for remote agents.
    pub bind_addr: String,
    /// Optional local Unix socket (trusted, no token required).
    pub unix_socket_path: Option<PathBuf>,
    /// Bearer token remote agents must present in the Hello handshake.
    pub auth_token: Option<String>,
    /// TLS certificate/key for the TCP listener. When unset, non-loopback
    /// binds are refused unless `allow_insecure` is set (for deployments
    /// that terminate TLS in front of the coordinator).
    pub tls_cert_path: Option<PathBuf>,
    pub tls_key_path: Option<PathBuf>,
    pub allow_insecure: bool,
    /// Per-frame read timeout.
    pub read_timeout_s: u64,
    /// Deadline for a pushed command's result.
    pub command_timeout_s: u64,
    /// Cap on commands piggybacked onto one heartbeat response.
    pub max_piggyback_commands: usize,
    /// Chunk size for deployment streaming.
    pub deploy_chunk_bytes: usize,
    /// Deadline for a full deployment stream to reach a terminal phase.
    pub deploy_timeout_s: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:7331".to_string(),
            unix_socket_path: None,
            auth_token: None,
            tls_cert_path: None,
            tls_key_path: None,
            allow_insecure: false,
            read_timeout_s: 120,
            command_timeout_s: 30,
            max_piggyback_commands: 16,
            deploy_chunk_bytes: 256 * 1024,
            deploy_timeout_s: 600,
        }
    }
}

impl TransportConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_s)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_s)
    }

    pub fn deploy_timeout(&self) -> Duration {
        Duration::from_secs(self.deploy_timeout_s)
    }

    /// Refuse configurations that would expose the plain protocol off-box.
    pub fn validate(&self) -> Result<(), String> {
        let loopback = self.bind_addr.starts_with("127.") || self.bind_addr.starts_with("[::1]");
        let tls = self.tls_cert_path.is_some() && self.tls_key_path.is_some();
        if !loopback && !tls && !self.allow_insecure {
            return Err(format!(
                "refusing non-loopback bind {} without TLS; set allow_insecure to override",
                self.bind_addr
            ));
        }
        if !loopback && self.auth_token.is_none() {
            return Err("non-loopback bind requires an auth token".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
