// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration: one TOML file covering every component.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// `convoy.toml` — all sections optional, every option defaulted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub broker: convoy_fabric::FabricConfig,
    pub store: convoy_store::StoreConfig,
    pub transport: convoy_transport::TransportConfig,
    pub engine: convoy_engine::EngineConfig,
    pub log: LogConfig,
    /// Run against the in-memory store instead of Redis. Workflow state
    /// then dies with the process; only for development.
    pub memory_store: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Directory for rotated daemon logs; empty logs to stderr only.
    pub dir: Option<PathBuf>,
    /// Default filter when RUST_LOG is unset.
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { dir: None, filter: "info".to_string() }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

impl DaemonConfig {
    /// Load from a TOML file; a missing file yields pure defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
