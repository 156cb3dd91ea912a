// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent identity and discovered-service records.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Stable agent identity, issued by the coordinator at first registration.
///
/// Hostname → `AgentId` is injective: re-registering a known hostname
/// returns the existing id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(Uuid);

impl AgentId {
    /// Issue a fresh agent id.
    pub fn issue() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Connection status of an agent as seen by the coordinator.
///
/// Derived from heartbeat age except for `Error`, which is set explicitly
/// and overrides liveness arithmetic until the next heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Connected,
    Disconnected,
    Error,
    Unknown,
}

crate::simple_display! {
    AgentStatus {
        Connected => "connected",
        Disconnected => "disconnected",
        Error => "error",
        Unknown => "unknown",
    }
}

/// Metadata an agent reports about itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentInfo {
    pub id: AgentId,
    pub hostname: String,
    pub ip_address: String,
    pub os_type: String,
    pub os_version: String,
    pub agent_version: String,
    pub cpu_cores: u32,
    pub total_memory_mb: u64,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub environment: String,
    #[serde(default)]
    pub tags: HashMap<String, String>,
    pub status: AgentStatus,
    /// Epoch ms of the last heartbeat; 0 before the first one arrives.
    #[serde(default)]
    pub last_heartbeat_ms: u64,
}

/// Intervals returned to the agent at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSettings {
    pub metrics_interval_s: u32,
    pub heartbeat_interval_s: u32,
    pub discovery_interval_s: u32,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self { metrics_interval_s: 300, heartbeat_interval_s: 30, discovery_interval_s: 600 }
    }
}

/// Status of a service on an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    Running,
    Stopped,
    Starting,
    Stopping,
    Error,
    Unknown,
}

crate::simple_display! {
    ServiceStatus {
        Running => "running",
        Stopped => "stopped",
        Starting => "starting",
        Stopping => "stopping",
        Error => "error",
        Unknown => "unknown",
    }
}

/// A service discovered on an agent, unique by `(agent_id, name)`.
///
/// Created on the first discovery report mentioning it; marked inactive
/// after it is absent from two consecutive full snapshots; destroyed only
/// by explicit admin action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceRecord {
    pub name: String,
    pub display_name: String,
    pub version: String,
    pub status: ServiceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default)]
    pub executable_path: String,
    #[serde(default)]
    pub working_directory: String,
    #[serde(default)]
    pub config_file_path: String,
    #[serde(default)]
    pub startup_type: String,
    #[serde(default)]
    pub service_account: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_start_time_ms: Option<u64>,
    pub is_active: bool,
    /// Consecutive full snapshots this service has been absent from.
    #[serde(default)]
    pub missed_reports: u8,
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;
