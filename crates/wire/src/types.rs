// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent RPC data transfer objects.

use convoy_core::{AgentId, AgentSettings, CommandId, ServiceStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Sent by an agent to establish or refresh its identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRegistration {
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
}

/// Registration outcome. Registration is idempotent over repeated calls:
/// a known hostname gets its existing `server_id` back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrationResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_id: Option<AgentId>,
    pub message: String,
    pub settings: AgentSettings,
}

/// Periodic liveness signal with coarse utilization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatRequest {
    pub server_id: AgentId,
    pub hostname: String,
    pub agent_status: String,
    pub timestamp_ms: u64,
    pub cpu_pct: f64,
    pub mem_mb: u64,
    pub service_count: u32,
}

/// Heartbeat ack, optionally piggybacking high-priority commands for
/// brokerless fallback paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatResponse {
    pub success: bool,
    pub message: String,
    #[serde(default)]
    pub pending_commands: Vec<ServiceCommand>,
}

/// A service as the agent discovered it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredService {
    pub name: String,
    pub display_name: String,
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
    #[serde(default)]
    pub version: String,
}

/// Full service snapshot; services absent from it are marked inactive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDiscovery {
    pub server_id: AgentId,
    pub services: Vec<DiscoveredService>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDiscoveryResponse {
    pub success: bool,
    pub message: String,
}

/// One metric sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_id: Option<String>,
    pub metric_type: String,
    pub metric_name: String,
    pub value: f64,
    pub unit: String,
    pub timestamp_ms: u64,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

/// Client-streamed metrics batch; batches are atomic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsBatch {
    pub server_id: AgentId,
    pub metrics: Vec<MetricSample>,
}

/// Summary returned when a metrics stream completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub accepted: u64,
    pub batches: u64,
}

/// Synchronous admin command pushed to an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceCommand {
    pub command_id: CommandId,
    pub server_id: AgentId,
    pub service_name: String,
    /// One of `start`, `stop`, `restart`, `status`.
    pub command: String,
    pub issued_at_ms: u64,
}

/// Result of a [`ServiceCommand`]. Timeouts produce a deterministic
/// failure result, never a hang.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResult {
    pub command_id: CommandId,
    pub success: bool,
    pub message: String,
    pub exit_code: i32,
    pub executed_at_ms: u64,
}

/// Progress phases for a streamed deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployStatus {
    Pending,
    Received,
    Verified,
    Applied,
    Started,
    HealthOk,
    Failed,
}

convoy_core::simple_display! {
    DeployStatus {
        Pending => "pending",
        Received => "received",
        Verified => "verified",
        Applied => "applied",
        Started => "started",
        HealthOk => "health_ok",
        Failed => "failed",
    }
}

/// Progress frame streamed back while a deployment package is applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentProgress {
    pub status: DeployStatus,
    pub message: String,
    pub progress_percent: u8,
    pub timestamp_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollbackRequest {
    pub service_name: String,
    pub target_version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollbackResult {
    pub success: bool,
    pub message: String,
    pub previous_version: String,
    pub current_version: String,
}

#[cfg(test)]
#[path = "types_tests.rs"]
mod tests;
