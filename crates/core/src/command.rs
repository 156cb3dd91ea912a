// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command and status wire messages that drive per-server execution.

use crate::agent::AgentId;
use crate::phase::{PhaseId, StepId};
use crate::workflow::{PackageRef, StrategyKind, WorkflowId};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Deterministic per-command dedup key.
///
/// Derived from `(workflow, phase, step, agent, attempt)` so a retry of the
/// same attempt targets the same id (agent-side dedup) while a new attempt
/// produces a fresh id. Format: `cmd-` + 19 hex chars of SHA-256.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandId(pub crate::id::IdBuf);

impl CommandId {
    pub const PREFIX: &'static str = "cmd-";

    pub fn derive(
        workflow: WorkflowId,
        phase: PhaseId,
        step: StepId,
        agent: AgentId,
        attempt: u32,
    ) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(workflow.as_str().as_bytes());
        hasher.update(b"\x00");
        hasher.update(phase.as_str().as_bytes());
        hasher.update(b"\x00");
        hasher.update(step.as_str().as_bytes());
        hasher.update(b"\x00");
        hasher.update(agent.to_string().as_bytes());
        hasher.update(b"\x00");
        hasher.update(attempt.to_be_bytes());
        let digest = hasher.finalize();
        let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
        Self(crate::id::IdBuf::new(&format!("{}{}", Self::PREFIX, &hex[..19])))
    }

    /// Random id for the synchronous admin path, where there is no
    /// workflow to derive from.
    pub fn fresh() -> Self {
        Self(crate::id::IdBuf::new(&format!("{}{}", Self::PREFIX, nanoid::nanoid!(19))))
    }

    pub fn from_string(id: impl AsRef<str>) -> Self {
        Self(crate::id::IdBuf::new(id.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl std::fmt::Display for CommandId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.as_str())
    }
}

impl std::borrow::Borrow<str> for CommandId {
    fn borrow(&self) -> &str {
        self.0.as_str()
    }
}

/// Operation an agent is asked to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Deploy,
    Rollback,
    Stop,
    Start,
    Restart,
    HealthCheck,
    /// Blue-green cut-over: update load-balancer config to the new color.
    SwitchTraffic,
    /// Run a named maintenance script (cleanup, cache warmup, test suites).
    Script,
}

crate::simple_display! {
    Operation {
        Deploy => "deploy",
        Rollback => "rollback",
        Stop => "stop",
        Start => "start",
        Restart => "restart",
        HealthCheck => "health_check",
        SwitchTraffic => "switch_traffic",
        Script => "script",
    }
}

impl Operation {
    /// Parse the planner's `operation` step parameter.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "deploy" => Some(Operation::Deploy),
            "rollback" => Some(Operation::Rollback),
            "stop" => Some(Operation::Stop),
            "start" => Some(Operation::Start),
            "restart" => Some(Operation::Restart),
            "health_check" => Some(Operation::HealthCheck),
            "switch_traffic" => Some(Operation::SwitchTraffic),
            "script" => Some(Operation::Script),
            _ => None,
        }
    }
}

/// A deployment command published to a single agent.
///
/// Agents must treat `command_id` as the dedup key: a duplicate id after
/// completion returns the original result without re-executing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentCommand {
    pub command_id: CommandId,
    pub workflow_id: WorkflowId,
    pub phase_id: PhaseId,
    pub step_id: StepId,
    pub agent_id: AgentId,
    pub service_name: String,
    pub version: String,
    pub strategy: StrategyKind,
    pub operation: Operation,
    pub priority: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<PackageRef>,
    /// Step parameters forwarded to the agent (script name, checksum,
    /// traffic color).
    #[serde(default, skip_serializing_if = "std::collections::HashMap::is_empty")]
    pub params: std::collections::HashMap<String, String>,
    pub issued_at_ms: u64,
    pub deadline_ms: u64,
    pub correlation_id: String,
}

impl DeploymentCommand {
    /// Routing key for the command queue: `command.{op-group}.{agent}`.
    pub fn routing_key(&self) -> String {
        let group = match self.operation {
            Operation::Deploy | Operation::HealthCheck | Operation::SwitchTraffic => "deploy",
            Operation::Rollback => "rollback",
            Operation::Stop | Operation::Start | Operation::Restart | Operation::Script => {
                "control"
            }
        };
        format!("command.{}.{}", group, self.agent_id)
    }
}

/// Progress phase reported back for a command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusPhase {
    Accepted,
    Running,
    /// Percent complete, 0..=100.
    Progress(u8),
    Succeeded,
    Failed(String),
    Rejected(String),
}

impl StatusPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StatusPhase::Succeeded | StatusPhase::Failed(_) | StatusPhase::Rejected(_)
        )
    }
}

crate::simple_display! {
    StatusPhase {
        Accepted => "accepted",
        Running => "running",
        Progress(..) => "progress",
        Succeeded => "succeeded",
        Failed(..) => "failed",
        Rejected(..) => "rejected",
    }
}

/// A status update correlated back to a command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub command_id: CommandId,
    pub workflow_id: WorkflowId,
    pub agent_id: AgentId,
    pub timestamp_ms: u64,
    pub phase: StatusPhase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl StatusUpdate {
    /// Routing key for the status queue: `status.{workflow}`.
    pub fn routing_key(&self) -> String {
        format!("status.{}", self.workflow_id)
    }
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
