// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deployment workflow identity and state machine.

use crate::agent::AgentId;
use crate::error::WorkflowError;
use crate::phase::{Phase, PhaseState};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

crate::define_id! {
    /// Unique identifier for a deployment workflow instance.
    pub struct WorkflowId("wfl-");
}

/// Deployment strategy selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Rolling,
    BlueGreen,
    Canary,
    Immediate,
}

crate::simple_display! {
    StrategyKind {
        Rolling => "rolling",
        BlueGreen => "blue_green",
        Canary => "canary",
        Immediate => "immediate",
    }
}

/// Content-addressed deployment package reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRef {
    pub path: String,
    /// Hex SHA-256 of the package content.
    pub sha256: String,
}

/// Workflow lifecycle state.
///
/// ```text
/// Pending → Planning → Running ⇄ Paused
/// Running → {Succeeded, Failed, Canceled}
/// Failed  → RollingBack → RolledBack
/// ```
///
/// Terminal states are sinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    Pending,
    Planning,
    Running,
    Paused,
    Succeeded,
    Failed,
    RollingBack,
    RolledBack,
    Canceled,
}

impl WorkflowState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkflowState::Succeeded
                | WorkflowState::Failed
                | WorkflowState::RolledBack
                | WorkflowState::Canceled
        )
    }

    /// Whether `next` is a legal direct transition from `self`.
    pub fn can_transition_to(&self, next: WorkflowState) -> bool {
        use WorkflowState::*;
        if self.is_terminal() {
            return false;
        }
        matches!(
            (self, next),
            (Pending, Planning)
                | (Pending, Canceled)
                | (Planning, Running)
                | (Planning, Failed)
                | (Planning, Canceled)
                | (Running, Paused)
                | (Running, Succeeded)
                | (Running, Failed)
                | (Running, RollingBack)
                | (Running, Canceled)
                | (Paused, Running)
                | (Paused, Canceled)
                | (Paused, Failed)
                | (Paused, RollingBack)
                | (RollingBack, RolledBack)
                | (RollingBack, Failed)
        )
    }
}

crate::simple_display! {
    WorkflowState {
        Pending => "pending",
        Planning => "planning",
        Running => "running",
        Paused => "paused",
        Succeeded => "succeeded",
        Failed => "failed",
        RollingBack => "rolling_back",
        RolledBack => "rolled_back",
        Canceled => "canceled",
    }
}

/// Per-server success/failure tallies for a workflow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowMetrics {
    pub succeeded: HashMap<String, u32>,
    pub failed: HashMap<String, u32>,
}

impl WorkflowMetrics {
    pub fn record_success(&mut self, agent: &AgentId) {
        *self.succeeded.entry(agent.to_string()).or_insert(0) += 1;
    }

    pub fn record_failure(&mut self, agent: &AgentId) {
        *self.failed.entry(agent.to_string()).or_insert(0) += 1;
    }
}

/// A deployment workflow instance.
///
/// The workflow owns its phases; phases refer back by index, never by
/// pointer. `current_phase` is monotonically non-decreasing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentWorkflow {
    pub id: WorkflowId,
    pub service_name: String,
    pub target_version: String,
    pub strategy: StrategyKind,
    pub package: PackageRef,
    pub initiated_by: String,
    pub priority: u8,
    pub created_at_ms: u64,
    pub state: WorkflowState,
    pub phases: Vec<Phase>,
    pub current_phase: usize,
    pub metrics: WorkflowMetrics,
    /// Epoch ms by which the workflow must reach a terminal state.
    pub deadline_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<WorkflowError>,
    /// Attempt counter for deterministic command-id derivation. Bumped when
    /// unanswered commands are reissued after a resume.
    #[serde(default)]
    pub attempt: u32,
    /// Set once rollback has been initiated; makes rollback idempotent.
    #[serde(default)]
    pub rollback_started: bool,
}

impl DeploymentWorkflow {
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Apply a state transition, enforcing monotonicity of terminal states.
    ///
    /// Returns the previous state on success.
    pub fn transition(&mut self, next: WorkflowState) -> Result<WorkflowState, WorkflowError> {
        if self.state == next {
            return Ok(self.state);
        }
        if !self.state.can_transition_to(next) {
            return Err(WorkflowError::internal(format!(
                "illegal transition {} -> {}",
                self.state, next
            )));
        }
        let prev = self.state;
        self.state = next;
        Ok(prev)
    }

    /// Advance to the next phase. The index never decreases.
    pub fn advance_phase(&mut self) {
        if self.current_phase < self.phases.len() {
            self.current_phase += 1;
        }
    }

    pub fn active_phase(&self) -> Option<&Phase> {
        self.phases.get(self.current_phase)
    }

    pub fn active_phase_mut(&mut self) -> Option<&mut Phase> {
        self.phases.get_mut(self.current_phase)
    }

    /// Summary view for status queries. No stack traces, no internals.
    pub fn status(&self) -> WorkflowStatus {
        WorkflowStatus {
            id: self.id,
            state: self.state,
            current_phase: self
                .phases
                .get(self.current_phase)
                .map(|p| p.name.clone())
                .unwrap_or_default(),
            phase_states: self.phases.iter().map(|p| (p.name.clone(), p.state)).collect(),
            servers: self.server_matrix(),
            last_error: self.last_error.clone(),
            created_at_ms: self.created_at_ms,
            deadline_ms: self.deadline_ms,
        }
    }

    /// Latest per-server step state across all phases.
    fn server_matrix(&self) -> HashMap<String, String> {
        let mut matrix = HashMap::new();
        for phase in &self.phases {
            for step in &phase.steps {
                for (server, state) in &step.servers {
                    matrix.insert(server.clone(), state.to_string());
                }
            }
        }
        matrix
    }
}

/// Stable status surface exposed to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowStatus {
    pub id: WorkflowId,
    pub state: WorkflowState,
    pub current_phase: String,
    pub phase_states: Vec<(String, PhaseState)>,
    pub servers: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<WorkflowError>,
    pub created_at_ms: u64,
    pub deadline_ms: u64,
}

#[cfg(test)]
#[path = "workflow_tests.rs"]
mod tests;
