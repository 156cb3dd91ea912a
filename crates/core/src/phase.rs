// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Phases and steps of a planned workflow.

use crate::agent::AgentId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

crate::define_id! {
    /// Unique identifier for a phase within a workflow.
    pub struct PhaseId("phs-");
}

crate::define_id! {
    /// Unique identifier for a step within a phase.
    pub struct StepId("stp-");
}

/// Kind of phase. PreDeploy precedes all Waves; PostDeploy and Cleanup
/// follow all Waves; Cleanup never triggers rollback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseKind {
    PreDeploy,
    Wave,
    PostDeploy,
    Cleanup,
}

crate::simple_display! {
    PhaseKind {
        PreDeploy => "pre_deploy",
        Wave => "wave",
        PostDeploy => "post_deploy",
        Cleanup => "cleanup",
    }
}

/// Execution state of a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Skipped,
}

impl PhaseState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PhaseState::Succeeded | PhaseState::Failed | PhaseState::Skipped)
    }
}

crate::simple_display! {
    PhaseState {
        Pending => "pending",
        Running => "running",
        Succeeded => "succeeded",
        Failed => "failed",
        Skipped => "skipped",
    }
}

/// Post-step condition that must hold to proceed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HealthGate {
    /// How long to wait for server entries to converge.
    #[serde(with = "crate::macros::duration_ms")]
    pub timeout: Duration,
    /// Fraction of servers (0.0..=1.0) that must succeed.
    pub success_ratio: f64,
}

impl Default for HealthGate {
    fn default() -> Self {
        Self { timeout: Duration::from_secs(60), success_ratio: 1.0 }
    }
}

/// Kind of step within a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Validation,
    Command,
    HealthCheck,
    Wait,
    Script,
}

crate::simple_display! {
    StepKind {
        Validation => "validation",
        Command => "command",
        HealthCheck => "health_check",
        Wait => "wait",
        Script => "script",
    }
}

/// Per-server progress of a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerStepState {
    Pending,
    Issued,
    Accepted,
    Running,
    Succeeded,
    Failed,
    Rejected,
    TimedOut,
}

impl ServerStepState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ServerStepState::Succeeded
                | ServerStepState::Failed
                | ServerStepState::Rejected
                | ServerStepState::TimedOut
        )
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ServerStepState::Succeeded)
    }
}

crate::simple_display! {
    ServerStepState {
        Pending => "pending",
        Issued => "issued",
        Accepted => "accepted",
        Running => "running",
        Succeeded => "succeeded",
        Failed => "failed",
        Rejected => "rejected",
        TimedOut => "timed_out",
    }
}

/// A unit of work within a phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub id: StepId,
    pub name: String,
    pub kind: StepKind,
    /// Strategy-specific parameters (operation, wait duration, script name).
    #[serde(default)]
    pub params: HashMap<String, String>,
    /// A critical step failing fails its phase regardless of ratios.
    pub critical: bool,
    /// Per-server progress, keyed by agent id string. Empty at plan time.
    #[serde(default)]
    pub servers: HashMap<String, ServerStepState>,
}

impl Step {
    pub fn new(name: impl Into<String>, kind: StepKind) -> Self {
        Self {
            id: StepId::new(),
            name: name.into(),
            kind,
            params: HashMap::new(),
            critical: false,
            servers: HashMap::new(),
        }
    }

    pub fn critical(mut self) -> Self {
        self.critical = true;
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// All server entries have reached a terminal state.
    pub fn is_converged(&self) -> bool {
        !self.servers.is_empty() && self.servers.values().all(|s| s.is_terminal())
    }

    /// Fraction of server entries that succeeded.
    pub fn success_ratio(&self) -> f64 {
        if self.servers.is_empty() {
            return 1.0;
        }
        let ok = self.servers.values().filter(|s| s.is_success()).count();
        ok as f64 / self.servers.len() as f64
    }
}

/// A named segment of a workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Phase {
    pub id: PhaseId,
    pub name: String,
    pub kind: PhaseKind,
    pub target_servers: Vec<AgentId>,
    pub steps: Vec<Step>,
    pub rollback_on_failure: bool,
    /// Percent of the wave allowed to fail before the phase fails.
    pub max_failure_pct: u8,
    pub gate: HealthGate,
    pub state: PhaseState,
    /// Index of the step currently executing.
    #[serde(default)]
    pub current_step: usize,
    /// Run servers one at a time with this delay instead of fanning out.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde(with = "option_duration_ms")]
    pub serial_delay: Option<Duration>,
    /// Cap on concurrent per-server dispatch within this phase.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_parallelism: Option<usize>,
    /// Manual gate: on success the workflow pauses pending external resume.
    #[serde(default)]
    pub pause_on_success: bool,
}

impl Phase {
    pub fn new(name: impl Into<String>, kind: PhaseKind) -> Self {
        Self {
            id: PhaseId::new(),
            name: name.into(),
            kind,
            target_servers: Vec::new(),
            steps: Vec::new(),
            rollback_on_failure: kind != PhaseKind::Cleanup,
            max_failure_pct: 0,
            gate: HealthGate::default(),
            state: PhaseState::Pending,
            current_step: 0,
            serial_delay: None,
            max_parallelism: None,
            pause_on_success: false,
        }
    }

    crate::setters! {
        set {
            target_servers: Vec<AgentId>,
            steps: Vec<Step>,
            rollback_on_failure: bool,
            max_failure_pct: u8,
            gate: HealthGate,
            pause_on_success: bool,
        }
        option {
            serial_delay: Duration,
            max_parallelism: usize,
        }
    }

    pub fn active_step(&self) -> Option<&Step> {
        self.steps.get(self.current_step)
    }

    pub fn active_step_mut(&mut self) -> Option<&mut Step> {
        self.steps.get_mut(self.current_step)
    }
}

mod option_duration_ms {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        d.map(|d| d.as_millis() as u64).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        let millis = Option::<u64>::deserialize(d)?;
        Ok(millis.map(Duration::from_millis))
    }
}

#[cfg(test)]
#[path = "phase_tests.rs"]
mod tests;
