// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::agent::{AgentId, AgentInfo, AgentStatus, ServiceRecord, ServiceStatus};
use crate::command::{CommandId, StatusPhase, StatusUpdate};
use crate::phase::{Phase, PhaseKind, Step, StepKind};
use crate::workflow::{
    DeploymentWorkflow, PackageRef, StrategyKind, WorkflowId, WorkflowMetrics, WorkflowState,
};
use std::collections::HashMap;

// ── Proptest strategies ─────────────────────────────────────────────────

/// Proptest strategies for core state machine types.
pub mod strategies {
    use crate::workflow::WorkflowState;
    use proptest::prelude::*;

    pub fn arb_workflow_state() -> impl Strategy<Value = WorkflowState> {
        prop_oneof![
            Just(WorkflowState::Pending),
            Just(WorkflowState::Planning),
            Just(WorkflowState::Running),
            Just(WorkflowState::Paused),
            Just(WorkflowState::Succeeded),
            Just(WorkflowState::Failed),
            Just(WorkflowState::RollingBack),
            Just(WorkflowState::RolledBack),
            Just(WorkflowState::Canceled),
        ]
    }
}

// ── Factory functions ───────────────────────────────────────────────────

pub fn agent_info(hostname: &str) -> AgentInfo {
    AgentInfo {
        id: AgentId::issue(),
        hostname: hostname.to_string(),
        ip_address: "10.0.0.1".to_string(),
        os_type: "linux".to_string(),
        os_version: "6.1".to_string(),
        agent_version: "0.1.0".to_string(),
        cpu_cores: 8,
        total_memory_mb: 16_384,
        location: String::new(),
        environment: "test".to_string(),
        tags: HashMap::new(),
        status: AgentStatus::Unknown,
        last_heartbeat_ms: 0,
    }
}

pub fn service_record(name: &str, status: ServiceStatus) -> ServiceRecord {
    ServiceRecord {
        name: name.to_string(),
        display_name: name.to_string(),
        version: "1.0.0".to_string(),
        status,
        process_id: None,
        port: None,
        executable_path: format!("/opt/{name}/bin/{name}"),
        working_directory: format!("/opt/{name}"),
        config_file_path: String::new(),
        startup_type: "automatic".to_string(),
        service_account: String::new(),
        last_start_time_ms: None,
        is_active: true,
        missed_reports: 0,
    }
}

pub fn package_ref() -> PackageRef {
    PackageRef {
        path: "/packages/api-2.0.0.tar.gz".to_string(),
        sha256: "a".repeat(64),
    }
}

pub fn workflow(service: &str, strategy: StrategyKind, phases: Vec<Phase>) -> DeploymentWorkflow {
    DeploymentWorkflow {
        id: WorkflowId::new(),
        service_name: service.to_string(),
        target_version: "2.0.0".to_string(),
        strategy,
        package: package_ref(),
        initiated_by: "tester".to_string(),
        priority: 5,
        created_at_ms: 1_000_000,
        state: WorkflowState::Pending,
        phases,
        current_phase: 0,
        metrics: WorkflowMetrics::default(),
        deadline_ms: 2_000_000,
        last_error: None,
        attempt: 0,
        rollback_started: false,
    }
}

pub fn wave_phase(name: &str, servers: Vec<AgentId>) -> Phase {
    let step = Step::new("deploy", StepKind::Command).param("operation", "deploy").critical();
    Phase::new(name, PhaseKind::Wave)
        .target_servers(servers)
        .steps(vec![step])
        .max_failure_pct(25)
}

pub fn status_update(command_id: CommandId, workflow_id: WorkflowId, agent_id: AgentId, phase: StatusPhase) -> StatusUpdate {
    StatusUpdate {
        command_id,
        workflow_id,
        agent_id,
        timestamp_ms: 1_000_000,
        phase,
        details: None,
    }
}
