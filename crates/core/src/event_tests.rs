// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn fleet_event_summaries_name_the_agent() {
    let agent_id = AgentId::issue();
    let event = FleetEvent::AgentConnected { agent_id, hostname: "server-01".into() };
    let summary = event.log_summary();
    assert!(summary.contains("server-01"));
    assert!(summary.contains("agent_connected"));
}

#[test]
fn service_change_summary_names_both_states() {
    let event = FleetEvent::ServiceStateChanged {
        agent_id: AgentId::issue(),
        service: "api".into(),
        from: crate::agent::ServiceStatus::Running,
        to: crate::agent::ServiceStatus::Error,
    };
    let summary = event.log_summary();
    assert!(summary.contains("running"));
    assert!(summary.contains("error"));
}

#[test]
fn workflow_transition_serde_round_trip() {
    let transition = WorkflowTransition {
        workflow_id: WorkflowId::new(),
        from: WorkflowState::Running,
        to: WorkflowState::Succeeded,
        at_ms: 1_000,
    };
    let json = serde_json::to_string(&transition).unwrap();
    let back: WorkflowTransition = serde_json::from_str(&json).unwrap();
    assert_eq!(back, transition);
}
