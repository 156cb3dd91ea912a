// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn ids() -> (WorkflowId, PhaseId, StepId, AgentId) {
    (WorkflowId::new(), PhaseId::new(), StepId::new(), AgentId::issue())
}

#[test]
fn command_id_is_deterministic() {
    let (wfl, phs, stp, agt) = ids();
    let a = CommandId::derive(wfl, phs, stp, agt, 0);
    let b = CommandId::derive(wfl, phs, stp, agt, 0);
    assert_eq!(a, b);
}

#[test]
fn command_id_changes_with_attempt() {
    let (wfl, phs, stp, agt) = ids();
    let first = CommandId::derive(wfl, phs, stp, agt, 0);
    let second = CommandId::derive(wfl, phs, stp, agt, 1);
    assert_ne!(first, second);
}

#[test]
fn command_id_changes_with_agent() {
    let (wfl, phs, stp, _) = ids();
    let a = CommandId::derive(wfl, phs, stp, AgentId::issue(), 0);
    let b = CommandId::derive(wfl, phs, stp, AgentId::issue(), 0);
    assert_ne!(a, b);
}

#[test]
fn command_id_has_prefix_and_fits_buffer() {
    let (wfl, phs, stp, agt) = ids();
    let id = CommandId::derive(wfl, phs, stp, agt, 3);
    assert!(id.as_str().starts_with("cmd-"));
    assert_eq!(id.as_str().len(), crate::id::ID_MAX_LEN);
}

#[yare::parameterized(
    deploy = { Operation::Deploy, "deploy" },
    health = { Operation::HealthCheck, "deploy" },
    switch = { Operation::SwitchTraffic, "deploy" },
    rollback = { Operation::Rollback, "rollback" },
    stop = { Operation::Stop, "control" },
    restart = { Operation::Restart, "control" },
)]
fn routing_key_groups_by_operation(operation: Operation, group: &str) {
    let (wfl, phs, stp, agt) = ids();
    let command = DeploymentCommand {
        command_id: CommandId::derive(wfl, phs, stp, agt, 0),
        workflow_id: wfl,
        phase_id: phs,
        step_id: stp,
        agent_id: agt,
        service_name: "api".to_string(),
        version: "2.0.0".to_string(),
        strategy: StrategyKind::Rolling,
        operation,
        priority: 5,
        package: None,
        params: std::collections::HashMap::new(),
        issued_at_ms: 0,
        deadline_ms: 60_000,
        correlation_id: "corr".to_string(),
    };
    assert_eq!(command.routing_key(), format!("command.{}.{}", group, agt));
}

#[test]
fn operation_parse_inverts_display() {
    for op in [
        Operation::Deploy,
        Operation::Rollback,
        Operation::Stop,
        Operation::Start,
        Operation::Restart,
        Operation::HealthCheck,
        Operation::SwitchTraffic,
        Operation::Script,
    ] {
        assert_eq!(Operation::parse(&op.to_string()), Some(op));
    }
    assert_eq!(Operation::parse("fly"), None);
}

#[test]
fn status_routing_key_is_per_workflow() {
    let (wfl, phs, stp, agt) = ids();
    let update = StatusUpdate {
        command_id: CommandId::derive(wfl, phs, stp, agt, 0),
        workflow_id: wfl,
        agent_id: agt,
        timestamp_ms: 0,
        phase: StatusPhase::Succeeded,
        details: None,
    };
    assert_eq!(update.routing_key(), format!("status.{}", wfl));
}

#[test]
fn status_phase_terminality() {
    assert!(StatusPhase::Succeeded.is_terminal());
    assert!(StatusPhase::Failed("boom".into()).is_terminal());
    assert!(StatusPhase::Rejected("checksum".into()).is_terminal());
    assert!(!StatusPhase::Accepted.is_terminal());
    assert!(!StatusPhase::Progress(50).is_terminal());
}

#[test]
fn status_update_serde_round_trip() {
    let (wfl, phs, stp, agt) = ids();
    let update = StatusUpdate {
        command_id: CommandId::derive(wfl, phs, stp, agt, 0),
        workflow_id: wfl,
        agent_id: agt,
        timestamp_ms: 42,
        phase: StatusPhase::Failed("disk full".into()),
        details: Some("df output".into()),
    };
    let json = serde_json::to_string(&update).unwrap();
    let back: StatusUpdate = serde_json::from_str(&json).unwrap();
    assert_eq!(back.command_id, update.command_id);
    assert_eq!(back.phase, StatusPhase::Failed("disk full".into()));
}
