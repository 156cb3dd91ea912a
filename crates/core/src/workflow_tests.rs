// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::phase::ServerStepState;
use crate::test_support::{strategies::arb_workflow_state, wave_phase, workflow};
use proptest::prelude::*;

#[test]
fn workflow_id_has_prefix() {
    assert!(WorkflowId::new().as_str().starts_with("wfl-"));
}

#[test]
fn pending_to_planning_to_running() {
    let mut wf = workflow("api", StrategyKind::Rolling, vec![]);
    wf.transition(WorkflowState::Planning).unwrap();
    wf.transition(WorkflowState::Running).unwrap();
    assert_eq!(wf.state, WorkflowState::Running);
}

#[test]
fn running_pauses_and_resumes() {
    let mut wf = workflow("api", StrategyKind::Canary, vec![]);
    wf.transition(WorkflowState::Planning).unwrap();
    wf.transition(WorkflowState::Running).unwrap();
    wf.transition(WorkflowState::Paused).unwrap();
    wf.transition(WorkflowState::Running).unwrap();
    assert_eq!(wf.state, WorkflowState::Running);
}

#[test]
fn terminal_states_are_sinks() {
    let mut wf = workflow("api", StrategyKind::Rolling, vec![]);
    wf.transition(WorkflowState::Planning).unwrap();
    wf.transition(WorkflowState::Running).unwrap();
    wf.transition(WorkflowState::Succeeded).unwrap();
    assert!(wf.transition(WorkflowState::Running).is_err());
    assert_eq!(wf.state, WorkflowState::Succeeded);
}

#[test]
fn rollback_path_terminates_in_rolled_back() {
    let mut wf = workflow("api", StrategyKind::Rolling, vec![]);
    wf.transition(WorkflowState::Planning).unwrap();
    wf.transition(WorkflowState::Running).unwrap();
    wf.transition(WorkflowState::RollingBack).unwrap();
    wf.transition(WorkflowState::RolledBack).unwrap();
    assert!(wf.is_terminal());
}

#[test]
fn failed_rollback_terminates_in_failed() {
    let mut wf = workflow("api", StrategyKind::Rolling, vec![]);
    wf.transition(WorkflowState::Planning).unwrap();
    wf.transition(WorkflowState::Running).unwrap();
    wf.transition(WorkflowState::RollingBack).unwrap();
    wf.transition(WorkflowState::Failed).unwrap();
    assert!(wf.is_terminal());
}

#[test]
fn same_state_transition_is_noop() {
    let mut wf = workflow("api", StrategyKind::Rolling, vec![]);
    assert_eq!(wf.transition(WorkflowState::Pending).unwrap(), WorkflowState::Pending);
}

#[test]
fn phase_index_never_decreases() {
    let servers: Vec<AgentId> = (0..4).map(|_| AgentId::issue()).collect();
    let phases = vec![
        wave_phase("wave-1", servers[..2].to_vec()),
        wave_phase("wave-2", servers[2..].to_vec()),
    ];
    let mut wf = workflow("api", StrategyKind::Rolling, phases);
    assert_eq!(wf.current_phase, 0);
    wf.advance_phase();
    assert_eq!(wf.current_phase, 1);
    wf.advance_phase();
    wf.advance_phase();
    // Saturates at phases.len(), never wraps.
    assert_eq!(wf.current_phase, 2);
}

#[test]
fn status_reports_current_phase_and_servers() {
    let servers: Vec<AgentId> = (0..2).map(|_| AgentId::issue()).collect();
    let mut wf = workflow("api", StrategyKind::Rolling, vec![wave_phase("wave-1", servers.clone())]);
    if let Some(step) = wf.phases[0].steps.first_mut() {
        step.servers.insert(servers[0].to_string(), ServerStepState::Succeeded);
        step.servers.insert(servers[1].to_string(), ServerStepState::Running);
    }
    let status = wf.status();
    assert_eq!(status.current_phase, "wave-1");
    assert_eq!(status.servers.len(), 2);
    assert_eq!(status.servers.get(&servers[0].to_string()).map(String::as_str), Some("succeeded"));
}

#[test]
fn metrics_tally_per_server() {
    let agent = AgentId::issue();
    let mut metrics = WorkflowMetrics::default();
    metrics.record_success(&agent);
    metrics.record_success(&agent);
    metrics.record_failure(&agent);
    assert_eq!(metrics.succeeded.get(&agent.to_string()), Some(&2));
    assert_eq!(metrics.failed.get(&agent.to_string()), Some(&1));
}

proptest! {
    #[test]
    fn terminal_states_accept_no_transition(from in arb_workflow_state(), to in arb_workflow_state()) {
        if from.is_terminal() {
            prop_assert!(!from.can_transition_to(to));
        }
    }

    #[test]
    fn transitions_never_leave_terminal_via_chain(states in proptest::collection::vec(arb_workflow_state(), 1..8)) {
        let mut wf = workflow("api", StrategyKind::Immediate, vec![]);
        let mut seen_terminal = false;
        for next in states {
            let _ = wf.transition(next);
            if seen_terminal {
                // Once terminal, state must not have changed again.
                prop_assert!(wf.is_terminal());
            }
            seen_terminal = seen_terminal || wf.is_terminal();
        }
    }
}
