// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Rolling deployments: the happy path and the gate-breach rollback.

use crate::harness::{agents, all_ok, fleet, rolling_request};
use convoy_core::{Operation, PhaseState, StatusPhase, WorkflowState};
use std::collections::HashSet;
use std::time::Duration;

#[tokio::test]
async fn twelve_servers_in_fixed_waves_of_four_succeed() {
    let fleet = fleet();
    let targets = agents(12);
    let id = fleet
        .engine
        .submit(rolling_request(&targets, 4, 25, 30))
        .await
        .unwrap();

    let status = fleet.drive(id, all_ok).await;
    assert_eq!(status.state, WorkflowState::Succeeded);

    // Prologue + three waves + epilogue, all succeeded.
    let names: Vec<&str> = status.phase_states.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(
        names,
        vec!["pre-deployment", "wave-1", "wave-2", "wave-3", "post-deployment", "cleanup"]
    );
    assert!(status.phase_states.iter().all(|(_, s)| *s == PhaseState::Succeeded));

    // Each server deployed exactly once.
    let mut deployed = HashSet::new();
    for message in fleet.fabric.published_to("command.deploy.") {
        let command: convoy_core::DeploymentCommand = message.decode();
        if command.operation == Operation::Deploy {
            assert!(deployed.insert(command.agent_id));
        }
    }
    let expected: HashSet<_> = targets.iter().copied().collect();
    assert_eq!(deployed, expected);
}

#[tokio::test]
async fn second_wave_breach_rolls_back_the_applied_servers() {
    let fleet = fleet();
    let targets = agents(12);
    let id = fleet
        .engine
        .submit(rolling_request(&targets, 4, 25, 30))
        .await
        .unwrap();

    // Wave 1: one failure (at the 25% threshold, passes).
    // Wave 2: two failures and one silent server (breach).
    let status = fleet
        .drive_until(id, WorkflowState::RolledBack, Duration::from_secs(2), |command| {
            if command.operation != Operation::Deploy {
                return Some(StatusPhase::Succeeded);
            }
            let index = targets.iter().position(|a| *a == command.agent_id)?;
            match index {
                2 => Some(StatusPhase::Failed("unit crashed".into())),
                5 | 6 => Some(StatusPhase::Failed("unit crashed".into())),
                7 => None,
                _ => Some(StatusPhase::Succeeded),
            }
        })
        .await;

    assert_eq!(status.state, WorkflowState::RolledBack);

    let rollbacks: HashSet<_> = fleet
        .fabric
        .published_to("command.rollback.")
        .iter()
        .map(|m| m.decode::<convoy_core::DeploymentCommand>().agent_id)
        .collect();
    let expected: HashSet<_> =
        [targets[0], targets[1], targets[3], targets[4]].into_iter().collect();
    assert_eq!(rollbacks, expected, "only servers that applied the release roll back");
}

#[tokio::test]
async fn alerts_carry_severity_for_the_outcome() {
    let fleet = fleet();
    let targets = agents(4);
    let id = fleet
        .engine
        .submit(rolling_request(&targets, 4, 0, 30))
        .await
        .unwrap();
    fleet.drive(id, all_ok).await;

    let info = fleet.fabric.published_to("alert.info.deployment");
    assert!(!info.is_empty(), "success emits an info alert");
}
