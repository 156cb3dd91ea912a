// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Gate breach and rollback (the 12-server, 25%-threshold shape).

use super::*;
use convoy_core::AgentId;
use std::collections::HashSet;

/// Wave 1 = servers[0..4], wave 2 = servers[4..8]. One failure in wave 1
/// stays at the threshold; two in wave 2 breach it.
fn wave_two_breach(
    targets: &[AgentId],
) -> impl FnMut(&convoy_core::DeploymentCommand) -> Option<StatusPhase> + '_ {
    move |command| {
        if command.operation != Operation::Deploy {
            return Some(StatusPhase::Succeeded);
        }
        let index = targets.iter().position(|a| *a == command.agent_id)?;
        match index {
            2 => Some(StatusPhase::Failed("disk full".into())),      // wave 1: 1/4 = 25%
            5 | 6 => Some(StatusPhase::Failed("disk full".into())), // wave 2: 2/4 = 50%
            7 => None, // never responds; times out at the gate
            _ => Some(StatusPhase::Succeeded),
        }
    }
}

#[tokio::test]
async fn breach_rolls_back_applied_servers_only() {
    let ctx = setup();
    ctx.advance_per_tick(Duration::from_secs(2));
    let targets = agents(12);
    let id = ctx
        .engine
        .submit(rolling_request(&targets, 4, 25, 30))
        .await
        .unwrap();

    let status = ctx.drive(id, wave_two_breach(&targets)).await;
    assert_eq!(status.state, WorkflowState::RolledBack);
    assert_eq!(status.last_error.as_ref().map(|e| e.kind), Some(convoy_core::ErrorKind::GateFailed));

    // Rollback goes to exactly the servers whose deploy succeeded:
    // wave 1 minus the failure, plus the one wave-2 success.
    let rollbacks: HashSet<AgentId> = ctx
        .fabric
        .published()
        .iter()
        .filter(|m| m.routing_key.starts_with("command.rollback."))
        .map(|m| m.decode::<convoy_core::DeploymentCommand>().agent_id)
        .collect();
    let expected: HashSet<AgentId> =
        [targets[0], targets[1], targets[3], targets[4]].into_iter().collect();
    assert_eq!(rollbacks, expected);

    // Wave 3 never dispatched.
    let deploys: HashSet<AgentId> = ctx
        .fabric
        .published()
        .iter()
        .filter(|m| m.routing_key.starts_with("command.deploy."))
        .map(|m| m.decode::<convoy_core::DeploymentCommand>())
        .filter(|c| c.operation == Operation::Deploy)
        .map(|c| c.agent_id)
        .collect();
    for late in &targets[8..] {
        assert!(!deploys.contains(late), "wave 3 server was dispatched");
    }
}

#[tokio::test]
async fn threshold_boundary_passes_the_wave() {
    let ctx = setup();
    let targets = agents(4);
    let id = ctx
        .engine
        .submit(rolling_request(&targets, 4, 25, 30))
        .await
        .unwrap();

    // Exactly one failure out of four: at the threshold, not over it.
    let failing = targets[2];
    let status = ctx
        .drive(id, move |command| {
            if command.operation == Operation::Deploy && command.agent_id == failing {
                Some(StatusPhase::Failed("flaky".into()))
            } else {
                Some(StatusPhase::Succeeded)
            }
        })
        .await;
    assert_eq!(status.state, WorkflowState::Succeeded);
}

#[tokio::test]
async fn rollback_failure_ends_in_failed_without_cascade() {
    let ctx = setup();
    ctx.advance_per_tick(Duration::from_secs(2));
    let targets = agents(4);
    let failing: HashSet<AgentId> = targets[..2].iter().copied().collect();
    let id = ctx
        .engine
        .submit(rolling_request(&targets, 4, 0, 30))
        .await
        .unwrap();
    let status = ctx
        .drive(id, move |command| match command.operation {
            Operation::Deploy => {
                if failing.contains(&command.agent_id) {
                    Some(StatusPhase::Failed("disk full".into()))
                } else {
                    Some(StatusPhase::Succeeded)
                }
            }
            Operation::Rollback => Some(StatusPhase::Failed("rollback script missing".into())),
            _ => Some(StatusPhase::Succeeded),
        })
        .await;
    assert_eq!(status.state, WorkflowState::Failed);
}

#[tokio::test]
async fn nothing_applied_rolls_back_to_terminal_immediately() {
    let ctx = setup();
    let targets = agents(4);
    let id = ctx
        .engine
        .submit(rolling_request(&targets, 4, 0, 30))
        .await
        .unwrap();

    // Every deploy is rejected; no server reaches Applied.
    let status = ctx
        .drive(id, |command| match command.operation {
            Operation::Deploy => Some(StatusPhase::Rejected("checksum mismatch".into())),
            _ => Some(StatusPhase::Succeeded),
        })
        .await;
    assert_eq!(status.state, WorkflowState::RolledBack);
    assert!(ctx.fabric.published_to("command.rollback.").is_empty());
}

#[tokio::test]
async fn critical_alerts_fire_on_rollback() {
    let ctx = setup();
    let targets = agents(4);
    let id = ctx
        .engine
        .submit(rolling_request(&targets, 4, 0, 30))
        .await
        .unwrap();
    ctx.drive(id, |command| match command.operation {
        Operation::Deploy => Some(StatusPhase::Rejected("bad package".into())),
        _ => Some(StatusPhase::Succeeded),
    })
    .await;

    let alerts = ctx.fabric.published_to("alert.critical.deployment");
    assert!(!alerts.is_empty());
}
