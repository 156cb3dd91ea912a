// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! At-least-once delivery: duplicate terminal statuses are no-ops.

use super::*;
use convoy_core::{Clock, DeploymentCommand, DeploymentWorkflow};
use convoy_store::StateStoreExt;

#[tokio::test]
async fn duplicate_terminal_status_does_not_change_state() {
    let ctx = setup();
    let targets = agents(2);
    let id = ctx
        .engine
        .submit(rolling_request(&targets, 2, 0, 300))
        .await
        .unwrap();

    // Capture the wave deploy commands, succeed one of them twice and
    // once more with a contradictory outcome.
    let checkpoint = std::time::Instant::now() + Duration::from_secs(5);
    let mut deploys: Vec<DeploymentCommand> = Vec::new();
    loop {
        for command in ctx.new_commands() {
            if command.operation == Operation::Deploy {
                deploys.push(command);
            } else {
                ctx.respond(&command, StatusPhase::Succeeded).await;
            }
        }
        if deploys.len() == 2 {
            break;
        }
        assert!(std::time::Instant::now() < checkpoint, "wave never dispatched");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let first = deploys[0].clone();
    ctx.respond(&first, StatusPhase::Succeeded).await;
    ctx.respond(&first, StatusPhase::Succeeded).await;
    ctx.respond(&first, StatusPhase::Failed("late contradiction".into())).await;
    ctx.respond(&deploys[1], StatusPhase::Succeeded).await;

    let status = ctx.drive(id, all_ok).await;
    assert_eq!(status.state, WorkflowState::Succeeded);

    // One success tallied for the duplicated command, no failure.
    let record: DeploymentWorkflow = ctx
        .store
        .get(&crate::keys::workflow(id))
        .await
        .unwrap()
        .unwrap();
    let agent_key = first.agent_id.to_string();
    assert_eq!(record.metrics.succeeded.get(&agent_key).copied().unwrap_or(0), 1);
    assert_eq!(record.metrics.failed.get(&agent_key), None);
}

#[tokio::test]
async fn status_for_unknown_command_is_ignored() {
    let ctx = setup();
    let targets = agents(2);
    let id = ctx
        .engine
        .submit(rolling_request(&targets, 2, 0, 300))
        .await
        .unwrap();

    // A stray status for a command the engine never issued.
    let stray = convoy_core::CommandId::from_string("cmd-stray00000000000");
    ctx.engine
        .ingest_status(convoy_core::StatusUpdate {
            command_id: stray,
            workflow_id: id,
            agent_id: targets[0],
            timestamp_ms: ctx.clock.epoch_ms(),
            phase: StatusPhase::Succeeded,
            details: None,
        })
        .await;

    let status = ctx.drive(id, all_ok).await;
    assert_eq!(status.state, WorkflowState::Succeeded);
}
