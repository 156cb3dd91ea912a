// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pause, resume, and cancel semantics.

use super::*;
use crate::engine::Control;
use convoy_core::DeploymentCommand;

#[tokio::test]
async fn cancel_stops_dispatch_and_issues_best_effort_stops() {
    let ctx = setup();
    let targets = agents(4);
    let id = ctx
        .engine
        .submit(rolling_request(&targets, 4, 0, 300))
        .await
        .unwrap();

    // Drive into the wave: respond Running for deploys, succeed the rest.
    let checkpoint = std::time::Instant::now() + Duration::from_secs(5);
    loop {
        for command in ctx.new_commands() {
            if command.operation == Operation::Deploy {
                ctx.respond(&command, StatusPhase::Running).await;
            } else {
                ctx.respond(&command, StatusPhase::Succeeded).await;
            }
        }
        let status = ctx.engine.status(id).await.unwrap();
        if status.servers.values().any(|s| s == "running") {
            break;
        }
        assert!(std::time::Instant::now() < checkpoint, "wave never started");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    ctx.engine.control(id, Control::Cancel).await.unwrap();
    let status = ctx.drive_until(id, WorkflowState::Canceled, |_| None).await;
    assert_eq!(status.state, WorkflowState::Canceled);
    assert_eq!(
        status.last_error.map(|e| e.kind),
        Some(convoy_core::ErrorKind::Canceled)
    );

    // Best-effort Stop went to the servers that were running.
    let stops: Vec<DeploymentCommand> = ctx
        .fabric
        .published_to("command.control.")
        .iter()
        .map(|m| m.decode())
        .filter(|c: &DeploymentCommand| c.operation == Operation::Stop)
        .collect();
    assert!(!stops.is_empty());

    // Canceled is a sink: no further commands are ever issued.
    let command_count = ctx.fabric.published_to("command.").len();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(ctx.fabric.published_to("command.").len(), command_count);
}

#[tokio::test]
async fn pause_holds_dispatch_until_resume() {
    let ctx = setup();
    let targets = agents(6);
    let id = ctx
        .engine
        .submit(rolling_request(&targets, 3, 0, 300))
        .await
        .unwrap();

    // Succeed the prologue; hold first-wave deploy responses back.
    let mut held: Vec<DeploymentCommand> = Vec::new();
    let checkpoint = std::time::Instant::now() + Duration::from_secs(5);
    loop {
        for command in ctx.new_commands() {
            if command.operation == Operation::Deploy {
                held.push(command);
            } else {
                ctx.respond(&command, StatusPhase::Succeeded).await;
            }
        }
        if !held.is_empty() {
            break;
        }
        assert!(std::time::Instant::now() < checkpoint, "wave never started");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    ctx.engine.control(id, Control::Pause).await.unwrap();
    ctx.drive_until(id, WorkflowState::Paused, |_| None).await;

    let paused_count = ctx.fabric.published_to("command.").len();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(
        ctx.fabric.published_to("command.").len(),
        paused_count,
        "paused workflow must not dispatch"
    );

    ctx.engine.control(id, Control::Resume).await.unwrap();
    for command in held {
        ctx.respond(&command, StatusPhase::Succeeded).await;
    }
    let status = ctx.drive(id, all_ok).await;
    assert_eq!(status.state, WorkflowState::Succeeded);
}

#[tokio::test]
async fn control_on_unknown_workflow_errors() {
    let ctx = setup();
    let missing = convoy_core::WorkflowId::new();
    assert!(ctx.engine.control(missing, Control::Cancel).await.is_err());
}
