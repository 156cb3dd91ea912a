// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Broker outage mid-wave: retries with backoff, no duplicate commands.

use super::*;
use convoy_core::DeploymentCommand;
use std::collections::{HashMap, HashSet};

#[tokio::test]
async fn publishes_queue_through_an_outage_and_drain_in_order() {
    let ctx = setup();
    ctx.advance_per_tick(Duration::from_secs(1));
    let targets = agents(4);
    let id = ctx
        .engine
        .submit(rolling_request(&targets, 4, 0, 300))
        .await
        .unwrap();

    // Let the prologue pass, then take the broker down once the first
    // wave deploy shows up.
    let outage_at = std::time::Instant::now() + Duration::from_secs(5);
    loop {
        for command in ctx.new_commands() {
            ctx.respond(&command, StatusPhase::Succeeded).await;
        }
        let saw_deploy = ctx
            .fabric
            .published_to("command.deploy.")
            .iter()
            .map(|m| m.decode::<DeploymentCommand>())
            .any(|c| c.operation == Operation::Deploy);
        if saw_deploy {
            break;
        }
        assert!(std::time::Instant::now() < outage_at, "wave never started");
        ctx.clock.advance(Duration::from_secs(1));
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    ctx.fabric.set_available(false);

    // While the broker is down no new publishes land; the engine backs
    // off and keeps the issued intent persisted.
    let published_during_outage = ctx.fabric.publish_count();
    for _ in 0..20 {
        ctx.clock.advance(Duration::from_secs(2));
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(ctx.fabric.publish_count(), published_during_outage);

    // Broker returns; queued publishes drain and the workflow completes.
    ctx.fabric.set_available(true);
    let status = ctx.drive(id, all_ok).await;
    assert_eq!(status.state, WorkflowState::Succeeded);

    // Each (agent, step) pair got exactly one command id: retries reuse
    // the same id, so agents cannot double-execute.
    let mut per_agent_step: HashMap<(String, String), HashSet<String>> = HashMap::new();
    for message in ctx.fabric.published_to("command.") {
        let command: DeploymentCommand = message.decode();
        per_agent_step
            .entry((command.agent_id.to_string(), command.step_id.to_string()))
            .or_default()
            .insert(command.command_id.to_string());
    }
    for ((agent, step), ids) in per_agent_step {
        assert_eq!(ids.len(), 1, "agent {agent} step {step} saw {} ids", ids.len());
    }
}

#[tokio::test]
async fn publish_failure_never_loses_the_workflow() {
    let ctx = setup();
    ctx.advance_per_tick(Duration::from_secs(1));
    let targets = agents(2);

    // Broker is down from the start: submission still records intent.
    ctx.fabric.set_available(false);
    let id = ctx
        .engine
        .submit(rolling_request(&targets, 2, 0, 600))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    let status = ctx.engine.status(id).await.unwrap();
    assert!(!status.state.is_terminal());

    ctx.fabric.set_available(true);
    let status = ctx.drive(id, all_ok).await;
    assert_eq!(status.state, WorkflowState::Succeeded);
}
