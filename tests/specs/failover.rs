// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Coordinator failover: a second engine adopts the workflow and
//! finishes it without duplicate execution.

use crate::harness::{agents, fleet, rolling_request, second_engine};
use convoy_core::{Clock, DeploymentCommand, Operation, StatusPhase, StatusUpdate, WorkflowState};
use std::collections::HashSet;
use std::time::Duration;

#[tokio::test]
async fn standby_engine_finishes_an_adopted_workflow() {
    let fleet = fleet();
    let targets = agents(4);
    let id = fleet
        .engine
        .submit(rolling_request(&targets, 4, 25, 30))
        .await
        .unwrap();

    // Three of four wave deploys complete under the first engine.
    let silent = targets[3];
    let checkpoint = std::time::Instant::now() + Duration::from_secs(5);
    loop {
        for command in fleet.new_commands() {
            if !(command.operation == Operation::Deploy && command.agent_id == silent) {
                fleet.respond(&command, StatusPhase::Succeeded).await;
            }
        }
        let status = fleet.engine.status(id).await.unwrap();
        let three_done = status.servers.values().filter(|s| *s == "succeeded").count() == 3;
        let last_issued = status
            .servers
            .get(&silent.to_string())
            .map(|s| s == "issued")
            .unwrap_or(false);
        if three_done && last_issued {
            break;
        }
        assert!(std::time::Instant::now() < checkpoint, "wave never reached 3/4");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    fleet.engine.drain().await;

    // The standby adopts the lease and resumes from persisted state.
    let standby = second_engine(&fleet);
    let adopted = standby.resume_orphaned().await.unwrap();
    assert_eq!(adopted, vec![id]);

    // Status replay from the broker completes the step; the rest of the
    // plan runs through the standby.
    let deadline = std::time::Instant::now() + Duration::from_secs(10);
    loop {
        for message in fleet.fabric.published_to("command.") {
            let command: DeploymentCommand = message.decode();
            standby
                .ingest_status(StatusUpdate {
                    command_id: command.command_id,
                    workflow_id: command.workflow_id,
                    agent_id: command.agent_id,
                    timestamp_ms: fleet.clock.epoch_ms(),
                    phase: StatusPhase::Succeeded,
                    details: None,
                })
                .await;
        }
        let status = standby.status(id).await.unwrap();
        if status.state.is_terminal() {
            assert_eq!(status.state, WorkflowState::Succeeded);
            break;
        }
        assert!(std::time::Instant::now() < deadline, "failover did not complete");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    // Agent-side dedup is never needed twice: each deploy id is unique.
    let mut ids = HashSet::new();
    for message in fleet.fabric.published_to("command.deploy.") {
        let command: DeploymentCommand = message.decode();
        if command.operation == Operation::Deploy {
            assert!(ids.insert(command.command_id), "command id republished");
        }
    }
}

#[tokio::test]
async fn live_leases_cannot_be_stolen() {
    let fleet = fleet();
    let targets = agents(2);
    let _id = fleet
        .engine
        .submit(rolling_request(&targets, 2, 0, 30))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let standby = second_engine(&fleet);
    assert!(standby.resume_orphaned().await.unwrap().is_empty());
}
