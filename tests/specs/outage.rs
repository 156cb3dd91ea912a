// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Broker outage mid-deployment: queued intent drains without duplicates.

use crate::harness::{agents, all_ok, fleet, rolling_request};
use convoy_core::{DeploymentCommand, Operation, StatusPhase, WorkflowState};
use std::collections::HashMap;
use std::collections::HashSet;
use std::time::Duration;

#[tokio::test]
async fn deployment_survives_a_broker_outage() {
    let fleet = fleet();
    let targets = agents(4);
    let id = fleet
        .engine
        .submit(rolling_request(&targets, 4, 0, 300))
        .await
        .unwrap();

    // Reach the wave, then cut the broker.
    let reach_wave = std::time::Instant::now() + Duration::from_secs(5);
    loop {
        for command in fleet.new_commands() {
            fleet.respond(&command, StatusPhase::Succeeded).await;
        }
        let wave_started = fleet
            .fabric
            .published_to("command.deploy.")
            .iter()
            .map(|m| m.decode::<DeploymentCommand>())
            .any(|c| c.operation == Operation::Deploy);
        if wave_started {
            break;
        }
        assert!(std::time::Instant::now() < reach_wave, "wave never started");
        fleet.clock.advance(Duration::from_secs(1));
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    fleet.fabric.set_available(false);

    // Nothing lands while the broker is down.
    let landed_before = fleet.fabric.publish_count();
    for _ in 0..10 {
        fleet.clock.advance(Duration::from_secs(2));
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(fleet.fabric.publish_count(), landed_before);

    // Recovery: everything drains and the workflow completes.
    fleet.fabric.set_available(true);
    let status = fleet
        .drive_until(id, WorkflowState::Succeeded, Duration::from_secs(1), all_ok)
        .await;
    assert_eq!(status.state, WorkflowState::Succeeded);

    // At-most-one command id per (agent, step): retries reused ids.
    let mut ids: HashMap<(String, String), HashSet<String>> = HashMap::new();
    for message in fleet.fabric.published_to("command.") {
        let command: DeploymentCommand = message.decode();
        ids.entry((command.agent_id.to_string(), command.step_id.to_string()))
            .or_default()
            .insert(command.command_id.to_string());
    }
    assert!(ids.values().all(|set| set.len() == 1), "duplicate command ids produced");
}
