// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Canary rollout with manual gates across a hundred servers.

use crate::harness::{agents, all_ok, fleet};
use convoy_core::test_support::package_ref;
use convoy_core::{Operation, StrategyKind, WorkflowState};
use convoy_engine::Control;
use convoy_planner::{CanaryConfig, HealthCheckConfig, StrategyConfig, WorkflowRequest};
use std::time::Duration;

#[tokio::test]
async fn hundred_servers_pause_at_each_gate_until_resumed() {
    let fleet = fleet();
    let targets = agents(100);
    let request = WorkflowRequest::new(
        "billing-api",
        "2.0.0",
        StrategyKind::Canary,
        targets.clone(),
        package_ref(),
    )
    .config(StrategyConfig {
        health_check: Some(HealthCheckConfig { timeout_s: 600, success_ratio: 1.0 }),
        canary: Some(CanaryConfig {
            canary_percentage: 5.0,
            secondary_percentage: 25.0,
            observation_s: 60,
            manual_gates: true,
        }),
        ..StrategyConfig::default()
    });
    let id = fleet.engine.submit(request).await.unwrap();

    let deploy_count = |fleet: &crate::harness::Fleet| {
        fleet
            .fabric
            .published_to("command.deploy.")
            .iter()
            .map(|m| m.decode::<convoy_core::DeploymentCommand>())
            .filter(|c| c.operation == Operation::Deploy)
            .count()
    };

    // Canary cohort: five servers, then a pause for the observation gate.
    let status = fleet
        .drive_until(id, WorkflowState::Paused, Duration::from_secs(5), all_ok)
        .await;
    assert_eq!(status.state, WorkflowState::Paused);
    assert_eq!(deploy_count(&fleet), 5);

    // Resume into the broader cohort; pause again.
    fleet.engine.control(id, Control::Resume).await.unwrap();
    fleet
        .drive_until(id, WorkflowState::Running, Duration::from_secs(5), all_ok)
        .await;
    let status = fleet
        .drive_until(id, WorkflowState::Paused, Duration::from_secs(5), all_ok)
        .await;
    assert_eq!(status.state, WorkflowState::Paused);
    assert_eq!(deploy_count(&fleet), 30);

    // Final resume drives the remainder home.
    fleet.engine.control(id, Control::Resume).await.unwrap();
    let status = fleet
        .drive_until(id, WorkflowState::Succeeded, Duration::from_secs(5), all_ok)
        .await;
    assert_eq!(status.state, WorkflowState::Succeeded);
    assert_eq!(deploy_count(&fleet), 100);

    // A canary failure would have left cohort statuses visible; on the
    // happy path every touched server converged.
    assert_eq!(status.servers.values().filter(|s| *s == &"succeeded".to_string()).count(), 100);
}
