// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Canary pause/resume across gated cohorts.

use super::*;
use crate::engine::Control;
use convoy_core::test_support::package_ref;
use convoy_core::StrategyKind;
use convoy_planner::{CanaryConfig, HealthCheckConfig, StrategyConfig, WorkflowRequest};

fn canary_request(targets: &[convoy_core::AgentId]) -> WorkflowRequest {
    WorkflowRequest::new(
        "api",
        "2.0.0",
        StrategyKind::Canary,
        targets.to_vec(),
        package_ref(),
    )
    .config(StrategyConfig {
        health_check: Some(HealthCheckConfig { timeout_s: 300, success_ratio: 1.0 }),
        canary: Some(CanaryConfig {
            canary_percentage: 5.0,
            secondary_percentage: 25.0,
            observation_s: 60,
            manual_gates: true,
        }),
        ..StrategyConfig::default()
    })
}

#[tokio::test]
async fn canary_pauses_after_each_gated_cohort() {
    let ctx = setup();
    ctx.advance_per_tick(Duration::from_secs(5));
    let targets = agents(20);
    let id = ctx.engine.submit(canary_request(&targets)).await.unwrap();

    // Canary cohort (1 server at 5%) succeeds, observation elapses,
    // then the workflow pauses for an external resume.
    let status = ctx.drive_until(id, WorkflowState::Paused, all_ok).await;
    assert_eq!(status.state, WorkflowState::Paused);
    let deploy_count = ctx
        .fabric
        .published_to("command.deploy.")
        .iter()
        .map(|m| m.decode::<convoy_core::DeploymentCommand>())
        .filter(|c| c.operation == Operation::Deploy)
        .count();
    assert_eq!(deploy_count, 1);

    // Resume: the 25% cohort runs, then pauses again.
    ctx.engine.control(id, Control::Resume).await.unwrap();
    ctx.drive_until(id, WorkflowState::Running, all_ok).await;
    let status = ctx.drive_until(id, WorkflowState::Paused, all_ok).await;
    assert_eq!(status.state, WorkflowState::Paused);

    // Final resume drives the remainder to completion.
    ctx.engine.control(id, Control::Resume).await.unwrap();
    let status = ctx.drive(id, all_ok).await;
    assert_eq!(status.state, WorkflowState::Succeeded);

    let total: usize = ctx
        .fabric
        .published_to("command.deploy.")
        .iter()
        .map(|m| m.decode::<convoy_core::DeploymentCommand>())
        .filter(|c| c.operation == Operation::Deploy)
        .count();
    assert_eq!(total, 20);
}
