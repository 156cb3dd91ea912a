// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::test_helpers::{agents, all_ok, rolling_request, setup};
use convoy_core::{ErrorKind, WorkflowState};
use convoy_planner::StrategyConfig;
use convoy_store::StateStoreExt;
use std::time::Duration;

#[tokio::test]
async fn submit_persists_a_record_immediately() {
    let ctx = setup();
    let targets = agents(4);
    let id = ctx.engine.submit(rolling_request(&targets, 2, 0, 30)).await.unwrap();
    // The record is queryable before the driver makes any progress.
    let status = ctx.engine.status(id).await.unwrap();
    assert_eq!(status.id, id);
    assert!(ctx.engine.active_workflows().contains(&id));
}

#[tokio::test]
async fn unknown_workflow_is_a_typed_error() {
    let ctx = setup();
    let missing = convoy_core::WorkflowId::new();
    assert!(matches!(
        ctx.engine.status(missing).await,
        Err(crate::EngineError::WorkflowNotFound(_))
    ));
}

#[tokio::test]
async fn invalid_configuration_sticks_in_planning() {
    let ctx = setup();
    let targets = agents(4);
    let mut request = rolling_request(&targets, 2, 0, 30);
    // S6 shape: unknown strategy, zero size, out-of-range percentage.
    request.config = StrategyConfig {
        rolling: request.config.rolling.clone(),
        wave: Some(convoy_planner::WaveConfig {
            strategy: "Invalid".into(),
            wave_size: 0,
            wave_percentage: 150.0,
            ..convoy_planner::WaveConfig::default()
        }),
        health_check: request.config.health_check.clone(),
        canary: None,
    };
    let id = ctx.engine.submit(request).await.unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    let status = ctx.engine.status(id).await.unwrap();
    assert_eq!(status.state, WorkflowState::Planning);
    let error = status.last_error.unwrap();
    assert_eq!(error.kind, ErrorKind::ValidationFailed);
    // No side effects: not a single command left the coordinator.
    assert!(ctx.fabric.published_to("command.").is_empty());
}

#[tokio::test]
async fn draining_engine_rejects_submissions() {
    let ctx = setup();
    ctx.engine.drain().await;
    let targets = agents(2);
    assert!(matches!(
        ctx.engine.submit(rolling_request(&targets, 2, 0, 30)).await,
        Err(crate::EngineError::Draining)
    ));
}

#[tokio::test]
async fn lifecycle_transitions_are_published() {
    let ctx = setup();
    let targets = agents(2);
    let id = ctx.engine.submit(rolling_request(&targets, 2, 0, 30)).await.unwrap();
    let status = ctx.drive(id, all_ok).await;
    assert_eq!(status.state, WorkflowState::Succeeded);

    let lifecycle = ctx.fabric.published_to("workflow.lifecycle");
    let transitions: Vec<convoy_core::WorkflowTransition> =
        lifecycle.iter().map(|m| m.decode()).collect();
    assert!(transitions
        .iter()
        .any(|t| t.workflow_id == id && t.to == WorkflowState::Running));
    assert!(transitions
        .iter()
        .any(|t| t.workflow_id == id && t.to == WorkflowState::Succeeded));
}

#[tokio::test]
async fn terminal_records_carry_a_ttl() {
    let ctx = setup();
    let targets = agents(2);
    let id = ctx.engine.submit(rolling_request(&targets, 2, 0, 30)).await.unwrap();
    ctx.drive(id, all_ok).await;

    // Advance past the terminal record TTL; the record expires.
    ctx.clock.advance(Duration::from_secs(86_401));
    let gone: Option<convoy_core::DeploymentWorkflow> =
        ctx.store.get(&crate::keys::workflow(id)).await.unwrap();
    assert!(gone.is_none());
}
