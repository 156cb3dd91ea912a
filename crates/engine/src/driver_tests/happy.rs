// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Rolling happy path (12 agents, fixed-size 4 waves).

use super::*;
use std::collections::HashSet;

#[tokio::test]
async fn rolling_deploys_in_three_waves_and_succeeds() {
    let ctx = setup();
    let targets = agents(12);
    let id = ctx
        .engine
        .submit(rolling_request(&targets, 4, 25, 30))
        .await
        .unwrap();

    let status = ctx.drive(id, all_ok).await;
    assert_eq!(status.state, WorkflowState::Succeeded);
    assert!(status.last_error.is_none());

    // Three wave phases bracketed by prologue and epilogue.
    let waves: Vec<&(String, convoy_core::PhaseState)> = status
        .phase_states
        .iter()
        .filter(|(name, _)| name.starts_with("wave-"))
        .collect();
    assert_eq!(waves.len(), 3);
    assert!(waves.iter().all(|(_, state)| *state == convoy_core::PhaseState::Succeeded));

    // Every server appears in exactly one wave's deploy commands.
    let deploys: Vec<_> = ctx
        .fabric
        .published()
        .iter()
        .filter(|m| m.routing_key.starts_with("command.deploy."))
        .map(|m| m.decode::<convoy_core::DeploymentCommand>())
        .filter(|c| c.operation == Operation::Deploy)
        .collect();
    let mut seen = HashSet::new();
    for command in &deploys {
        assert!(seen.insert(command.agent_id), "duplicate deploy to {}", command.agent_id);
    }
    assert_eq!(seen.len(), 12);
}

#[tokio::test]
async fn per_server_matrix_reaches_terminal_states() {
    let ctx = setup();
    let targets = agents(4);
    let id = ctx
        .engine
        .submit(rolling_request(&targets, 4, 0, 30))
        .await
        .unwrap();
    let status = ctx.drive(id, all_ok).await;
    assert_eq!(status.state, WorkflowState::Succeeded);
    assert_eq!(status.servers.len(), 4);
    assert!(status.servers.values().all(|s| s == "succeeded"));
}

#[tokio::test]
async fn commands_carry_priority_and_correlation() {
    let ctx = setup();
    let targets = agents(2);
    let mut request = rolling_request(&targets, 2, 0, 30);
    request.priority = 8;
    let id = ctx.engine.submit(request).await.unwrap();
    ctx.drive(id, all_ok).await;

    let published = ctx.fabric.published_to("command.");
    assert!(!published.is_empty());
    for message in &published {
        assert_eq!(message.props.priority, Some(8));
        assert_eq!(message.props.correlation_id.as_deref(), Some(id.as_str()));
    }
}
