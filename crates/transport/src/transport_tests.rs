// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::config::TransportConfig;
use crate::session::ConnectionSource;
use crate::test_support::{connect, make_transport, register};
use convoy_wire::{AgentRequest, CommandResult, RollbackResult};
use std::time::Duration;

#[tokio::test]
async fn execute_command_round_trips_through_the_session() {
    let ctx = make_transport(TransportConfig::default());
    let mut conn = connect(&ctx, ConnectionSource::Tcp, "").await;
    let id = register(&mut conn, "server-01").await;

    let transport = ctx.transport.clone();
    let exec = tokio::spawn(async move {
        transport.execute_command(id, "api", "restart").await
    });

    // Agent side: receive the pushed command, answer it.
    let pushed = match conn.recv().await {
        CoordinatorFrame::Command(command) => command,
        other => unreachable!("expected Command, got {other:?}"),
    };
    assert_eq!(pushed.service_name, "api");
    assert_eq!(pushed.command, "restart");
    conn.send(&AgentRequest::CommandResult(CommandResult {
        command_id: pushed.command_id,
        success: true,
        message: "restarted".to_string(),
        exit_code: 0,
        executed_at_ms: 1_234,
    }))
    .await;

    let result = exec.await.unwrap().unwrap();
    assert!(result.success);
    assert_eq!(result.exit_code, 0);
    assert_eq!(result.command_id, pushed.command_id);
}

#[tokio::test]
async fn command_timeout_is_a_deterministic_failure() {
    let ctx = make_transport(TransportConfig {
        command_timeout_s: 1,
        ..TransportConfig::default()
    });
    let mut conn = connect(&ctx, ConnectionSource::Tcp, "").await;
    let id = register(&mut conn, "server-01").await;

    // Never answer: the call returns a failed result, not a hang.
    let result = ctx.transport.execute_command(id, "api", "status").await.unwrap();
    assert!(!result.success);
    assert_eq!(result.exit_code, -1);
    assert!(result.message.contains("timed out"));
}

#[tokio::test]
async fn execute_command_for_unregistered_agent_errors() {
    let ctx = make_transport(TransportConfig::default());
    let ghost = AgentId::issue();
    assert!(matches!(
        ctx.transport.execute_command(ghost, "api", "status").await,
        Err(TransportError::NotRegistered(_))
    ));
}

#[tokio::test]
async fn execute_command_for_disconnected_agent_errors() {
    let ctx = make_transport(TransportConfig::default());
    let mut conn = connect(&ctx, ConnectionSource::Tcp, "").await;
    let id = register(&mut conn, "server-01").await;

    conn.send(&AgentRequest::Bye).await;
    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    while !ctx.transport.connected_agents().is_empty() {
        assert!(std::time::Instant::now() < deadline);
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(matches!(
        ctx.transport.execute_command(id, "api", "status").await,
        Err(TransportError::NotConnected(_))
    ));
}

#[tokio::test]
async fn rollback_round_trips() {
    let ctx = make_transport(TransportConfig::default());
    let mut conn = connect(&ctx, ConnectionSource::Tcp, "").await;
    let id = register(&mut conn, "server-01").await;

    let transport = ctx.transport.clone();
    let rollback = tokio::spawn(async move {
        transport.rollback_service(id, "api", "1.9.1").await
    });

    let request = match conn.recv().await {
        CoordinatorFrame::Rollback(request) => request,
        other => unreachable!("expected Rollback, got {other:?}"),
    };
    assert_eq!(request.target_version, "1.9.1");
    conn.send(&AgentRequest::RollbackResult(RollbackResult {
        success: true,
        message: "rolled back".to_string(),
        previous_version: "2.0.0".to_string(),
        current_version: "1.9.1".to_string(),
    }))
    .await;

    let result = rollback.await.unwrap().unwrap();
    assert!(result.success);
    assert_eq!(result.current_version, "1.9.1");
}
