// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::config::TransportConfig;
use crate::test_support::{connect, make_transport, register, registration};
use convoy_core::{FleetEvent, ServiceStatus};
use convoy_wire::{
    AgentRequest, DiscoveredService, HeartbeatRequest, MetricsBatch, MetricSample,
    PROTOCOL_VERSION,
};
use std::time::Duration;

fn with_token(token: &str) -> TransportConfig {
    TransportConfig { auth_token: Some(token.to_string()), ..TransportConfig::default() }
}

fn heartbeat(id: AgentId, hostname: &str) -> AgentRequest {
    AgentRequest::Heartbeat(HeartbeatRequest {
        server_id: id,
        hostname: hostname.to_string(),
        agent_status: "connected".to_string(),
        timestamp_ms: 1_000,
        cpu_pct: 12.5,
        mem_mb: 2_048,
        service_count: 3,
    })
}

#[tokio::test]
async fn bad_token_is_rejected_before_any_state_change() {
    let ctx = make_transport(with_token("secret"));
    let (client, server) = tokio::io::duplex(4096);
    let inner = std::sync::Arc::clone(&ctx.transport.inner);
    let cancel = ctx.cancel.clone();
    tokio::spawn(async move {
        run_session(inner, server, ConnectionSource::Tcp, cancel).await;
    });

    let (mut reader, mut writer) = tokio::io::split(client);
    convoy_wire::write_frame(
        &mut writer,
        &AgentRequest::Hello { token: "wrong".to_string(), protocol_version: PROTOCOL_VERSION },
    )
    .await
    .unwrap();
    let reply: CoordinatorFrame =
        convoy_wire::read_frame(&mut reader, Duration::from_secs(5)).await.unwrap();
    assert!(matches!(
        reply,
        CoordinatorFrame::Error { code: convoy_wire::ErrorCode::Unauthorized, .. }
    ));
    assert!(ctx.transport.inner.registry.snapshot().is_empty());
}

#[tokio::test]
async fn unix_connections_skip_token_validation() {
    let ctx = make_transport(with_token("secret"));
    let mut conn = connect(&ctx, ConnectionSource::Unix, "anything").await;
    let id = register(&mut conn, "server-01").await;
    assert!(ctx.transport.inner.registry.get(&id).is_some());
}

#[tokio::test]
async fn wrong_protocol_version_is_unsupported() {
    let ctx = make_transport(TransportConfig::default());
    let (client, server) = tokio::io::duplex(4096);
    let inner = std::sync::Arc::clone(&ctx.transport.inner);
    let cancel = ctx.cancel.clone();
    tokio::spawn(async move {
        run_session(inner, server, ConnectionSource::Tcp, cancel).await;
    });

    let (mut reader, mut writer) = tokio::io::split(client);
    convoy_wire::write_frame(
        &mut writer,
        &AgentRequest::Hello { token: String::new(), protocol_version: 99 },
    )
    .await
    .unwrap();
    let reply: CoordinatorFrame =
        convoy_wire::read_frame(&mut reader, Duration::from_secs(5)).await.unwrap();
    assert!(matches!(
        reply,
        CoordinatorFrame::Error { code: convoy_wire::ErrorCode::Unsupported, .. }
    ));
}

#[tokio::test]
async fn registration_is_idempotent_per_hostname() {
    let ctx = make_transport(TransportConfig::default());
    let mut conn = connect(&ctx, ConnectionSource::Tcp, "").await;
    let first = register(&mut conn, "server-01").await;

    conn.send(&AgentRequest::Register(registration("server-01"))).await;
    let second = match conn.recv().await {
        CoordinatorFrame::Registered(response) => response.server_id.unwrap(),
        other => unreachable!("expected Registered, got {other:?}"),
    };
    assert_eq!(first, second);
}

#[tokio::test]
async fn registration_returns_interval_settings() {
    let ctx = make_transport(TransportConfig::default());
    let mut conn = connect(&ctx, ConnectionSource::Tcp, "").await;
    conn.send(&AgentRequest::Register(registration("server-01"))).await;
    match conn.recv().await {
        CoordinatorFrame::Registered(response) => {
            assert!(response.success);
            assert_eq!(response.settings.heartbeat_interval_s, 30);
            assert_eq!(response.settings.metrics_interval_s, 300);
            assert_eq!(response.settings.discovery_interval_s, 600);
        }
        other => unreachable!("expected Registered, got {other:?}"),
    }
}

#[tokio::test]
async fn heartbeat_updates_registry_and_acks() {
    let mut ctx = make_transport(TransportConfig::default());
    let mut conn = connect(&ctx, ConnectionSource::Tcp, "").await;
    let id = register(&mut conn, "server-01").await;

    conn.send(&heartbeat(id, "server-01")).await;
    match conn.recv().await {
        CoordinatorFrame::HeartbeatAck(ack) => {
            assert!(ack.success);
            assert!(ack.pending_commands.is_empty());
        }
        other => unreachable!("expected HeartbeatAck, got {other:?}"),
    }
    assert!(ctx.transport.inner.registry.is_healthy(&id));
    let event = ctx.events.try_recv().unwrap();
    assert!(matches!(event, FleetEvent::AgentConnected { .. }));
}

#[tokio::test]
async fn heartbeat_for_unknown_agent_is_typed_not_registered() {
    let ctx = make_transport(TransportConfig::default());
    let mut conn = connect(&ctx, ConnectionSource::Tcp, "").await;
    conn.send(&heartbeat(AgentId::issue(), "ghost")).await;
    assert!(matches!(
        conn.recv().await,
        CoordinatorFrame::Error { code: convoy_wire::ErrorCode::NotRegistered, .. }
    ));
}

#[tokio::test]
async fn heartbeat_piggybacks_queued_commands_up_to_the_cap() {
    let ctx = make_transport(TransportConfig {
        max_piggyback_commands: 2,
        ..TransportConfig::default()
    });
    let mut conn = connect(&ctx, ConnectionSource::Tcp, "").await;
    let id = register(&mut conn, "server-01").await;

    for _ in 0..3 {
        ctx.transport.queue_command(id, "api", "restart");
    }
    conn.send(&heartbeat(id, "server-01")).await;
    match conn.recv().await {
        CoordinatorFrame::HeartbeatAck(ack) => {
            assert_eq!(ack.pending_commands.len(), 2);
        }
        other => unreachable!("expected HeartbeatAck, got {other:?}"),
    }
    // The overflow arrives with the next heartbeat.
    conn.send(&heartbeat(id, "server-01")).await;
    match conn.recv().await {
        CoordinatorFrame::HeartbeatAck(ack) => {
            assert_eq!(ack.pending_commands.len(), 1);
        }
        other => unreachable!("expected HeartbeatAck, got {other:?}"),
    }
}

#[tokio::test]
async fn service_report_flows_into_the_registry() {
    let ctx = make_transport(TransportConfig::default());
    let mut conn = connect(&ctx, ConnectionSource::Tcp, "").await;
    let id = register(&mut conn, "server-01").await;

    conn.send(&AgentRequest::ReportServices(convoy_wire::ServiceDiscovery {
        server_id: id,
        services: vec![DiscoveredService {
            name: "api".to_string(),
            display_name: "API".to_string(),
            status: ServiceStatus::Running,
            process_id: Some(100),
            port: Some(8080),
            executable_path: String::new(),
            working_directory: String::new(),
            config_file_path: String::new(),
            startup_type: "automatic".to_string(),
            service_account: String::new(),
            last_start_time_ms: None,
            is_active: true,
            version: "1.0.0".to_string(),
        }],
    }))
    .await;
    match conn.recv().await {
        CoordinatorFrame::ServicesAck(ack) => assert!(ack.success),
        other => unreachable!("expected ServicesAck, got {other:?}"),
    }
    let entry = ctx.transport.inner.registry.get(&id).unwrap();
    assert_eq!(entry.services["api"].status, ServiceStatus::Running);
}

#[tokio::test]
async fn metrics_batches_forward_to_the_fabric() {
    let ctx = make_transport(TransportConfig::default());
    let mut conn = connect(&ctx, ConnectionSource::Tcp, "").await;
    let id = register(&mut conn, "server-01").await;

    for batch in 0u64..2 {
        conn.send(&AgentRequest::Metrics(MetricsBatch {
            server_id: id,
            metrics: vec![MetricSample {
                service_id: None,
                metric_type: "gauge".to_string(),
                metric_name: "cpu_pct".to_string(),
                value: 40.0 + batch as f64,
                unit: "percent".to_string(),
                timestamp_ms: 1_000,
                tags: Default::default(),
            }],
        }))
        .await;
        match conn.recv().await {
            CoordinatorFrame::MetricsAck(summary) => {
                assert_eq!(summary.batches, batch + 1);
                assert_eq!(summary.accepted, batch + 1);
            }
            other => unreachable!("expected MetricsAck, got {other:?}"),
        }
    }
    let published = ctx.fabric.published_to(&format!("metrics.{id}"));
    assert_eq!(published.len(), 2);
}

#[tokio::test]
async fn session_unbinds_on_bye() {
    let ctx = make_transport(TransportConfig::default());
    let mut conn = connect(&ctx, ConnectionSource::Tcp, "").await;
    let id = register(&mut conn, "server-01").await;
    assert_eq!(ctx.transport.connected_agents(), vec![id]);

    conn.send(&AgentRequest::Bye).await;
    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    while !ctx.transport.connected_agents().is_empty() {
        assert!(std::time::Instant::now() < deadline, "session never unbound");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
