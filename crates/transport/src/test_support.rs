// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for transport tests: an in-memory agent connection.

use crate::config::TransportConfig;
use crate::session::{run_session, ConnectionSource};
use crate::transport::Transport;
use convoy_core::{AgentId, FakeClock, FleetEvent};
use convoy_fabric::{FabricPublisher, FakeFabric};
use convoy_registry::{FleetRegistry, RegistryConfig};
use convoy_wire::{
    read_frame, write_frame, AgentRegistration, AgentRequest, CoordinatorFrame,
    PROTOCOL_VERSION,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{ReadHalf, WriteHalf};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub(crate) struct TestTransport {
    pub transport: Transport<FakeClock>,
    pub fabric: FakeFabric,
    pub clock: FakeClock,
    pub events: mpsc::Receiver<FleetEvent>,
    pub cancel: CancellationToken,
}

pub(crate) fn make_transport(config: TransportConfig) -> TestTransport {
    let clock = FakeClock::new();
    let fabric = FakeFabric::new();
    let (tx, events) = mpsc::channel(64);
    let registry = Arc::new(FleetRegistry::new(clock.clone(), RegistryConfig::default(), tx));
    let transport = Transport::new(
        registry,
        Arc::new(fabric.clone()) as Arc<dyn FabricPublisher>,
        clock.clone(),
        config,
    );
    TestTransport { transport, fabric, clock, events, cancel: CancellationToken::new() }
}

pub(crate) struct AgentConn {
    pub reader: ReadHalf<tokio::io::DuplexStream>,
    pub writer: WriteHalf<tokio::io::DuplexStream>,
}

impl AgentConn {
    pub(crate) async fn send(&mut self, request: &AgentRequest) {
        write_frame(&mut self.writer, request).await.expect("send frame");
    }

    pub(crate) async fn recv(&mut self) -> CoordinatorFrame {
        read_frame(&mut self.reader, Duration::from_secs(5)).await.expect("recv frame")
    }
}

/// Open a connection and complete the Hello handshake.
pub(crate) async fn connect(ctx: &TestTransport, source: ConnectionSource, token: &str) -> AgentConn {
    let (client, server) = tokio::io::duplex(1024 * 1024);
    let inner = Arc::clone(&ctx.transport.inner);
    let cancel = ctx.cancel.clone();
    tokio::spawn(async move {
        run_session(inner, server, source, cancel).await;
    });

    let (reader, writer) = tokio::io::split(client);
    let mut conn = AgentConn { reader, writer };
    conn.send(&AgentRequest::Hello {
        token: token.to_string(),
        protocol_version: PROTOCOL_VERSION,
    })
    .await;
    let hello = conn.recv().await;
    assert!(matches!(hello, CoordinatorFrame::HelloOk { .. }), "handshake failed: {hello:?}");
    conn
}

pub(crate) fn registration(hostname: &str) -> AgentRegistration {
    AgentRegistration {
        hostname: hostname.to_string(),
        ip_address: "10.0.0.1".to_string(),
        os_type: "linux".to_string(),
        os_version: "6.1".to_string(),
        agent_version: "0.1.0".to_string(),
        cpu_cores: 8,
        total_memory_mb: 16_384,
        location: String::new(),
        environment: "test".to_string(),
        tags: Default::default(),
    }
}

/// Register over the connection and return the issued id.
pub(crate) async fn register(conn: &mut AgentConn, hostname: &str) -> AgentId {
    conn.send(&AgentRequest::Register(registration(hostname))).await;
    match conn.recv().await {
        CoordinatorFrame::Registered(response) => {
            response.server_id.expect("registration carries an id")
        }
        other => unreachable!("expected Registered, got {other:?}"),
    }
}
