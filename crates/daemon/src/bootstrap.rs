// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Boot, run, and drain the coordinator.
//!
//! Dependencies are constructed here and passed down explicitly; nothing
//! global. Shutdown order: stop accepting workflows, let drivers reach a
//! safe checkpoint and release leases, then stop consumers and listeners.

use crate::config::DaemonConfig;
use convoy_core::{
    Alert, AlertCategory, AlertSeverity, Clock, FleetEvent, StatusUpdate, SystemClock,
};
use convoy_engine::{Engine, EngineDeps, FleetHealth};
use convoy_fabric::{
    AmqpPublisher, ChannelPool, Consumer, FabricPublisher, HandlerOutcome, MessageProps,
    RateLimiter, Topology,
};
use convoy_registry::{FleetRegistry, RegistryConfig};
use convoy_store::{MemoryStore, RedisStore, StateStore};
use convoy_transport::{Listener, Transport};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Adapts the fleet registry to the engine's health seam.
struct RegistryHealth(Arc<FleetRegistry<SystemClock>>);

impl FleetHealth for RegistryHealth {
    fn is_healthy(&self, agent: &convoy_core::AgentId) -> bool {
        self.0.is_healthy(agent)
    }
}

pub async fn run(config: DaemonConfig) -> Result<(), Box<dyn std::error::Error>> {
    let clock = SystemClock;
    let shutdown = CancellationToken::new();

    // Broker: pool, topology, publisher, status consumer.
    let pool = Arc::new(ChannelPool::connect(config.broker.clone()).await?);
    let topology = Topology::new(config.broker.clone());
    let channel = pool.checkout().await?;
    topology.declare(&channel).await?;
    pool.checkin(channel);

    let limiter = Arc::new(RateLimiter::new(config.broker.max_messages_per_second));
    let amqp = Arc::new(AmqpPublisher::new(
        Arc::clone(&pool),
        limiter,
        config.broker.exchange.clone(),
        Duration::from_secs(config.broker.publish_timeout_s),
    ));
    let publisher: Arc<dyn FabricPublisher> = Arc::clone(&amqp) as Arc<dyn FabricPublisher>;

    // Fleet registry + disconnect sweeper + event-to-alert bridge.
    let (fleet_tx, fleet_rx) = mpsc::channel::<FleetEvent>(256);
    let registry = Arc::new(FleetRegistry::new(
        clock.clone(),
        RegistryConfig {
            heartbeat_timeout: Duration::from_secs(config.engine.heartbeat_timeout_s),
        },
        fleet_tx,
    ));
    spawn_sweeper(Arc::clone(&registry), shutdown.clone());
    spawn_fleet_alerts(fleet_rx, Arc::clone(&publisher), clock.clone(), shutdown.clone());

    // Agent transport.
    let transport = Transport::new(
        Arc::clone(&registry),
        Arc::clone(&publisher),
        clock.clone(),
        config.transport.clone(),
    );
    let listener = Listener::bind(transport.clone()).await?;
    tokio::spawn(listener.run(shutdown.clone()));

    // Engine over the configured store.
    if config.memory_store {
        tracing::warn!("running on the in-memory store; workflow state is not durable");
        let store = Arc::new(MemoryStore::new());
        run_engine(config, store, amqp, pool, registry, clock, shutdown).await
    } else {
        let store = Arc::new(RedisStore::connect(&config.store).await?);
        run_engine(config, store, amqp, pool, registry, clock, shutdown).await
    }
}

async fn run_engine<S: StateStore + 'static>(
    config: DaemonConfig,
    store: Arc<S>,
    fabric: Arc<AmqpPublisher>,
    pool: Arc<ChannelPool>,
    registry: Arc<FleetRegistry<SystemClock>>,
    clock: SystemClock,
    shutdown: CancellationToken,
) -> Result<(), Box<dyn std::error::Error>> {
    let engine = Engine::new(
        EngineDeps {
            store,
            fabric,
            clock,
            health: Some(Arc::new(RegistryHealth(registry))),
        },
        config.engine.clone(),
    );

    // Crash recovery: adopt orphaned workflows before taking new work.
    let resumed = engine.resume_orphaned().await?;
    if !resumed.is_empty() {
        tracing::info!(count = resumed.len(), "resumed orphaned workflows");
    }

    // Status consumer: correlated updates drive the engine's event loops.
    let topology = Topology::new(config.broker.clone());
    let status_queue = topology.queue_name("status");
    let consumer = Consumer::new(Arc::clone(&pool), config.broker.clone());
    let consumer_engine = engine.clone();
    let consumer_cancel = shutdown.clone();
    tokio::spawn(async move {
        let handler = move |payload: Vec<u8>, _ctx: convoy_fabric::DeliveryCtx| {
            let engine = consumer_engine.clone();
            async move {
                match serde_json::from_slice::<StatusUpdate>(&payload) {
                    Ok(update) => {
                        engine.ingest_status(update).await;
                        HandlerOutcome::Ack
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "undecodable status update dead-lettered");
                        HandlerOutcome::Dead
                    }
                }
            }
        };
        if let Err(e) = consumer.consume(&status_queue, handler, consumer_cancel).await {
            tracing::error!(error = %e, "status consumer stopped");
        }
    });

    // Intake consumer: deployment requests arrive on the deployment
    // queue (published by the dashboard's API layer) and enter the
    // engine here.
    let intake_queue = topology.queue_name("deployment");
    let intake = Consumer::new(Arc::clone(&pool), config.broker.clone());
    let intake_engine = engine.clone();
    let intake_cancel = shutdown.clone();
    tokio::spawn(async move {
        let handler = move |payload: Vec<u8>, _ctx: convoy_fabric::DeliveryCtx| {
            let engine = intake_engine.clone();
            async move {
                let request = match serde_json::from_slice::<convoy_planner::WorkflowRequest>(
                    &payload,
                ) {
                    Ok(request) => request,
                    Err(e) => {
                        tracing::warn!(error = %e, "undecodable deployment request dead-lettered");
                        return HandlerOutcome::Dead;
                    }
                };
                match engine.submit(request).await {
                    Ok(id) => {
                        tracing::info!(workflow = %id, "deployment request accepted");
                        HandlerOutcome::Ack
                    }
                    Err(convoy_engine::EngineError::Draining) => HandlerOutcome::Requeue,
                    Err(e) => {
                        tracing::error!(error = %e, "deployment request failed");
                        HandlerOutcome::Dead
                    }
                }
            }
        };
        if let Err(e) = intake.consume(&intake_queue, handler, intake_cancel).await {
            tracing::error!(error = %e, "deployment intake consumer stopped");
        }
    });

    tracing::info!("convoyd ready");
    wait_for_shutdown().await;

    // Graceful drain.
    tracing::info!("draining");
    engine.drain().await;
    shutdown.cancel();
    tokio::time::sleep(Duration::from_millis(200)).await;
    tracing::info!("bye");
    Ok(())
}

fn spawn_sweeper(registry: Arc<FleetRegistry<SystemClock>>, cancel: CancellationToken) {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_secs(10));
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tick.tick() => registry.sweep(),
            }
        }
    });
}

/// Fleet liveness changes become alerts on the alert queues.
fn spawn_fleet_alerts(
    mut events: mpsc::Receiver<FleetEvent>,
    publisher: Arc<dyn FabricPublisher>,
    clock: SystemClock,
    cancel: CancellationToken,
) {
    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => return,
                event = events.recv() => match event {
                    Some(event) => event,
                    None => return,
                },
            };
            let alert = match &event {
                FleetEvent::AgentDisconnected { hostname, .. } => Some(
                    Alert::new(
                        AlertSeverity::Warning,
                        AlertCategory::Fleet,
                        "agent disconnected",
                        format!("{hostname} stopped heartbeating"),
                    )
                    .servers(vec![hostname.clone()]),
                ),
                FleetEvent::AgentConnected { hostname, .. } => Some(
                    Alert::new(
                        AlertSeverity::Info,
                        AlertCategory::Fleet,
                        "agent connected",
                        format!("{hostname} is heartbeating"),
                    )
                    .servers(vec![hostname.clone()]),
                ),
                FleetEvent::ServiceStateChanged { .. } => None,
            };
            let Some(mut alert) = alert else { continue };
            alert.at_ms = clock.epoch_ms();
            match serde_json::to_vec(&alert) {
                Ok(payload) => {
                    if let Err(e) = publisher
                        .publish(&alert.routing_key(), payload, MessageProps::default())
                        .await
                    {
                        tracing::warn!(error = %e, "fleet alert publish failed");
                    }
                }
                Err(e) => tracing::error!(error = %e, "fleet alert serialization failed"),
            }
        }
    });
}

async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "ctrl-c handler failed");
            std::future::pending::<()>().await;
        }
    };
    #[cfg(unix)]
    {
        let mut term = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        {
            Ok(term) => term,
            Err(e) => {
                tracing::error!(error = %e, "sigterm handler failed");
                ctrl_c.await;
                return;
            }
        };
        tokio::select! {
            _ = ctrl_c => {}
            _ = term.recv() => {}
        }
    }
    #[cfg(not(unix))]
    ctrl_c.await;
}
