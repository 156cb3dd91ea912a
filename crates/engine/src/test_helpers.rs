// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for the engine crate.

use crate::engine::{Engine, EngineDeps};
use crate::EngineConfig;
use convoy_core::test_support::package_ref;
use convoy_core::{
    AgentId, Clock, DeploymentCommand, FakeClock, StatusPhase, StatusUpdate, StrategyKind,
    WorkflowId, WorkflowState, WorkflowStatus,
};
use convoy_fabric::FakeFabric;
use convoy_planner::{
    HealthCheckConfig, RollingConfig, StrategyConfig, WaveConfig, WorkflowRequest,
};
use convoy_store::MemoryStore;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

pub(crate) type TestEngine = Engine<MemoryStore<FakeClock>, FakeFabric, FakeClock>;

pub(crate) struct TestContext {
    pub engine: TestEngine,
    pub store: MemoryStore<FakeClock>,
    pub fabric: FakeFabric,
    pub clock: FakeClock,
    /// Clock advance applied per drive iteration, to trip clock-based
    /// deadlines and waits.
    pub auto_advance: Arc<Mutex<Duration>>,
    /// Cursor into the fabric's published list.
    seen: Arc<Mutex<usize>>,
}

pub(crate) fn setup() -> TestContext {
    setup_with(EngineConfig {
        tick_interval_ms: 10,
        resume_window_s: 2,
        publish_retry_s: 1,
        ..EngineConfig::default()
    })
}

pub(crate) fn setup_with(config: EngineConfig) -> TestContext {
    let clock = FakeClock::new();
    let store = MemoryStore::with_clock(clock.clone());
    let fabric = FakeFabric::new();
    let engine = Engine::new(
        EngineDeps {
            store: Arc::new(store.clone()),
            fabric: Arc::new(fabric.clone()),
            clock: clock.clone(),
            health: None,
        },
        config,
    );
    TestContext {
        engine,
        store,
        fabric,
        clock,
        auto_advance: Arc::new(Mutex::new(Duration::ZERO)),
        seen: Arc::new(Mutex::new(0)),
    }
}

impl TestContext {
    pub(crate) fn advance_per_tick(&self, duration: Duration) {
        *self.auto_advance.lock() = duration;
    }

    /// New command messages published since the last call.
    pub(crate) fn new_commands(&self) -> Vec<DeploymentCommand> {
        let published = self.fabric.published();
        let mut seen = self.seen.lock();
        let fresh = published[*seen..]
            .iter()
            .filter(|m| m.routing_key.starts_with("command."))
            .map(|m| m.decode::<DeploymentCommand>())
            .collect();
        *seen = published.len();
        fresh
    }

    pub(crate) async fn respond(&self, command: &DeploymentCommand, phase: StatusPhase) {
        self.engine
            .ingest_status(StatusUpdate {
                command_id: command.command_id,
                workflow_id: command.workflow_id,
                agent_id: command.agent_id,
                timestamp_ms: self.clock.epoch_ms(),
                phase,
                details: None,
            })
            .await;
    }

    /// Drive the workflow by answering published commands until it
    /// reaches `target` (or a real-time safety timeout lapses).
    pub(crate) async fn drive_until<F>(
        &self,
        id: WorkflowId,
        target: WorkflowState,
        mut respond: F,
    ) -> WorkflowStatus
    where
        F: FnMut(&DeploymentCommand) -> Option<StatusPhase>,
    {
        let deadline = std::time::Instant::now() + Duration::from_secs(10);
        loop {
            for command in self.new_commands() {
                if let Some(phase) = respond(&command) {
                    self.respond(&command, phase).await;
                }
            }
            let status = match self.engine.status(id).await {
                Ok(status) => status,
                Err(_) => {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    continue;
                }
            };
            if status.state == target || status.state.is_terminal() {
                return status;
            }
            if std::time::Instant::now() > deadline {
                return status;
            }
            let advance = *self.auto_advance.lock();
            if !advance.is_zero() {
                self.clock.advance(advance);
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    /// Drive until any terminal state.
    pub(crate) async fn drive<F>(&self, id: WorkflowId, respond: F) -> WorkflowStatus
    where
        F: FnMut(&DeploymentCommand) -> Option<StatusPhase>,
    {
        self.drive_until(id, WorkflowState::Succeeded, respond).await
    }
}

/// Succeed everything.
pub(crate) fn all_ok(_command: &DeploymentCommand) -> Option<StatusPhase> {
    Some(StatusPhase::Succeeded)
}

pub(crate) fn agents(n: usize) -> Vec<AgentId> {
    (0..n).map(|_| AgentId::issue()).collect()
}

pub(crate) fn rolling_request(
    targets: &[AgentId],
    wave_size: u32,
    max_failure_pct: u8,
    health_timeout_s: u64,
) -> WorkflowRequest {
    WorkflowRequest::new(
        "api",
        "2.0.0",
        StrategyKind::Rolling,
        targets.to_vec(),
        package_ref(),
    )
    .initiated_by("spec-runner")
    .config(StrategyConfig {
        rolling: Some(RollingConfig { max_failure_threshold_pct: max_failure_pct, max_retries: 1 }),
        wave: Some(WaveConfig { wave_size, ..WaveConfig::default() }),
        health_check: Some(HealthCheckConfig {
            timeout_s: health_timeout_s,
            success_ratio: 1.0,
        }),
        canary: None,
    })
}
