// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scenario harness: an engine over `MemoryStore` + `FakeFabric` with a
//! controllable clock, and a pump that plays the agent fleet.

use convoy_core::test_support::package_ref;
use convoy_core::{
    AgentId, Clock, DeploymentCommand, FakeClock, StatusPhase, StatusUpdate, StrategyKind,
    WorkflowId, WorkflowState, WorkflowStatus,
};
use convoy_engine::{Engine, EngineConfig, EngineDeps};
use convoy_fabric::FakeFabric;
use convoy_planner::{
    HealthCheckConfig, RollingConfig, StrategyConfig, WaveConfig, WorkflowRequest,
};
use convoy_store::MemoryStore;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub type SpecEngine = Engine<MemoryStore<FakeClock>, FakeFabric, FakeClock>;

pub struct Fleet {
    pub engine: SpecEngine,
    pub store: MemoryStore<FakeClock>,
    pub fabric: FakeFabric,
    pub clock: FakeClock,
    seen: Arc<AtomicUsize>,
}

pub fn fleet() -> Fleet {
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
        EngineConfig { tick_interval_ms: 10, resume_window_s: 2, ..EngineConfig::default() },
    );
    Fleet { engine, store, fabric, clock, seen: Arc::new(AtomicUsize::new(0)) }
}

pub fn second_engine(fleet: &Fleet) -> SpecEngine {
    Engine::new(
        EngineDeps {
            store: Arc::new(fleet.store.clone()),
            fabric: Arc::new(fleet.fabric.clone()),
            clock: fleet.clock.clone(),
            health: None,
        },
        EngineConfig { tick_interval_ms: 10, resume_window_s: 2, ..EngineConfig::default() },
    )
}

impl Fleet {
    /// Command messages published since the last call.
    pub fn new_commands(&self) -> Vec<DeploymentCommand> {
        let published = self.fabric.published();
        let from = self.seen.swap(published.len(), Ordering::SeqCst);
        published[from..]
            .iter()
            .filter(|m| m.routing_key.starts_with("command."))
            .map(|m| m.decode::<DeploymentCommand>())
            .collect()
    }

    pub async fn respond(&self, command: &DeploymentCommand, phase: StatusPhase) {
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

    /// Answer published commands until the workflow reaches `target` or
    /// any terminal state. Advances the clock by `tick` per iteration so
    /// waits and gate deadlines pass.
    pub async fn drive_until<F>(
        &self,
        id: WorkflowId,
        target: WorkflowState,
        tick: Duration,
        mut respond: F,
    ) -> WorkflowStatus
    where
        F: FnMut(&DeploymentCommand) -> Option<StatusPhase>,
    {
        let deadline = std::time::Instant::now() + Duration::from_secs(15);
        loop {
            for command in self.new_commands() {
                if let Some(phase) = respond(&command) {
                    self.respond(&command, phase).await;
                }
            }
            let status = self.engine.status(id).await.expect("workflow exists");
            if status.state == target || status.state.is_terminal() {
                return status;
            }
            if std::time::Instant::now() > deadline {
                return status;
            }
            if !tick.is_zero() {
                self.clock.advance(tick);
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    pub async fn drive<F>(&self, id: WorkflowId, respond: F) -> WorkflowStatus
    where
        F: FnMut(&DeploymentCommand) -> Option<StatusPhase>,
    {
        self.drive_until(id, WorkflowState::Succeeded, Duration::ZERO, respond).await
    }
}

pub fn agents(n: usize) -> Vec<AgentId> {
    (0..n).map(|_| AgentId::issue()).collect()
}

pub fn all_ok(_command: &DeploymentCommand) -> Option<StatusPhase> {
    Some(StatusPhase::Succeeded)
}

pub fn rolling_request(
    targets: &[AgentId],
    wave_size: u32,
    max_failure_pct: u8,
    health_timeout_s: u64,
) -> WorkflowRequest {
    WorkflowRequest::new(
        "billing-api",
        "2.0.0",
        StrategyKind::Rolling,
        targets.to_vec(),
        package_ref(),
    )
    .initiated_by("release-bot")
    .config(StrategyConfig {
        rolling: Some(RollingConfig { max_failure_threshold_pct: max_failure_pct, max_retries: 1 }),
        wave: Some(WaveConfig { wave_size, ..WaveConfig::default() }),
        health_check: Some(HealthCheckConfig { timeout_s: health_timeout_s, success_ratio: 1.0 }),
        canary: None,
    })
}
