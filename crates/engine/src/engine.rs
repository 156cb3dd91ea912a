// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine front door: submission, control, status, crash recovery.

use crate::alerts::AlertSink;
use crate::config::EngineConfig;
use crate::driver::Driver;
use crate::error::EngineError;
use crate::keys;
use convoy_core::{
    AgentId, Clock, DeploymentWorkflow, StatusUpdate, WorkflowError, WorkflowId, WorkflowMetrics,
    WorkflowState, WorkflowStatus, WorkflowTransition,
};
use convoy_fabric::{FabricPublisher, MessageProps};
use convoy_planner::WorkflowRequest;
use convoy_store::{StateStore, StateStoreExt};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;

/// External control signals for a running workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Pause,
    Resume,
    Cancel,
}

/// Fleet-health lookup consulted before dispatching to a server.
/// Implemented by the fleet registry; `None` in deps means every target
/// is assumed healthy.
pub trait FleetHealth: Send + Sync {
    fn is_healthy(&self, agent: &AgentId) -> bool;
}

/// Engine dependencies, passed explicitly: no globals, lifecycle owned
/// by the daemon.
pub struct EngineDeps<S, F, C> {
    pub store: Arc<S>,
    pub fabric: Arc<F>,
    pub clock: C,
    pub health: Option<Arc<dyn FleetHealth>>,
}

pub(crate) struct EngineInner<S, F, C: Clock> {
    pub(crate) store: Arc<S>,
    pub(crate) fabric: Arc<F>,
    pub(crate) clock: C,
    pub(crate) config: EngineConfig,
    pub(crate) engine_id: String,
    pub(crate) global_slots: Arc<Semaphore>,
    pub(crate) alerts: AlertSink<F, C>,
    pub(crate) health: Option<Arc<dyn FleetHealth>>,
    pub(crate) routes: Mutex<HashMap<WorkflowId, mpsc::Sender<StatusUpdate>>>,
    pub(crate) controls: Mutex<HashMap<WorkflowId, mpsc::Sender<Control>>>,
    pub(crate) drain: CancellationToken,
}

/// The workflow engine. Cheap to clone; clones share state.
pub struct Engine<S, F, C: Clock> {
    pub(crate) inner: Arc<EngineInner<S, F, C>>,
}

impl<S, F, C: Clock> Clone for Engine<S, F, C> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<S, F, C> Engine<S, F, C>
where
    S: StateStore + 'static,
    F: FabricPublisher + 'static,
    C: Clock + 'static,
{
    pub fn new(deps: EngineDeps<S, F, C>, config: EngineConfig) -> Self {
        let engine_id = format!("engine-{}", uuid::Uuid::new_v4().simple());
        let alerts = AlertSink::new(
            Arc::clone(&deps.fabric),
            deps.clock.clone(),
            Duration::from_secs(config.alert_suppression_s),
        );
        Self {
            inner: Arc::new(EngineInner {
                store: deps.store,
                fabric: deps.fabric,
                clock: deps.clock,
                global_slots: Arc::new(Semaphore::new(config.max_inflight_global)),
                alerts,
                health: deps.health,
                engine_id,
                config,
                routes: Mutex::new(HashMap::new()),
                controls: Mutex::new(HashMap::new()),
                drain: CancellationToken::new(),
            }),
        }
    }

    pub fn engine_id(&self) -> &str {
        &self.inner.engine_id
    }

    /// Submit a deployment request.
    ///
    /// The workflow record always exists afterwards; a configuration
    /// failure leaves it in `Planning` with `last_error` set and never
    /// produces side effects.
    pub async fn submit(&self, request: WorkflowRequest) -> Result<WorkflowId, EngineError> {
        if self.inner.drain.is_cancelled() {
            return Err(EngineError::Draining);
        }

        let now = self.inner.clock.epoch_ms();
        let mut wf = DeploymentWorkflow {
            id: WorkflowId::new(),
            service_name: request.service_name.clone(),
            target_version: request.version.clone(),
            strategy: request.strategy,
            package: request.package.clone(),
            initiated_by: request.initiated_by.clone(),
            priority: request.priority.min(10),
            created_at_ms: now,
            state: WorkflowState::Pending,
            phases: Vec::new(),
            current_phase: 0,
            metrics: WorkflowMetrics::default(),
            deadline_ms: 0,
            last_error: None,
            attempt: 0,
            rollback_started: false,
        };
        self.inner.save_workflow(&wf).await?;

        self.inner.transition(&mut wf, WorkflowState::Planning).await?;

        let id = wf.id.clone();
        match convoy_planner::plan(&request) {
            Ok(phases) => {
                let estimate = convoy_planner::estimate(
                    request.target_servers.len(),
                    request.strategy,
                    &request.config,
                );
                wf.phases = phases;
                // Double the estimate: retries and backpressure queueing
                // consume wall-clock the happy path does not.
                wf.deadline_ms = now + 2 * estimate.as_millis() as u64;
                self.inner.save_workflow(&wf).await?;
                self.spawn_driver(wf, false);
            }
            Err(e) => {
                tracing::warn!(workflow = %wf.id, error = %e, "configuration rejected");
                wf.last_error = Some(e.to_workflow_error());
                self.inner.save_workflow(&wf).await?;
            }
        }
        Ok(id)
    }

    /// Route a status update to the owning driver. Updates for unclaimed
    /// or finished workflows are dropped; replay makes that safe.
    pub async fn ingest_status(&self, update: StatusUpdate) {
        let route = self.inner.routes.lock().get(&update.workflow_id).cloned();
        match route {
            Some(tx) => {
                if tx.send(update).await.is_err() {
                    tracing::debug!("status for finished workflow dropped");
                }
            }
            None => {
                tracing::debug!(workflow = %update.workflow_id, "status without driver dropped");
            }
        }
    }

    /// Pause, resume, or cancel a workflow this engine is driving.
    pub async fn control(&self, id: WorkflowId, control: Control) -> Result<(), EngineError> {
        let tx = self.inner.controls.lock().get(&id).cloned();
        let tx = tx.ok_or(EngineError::WorkflowNotFound(id))?;
        tx.send(control)
            .await
            .map_err(|_| EngineError::WorkflowNotFound(id))
    }

    /// Stable status surface for a workflow, live or terminal.
    pub async fn status(&self, id: WorkflowId) -> Result<WorkflowStatus, EngineError> {
        let wf: DeploymentWorkflow = self
            .inner
            .store
            .get(&keys::workflow(id))
            .await?
            .ok_or(EngineError::WorkflowNotFound(id))?;
        Ok(wf.status())
    }

    /// Scan for non-terminal workflows whose lease lapsed, acquire their
    /// leases, and resume driving them from persisted state.
    pub async fn resume_orphaned(&self) -> Result<Vec<WorkflowId>, EngineError> {
        let keys_found = self.inner.store.keys(keys::WORKFLOW_SCAN).await?;
        let mut resumed = Vec::new();
        for key in keys_found {
            if !keys::is_workflow_record(&key) {
                continue;
            }
            let Some(wf) = self.inner.store.get::<DeploymentWorkflow>(&key).await? else {
                continue;
            };
            if wf.is_terminal() || wf.phases.is_empty() {
                continue;
            }
            let taken = self
                .inner
                .store
                .acquire_lease(
                    &keys::lease(wf.id),
                    &self.inner.engine_id,
                    self.inner.config.lease_ttl(),
                )
                .await?;
            if !taken {
                continue;
            }
            tracing::info!(workflow = %wf.id, "resuming orphaned workflow");
            resumed.push(wf.id);
            self.spawn_driver(wf, true);
        }
        Ok(resumed)
    }

    /// Graceful drain: stop accepting work, let drivers reach a safe
    /// checkpoint and release their leases.
    pub async fn drain(&self) {
        self.inner.drain.cancel();
        // Drivers observe the token at their next suspension point.
        for _ in 0..50 {
            if self.inner.routes.lock().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    /// Workflows currently driven by this engine instance.
    pub fn active_workflows(&self) -> Vec<WorkflowId> {
        self.inner.routes.lock().keys().copied().collect()
    }

    fn spawn_driver(&self, wf: DeploymentWorkflow, resumed: bool) {
        let (status_tx, status_rx) = mpsc::channel(256);
        let (control_tx, control_rx) = mpsc::channel(16);
        let id = wf.id;
        self.inner.routes.lock().insert(id, status_tx);
        self.inner.controls.lock().insert(id, control_tx);

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            Driver::new(Arc::clone(&inner), wf, status_rx, control_rx, resumed)
                .run()
                .await;
            inner.routes.lock().remove(&id);
            inner.controls.lock().remove(&id);
        });
    }
}

impl<S, F, C> EngineInner<S, F, C>
where
    S: StateStore + 'static,
    F: FabricPublisher + 'static,
    C: Clock + 'static,
{
    /// Persist the workflow record. Terminal records get a TTL so the
    /// store stays bounded.
    pub(crate) async fn save_workflow(&self, wf: &DeploymentWorkflow) -> Result<(), EngineError> {
        let ttl = wf
            .is_terminal()
            .then(|| Duration::from_secs(self.config.terminal_record_ttl_s));
        self.store.set(&keys::workflow(wf.id), wf, ttl).await?;
        Ok(())
    }

    /// Apply and persist a state transition, then publish it on
    /// `workflow.lifecycle` (best-effort).
    pub(crate) async fn transition(
        &self,
        wf: &mut DeploymentWorkflow,
        next: WorkflowState,
    ) -> Result<(), EngineError> {
        let prev = wf
            .transition(next)
            .map_err(|e: WorkflowError| EngineError::Internal(e.to_string()))?;
        if prev == next {
            return Ok(());
        }
        self.save_workflow(wf).await?;
        tracing::info!(workflow = %wf.id, from = %prev, to = %next, "workflow transition");

        let event = WorkflowTransition {
            workflow_id: wf.id,
            from: prev,
            to: next,
            at_ms: self.clock.epoch_ms(),
        };
        if let Ok(payload) = serde_json::to_vec(&event) {
            if let Err(e) = self
                .fabric
                .publish(WorkflowTransition::ROUTING_KEY, payload, MessageProps::default())
                .await
            {
                tracing::debug!(error = %e, "lifecycle publish failed");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
