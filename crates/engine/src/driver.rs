// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-workflow driver: a logically sequential task whose single select
//! loop drains status updates, control signals, and tick timers.
//!
//! All mutations happen under the workflow lease and are persisted to the
//! state store before any publish.

use crate::engine::{Control, EngineInner};
use crate::error::EngineError;
use crate::gate::{self, GateOutcome};
use crate::keys;
use crate::state::PendingCommand;
use convoy_core::{
    Alert, AlertCategory, AlertSeverity, AgentId, Clock, CommandId, DeploymentCommand,
    DeploymentWorkflow, HealthGate, Operation, Phase, PhaseKind, PhaseState, ServerStepState,
    StatusPhase, StatusUpdate, Step, StepKind, WorkflowError, WorkflowState,
};
use convoy_fabric::{FabricPublisher, MessageProps};
use convoy_store::{StateStore, StateStoreExt};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};

/// Why the drive loop stopped before natural completion.
enum Interrupt {
    /// Finalized as Canceled; nothing further to do.
    Canceled,
    /// Engine is draining; lease released, workflow stays resumable.
    Drained,
    /// Another engine owns the lease now; stop without mutating.
    LeaseLost,
    Error(EngineError),
}

impl From<EngineError> for Interrupt {
    fn from(e: EngineError) -> Self {
        Interrupt::Error(e)
    }
}

impl From<convoy_store::StoreError> for Interrupt {
    fn from(e: convoy_store::StoreError) -> Self {
        Interrupt::Error(EngineError::Store(e))
    }
}

enum StepResult {
    Passed,
    Failed(WorkflowError),
}

enum PhaseOutcome {
    Succeeded,
    Failed(WorkflowError),
}

enum Wake {
    Drained,
    Status(StatusUpdate),
    Control(Control),
    Tick,
}

struct Permits {
    _workflow: OwnedSemaphorePermit,
    _global: OwnedSemaphorePermit,
}

pub(crate) struct Driver<S, F, C: Clock> {
    inner: Arc<EngineInner<S, F, C>>,
    wf: DeploymentWorkflow,
    status_rx: mpsc::Receiver<StatusUpdate>,
    control_rx: mpsc::Receiver<Control>,
    wf_slots: Arc<Semaphore>,
    pending: HashMap<CommandId, PendingCommand>,
    permits: HashMap<CommandId, Permits>,
    resumed: bool,
    next_lease_renew_ms: u64,
    lease_lost: bool,
}

impl<S, F, C> Driver<S, F, C>
where
    S: StateStore + 'static,
    F: FabricPublisher + 'static,
    C: Clock + 'static,
{
    pub(crate) fn new(
        inner: Arc<EngineInner<S, F, C>>,
        wf: DeploymentWorkflow,
        status_rx: mpsc::Receiver<StatusUpdate>,
        control_rx: mpsc::Receiver<Control>,
        resumed: bool,
    ) -> Self {
        let cap = wf
            .phases
            .iter()
            .filter_map(|p| p.max_parallelism)
            .max()
            .unwrap_or(inner.config.max_parallelism_default)
            .max(1);
        Self {
            inner,
            wf,
            status_rx,
            control_rx,
            wf_slots: Arc::new(Semaphore::new(cap)),
            pending: HashMap::new(),
            permits: HashMap::new(),
            resumed,
            next_lease_renew_ms: 0,
            lease_lost: false,
        }
    }

    pub(crate) async fn run(mut self) {
        let id = self.wf.id;
        if !self.resumed {
            let taken = self
                .inner
                .store
                .acquire_lease(
                    &keys::lease(id),
                    &self.inner.engine_id,
                    self.inner.config.lease_ttl(),
                )
                .await;
            match taken {
                Ok(true) => {}
                Ok(false) => {
                    tracing::warn!(workflow = %id, "lease held elsewhere, not driving");
                    return;
                }
                Err(e) => {
                    tracing::error!(workflow = %id, error = %e, "lease acquisition failed");
                    return;
                }
            }
        }

        match self.drive().await {
            Ok(()) => tracing::info!(workflow = %id, state = %self.wf.state, "workflow finished"),
            Err(Interrupt::Canceled) => {
                tracing::info!(workflow = %id, "workflow canceled")
            }
            Err(Interrupt::Drained) => {
                tracing::info!(workflow = %id, "driver drained at checkpoint")
            }
            Err(Interrupt::LeaseLost) => {
                tracing::warn!(workflow = %id, "lease lost, stopped driving")
            }
            Err(Interrupt::Error(e)) => {
                tracing::error!(workflow = %id, error = %e, "driver stopped on error")
            }
        }

        if !self.lease_lost {
            if let Err(e) = self
                .inner
                .store
                .release_lease(&keys::lease(id), &self.inner.engine_id)
                .await
            {
                tracing::warn!(workflow = %id, error = %e, "lease release failed");
            }
        }
    }

    async fn drive(&mut self) -> Result<(), Interrupt> {
        if self.wf.is_terminal() {
            return Ok(());
        }
        if self.resumed {
            self.load_pending().await?;
        }
        match self.wf.state {
            WorkflowState::Pending | WorkflowState::Planning => {
                self.transition(WorkflowState::Running).await?;
            }
            WorkflowState::Paused => self.wait_for_resume().await?,
            WorkflowState::RollingBack => {
                // Resumed mid-rollback: finish the rollback wave only.
                let index = self.wf.current_phase.min(self.wf.phases.len().saturating_sub(1));
                return match self.run_phase(index).await? {
                    PhaseOutcome::Succeeded => {
                        self.transition(WorkflowState::RolledBack).await?;
                        Ok(())
                    }
                    PhaseOutcome::Failed(e) => self.fail(e).await,
                };
            }
            _ => {}
        }

        while self.wf.current_phase < self.wf.phases.len() {
            let index = self.wf.current_phase;
            let outcome = self.run_phase(index).await?;
            match outcome {
                PhaseOutcome::Succeeded => {
                    let pause = self.wf.phases[index].pause_on_success
                        && index + 1 < self.wf.phases.len();
                    self.wf.advance_phase();
                    self.persist().await?;
                    if pause {
                        self.transition(WorkflowState::Paused).await?;
                        self.wait_for_resume().await?;
                    }
                }
                PhaseOutcome::Failed(reason) => {
                    let phase_kind = self.wf.phases[index].kind;
                    let rollback = self.wf.phases[index].rollback_on_failure;
                    if phase_kind == PhaseKind::Cleanup {
                        // Cleanup never fails the workflow.
                        tracing::warn!(workflow = %self.wf.id, error = %reason, "cleanup phase failed");
                        self.wf.advance_phase();
                        self.persist().await?;
                        continue;
                    }
                    if rollback && !self.wf.rollback_started {
                        return self.run_rollback(reason).await;
                    }
                    return self.fail(reason).await;
                }
            }
        }

        self.finalize_success().await
    }

    // ── Phases ──────────────────────────────────────────────────────────

    async fn run_phase(&mut self, index: usize) -> Result<PhaseOutcome, Interrupt> {
        let name = self.wf.phases[index].name.clone();
        tracing::info!(workflow = %self.wf.id, phase = %name, "phase started");
        self.wf.phases[index].state = PhaseState::Running;
        self.persist().await?;

        let step_count = self.wf.phases[index].steps.len();
        let mut failure: Option<WorkflowError> = None;
        let first_step = self.wf.phases[index].current_step;
        for step_index in first_step..step_count {
            self.wf.phases[index].current_step = step_index;
            self.persist().await?;
            match self.run_step(index, step_index).await? {
                StepResult::Passed => {}
                StepResult::Failed(reason) => {
                    let critical = self.wf.phases[index].steps[step_index].critical;
                    if critical {
                        failure = Some(reason);
                        break;
                    }
                    tracing::warn!(
                        workflow = %self.wf.id,
                        phase = %name,
                        step = %self.wf.phases[index].steps[step_index].name,
                        error = %reason,
                        "non-critical step failed"
                    );
                }
            }
        }

        match failure {
            Some(reason) => {
                self.wf.phases[index].state = PhaseState::Failed;
                self.persist().await?;
                Ok(PhaseOutcome::Failed(reason))
            }
            None => {
                self.wf.phases[index].state = PhaseState::Succeeded;
                self.persist().await?;
                Ok(PhaseOutcome::Succeeded)
            }
        }
    }

    // ── Steps ───────────────────────────────────────────────────────────

    async fn run_step(
        &mut self,
        phase_index: usize,
        step_index: usize,
    ) -> Result<StepResult, Interrupt> {
        let step = &self.wf.phases[phase_index].steps[step_index];
        if step.kind == StepKind::Wait {
            let duration_ms = step
                .params
                .get("duration_ms")
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(0);
            self.wait_clock(duration_ms).await?;
            return Ok(StepResult::Passed);
        }

        let operation = step_operation(step);
        let params = step.params.clone();
        let phase = &self.wf.phases[phase_index];
        let serial_delay = phase.serial_delay;
        let gate_timeout_ms = phase.gate.timeout.as_millis() as u64;

        let now = self.inner.clock.epoch_ms();
        let step_deadline_ms = (now + gate_timeout_ms).min(self.wf.deadline_ms.max(now + 1));

        // Servers without a persisted entry still need dispatch; entries
        // carried over from a crashed engine wait for replayed status, and
        // servers already terminal in the persisted step map stay closed.
        let existing: HashSet<AgentId> = self
            .pending
            .values()
            .filter(|p| p.phase_index == phase_index && p.step_index == step_index)
            .map(|p| p.agent_id)
            .collect();
        let step_states = &self.wf.phases[phase_index].steps[step_index].servers;
        let mut to_issue: VecDeque<AgentId> = phase
            .target_servers
            .iter()
            .copied()
            .filter(|a| !existing.contains(a))
            .filter(|a| {
                step_states
                    .get(&a.to_string())
                    .map(|s| !s.is_terminal())
                    .unwrap_or(true)
            })
            .collect();
        let mut to_publish: VecDeque<CommandId> = VecDeque::new();

        let resume_reissue_at_ms = if existing.is_empty() {
            u64::MAX
        } else {
            now + self.inner.config.resume_window().as_millis() as u64
        };
        let mut reissued = false;
        let mut next_dispatch_at_ms = 0u64;
        let mut publish_retry_at_ms = 0u64;
        let mut paused = false;
        let tick = self.inner.config.tick_interval();
        let drain = self.inner.drain.clone();

        loop {
            self.maintain_lease().await?;
            let now = self.inner.clock.epoch_ms();

            if !paused {
                // Dispatch while capacity allows; waiting consumes
                // wall-clock toward the deadline, work is never dropped.
                while let Some(agent) = to_issue.front().copied() {
                    if now < next_dispatch_at_ms {
                        break;
                    }
                    if serial_delay.is_some() && self.step_has_inflight(phase_index, step_index) {
                        break;
                    }
                    let Ok(workflow_permit) = Arc::clone(&self.wf_slots).try_acquire_owned()
                    else {
                        break;
                    };
                    let Ok(global_permit) =
                        Arc::clone(&self.inner.global_slots).try_acquire_owned()
                    else {
                        break;
                    };
                    to_issue.pop_front();

                    if let Some(health) = &self.inner.health {
                        if !health.is_healthy(&agent) {
                            self.mark_unreachable(phase_index, step_index, agent).await?;
                            continue;
                        }
                    }

                    let command_id = self.issue(phase_index, step_index, agent).await?;
                    self.permits.insert(
                        command_id,
                        Permits { _workflow: workflow_permit, _global: global_permit },
                    );
                    to_publish.push_back(command_id);
                }

                while let Some(command_id) = to_publish.front().copied() {
                    if now < publish_retry_at_ms {
                        break;
                    }
                    match self
                        .publish_command(command_id, operation, &params, step_deadline_ms)
                        .await
                    {
                        Ok(()) => {
                            to_publish.pop_front();
                        }
                        Err(e) => {
                            publish_retry_at_ms =
                                now + self.inner.config.publish_retry_s * 1_000;
                            tracing::warn!(
                                workflow = %self.wf.id,
                                error = %e,
                                "publish failed, backing off"
                            );
                            break;
                        }
                    }
                }
            }

            if to_issue.is_empty()
                && to_publish.is_empty()
                && self.step_converged(phase_index, step_index)
            {
                break;
            }

            if now >= step_deadline_ms {
                self.timeout_step(phase_index, step_index, &mut to_issue, &mut to_publish)
                    .await?;
                break;
            }

            if !reissued && now >= resume_reissue_at_ms && to_publish.is_empty() {
                self.reissue_unanswered(phase_index, step_index, &mut to_publish).await?;
                reissued = true;
            }

            let wake = tokio::select! {
                _ = drain.cancelled() => Wake::Drained,
                update = self.status_rx.recv() => update.map(Wake::Status).unwrap_or(Wake::Tick),
                control = self.control_rx.recv() => control.map(Wake::Control).unwrap_or(Wake::Tick),
                _ = tokio::time::sleep(tick) => Wake::Tick,
            };
            match wake {
                Wake::Drained => return Err(Interrupt::Drained),
                Wake::Status(update) => {
                    let went_terminal = self.apply_status(update).await?;
                    if went_terminal {
                        if let Some(delay) = serial_delay {
                            next_dispatch_at_ms =
                                self.inner.clock.epoch_ms() + delay.as_millis() as u64;
                        }
                    }
                }
                Wake::Control(Control::Cancel) => {
                    if self.cancel().await? {
                        return Err(Interrupt::Canceled);
                    }
                }
                Wake::Control(Control::Pause) => {
                    if !paused && self.wf.state == WorkflowState::Running {
                        paused = true;
                        self.transition(WorkflowState::Paused).await?;
                    }
                }
                Wake::Control(Control::Resume) => {
                    if paused {
                        paused = false;
                        self.transition(WorkflowState::Running).await?;
                    }
                }
                Wake::Tick => {}
            }
        }

        let phase = &self.wf.phases[phase_index];
        let step = &phase.steps[step_index];
        match gate::evaluate(phase, step) {
            GateOutcome::Pass => Ok(StepResult::Passed),
            GateOutcome::Fail => {
                let states: Vec<&ServerStepState> = step.servers.values().collect();
                let all_missing_timed_out = states
                    .iter()
                    .filter(|s| !s.is_success())
                    .all(|s| **s == ServerStepState::TimedOut);
                let failed_servers: Vec<String> = step
                    .servers
                    .iter()
                    .filter(|(_, s)| s.is_terminal() && !s.is_success())
                    .map(|(a, _)| a.clone())
                    .collect();
                let reason = if all_missing_timed_out {
                    WorkflowError::timeout(format!(
                        "step {} timed out on {} servers",
                        step.name,
                        failed_servers.len()
                    ))
                } else {
                    WorkflowError::gate(format!(
                        "step {} reached {:.0}% success, required {:.0}%",
                        step.name,
                        step.success_ratio() * 100.0,
                        gate::required_ratio(phase) * 100.0
                    ))
                };
                self.inner
                    .alerts
                    .raise(
                        Alert::new(
                            AlertSeverity::Warning,
                            AlertCategory::Deployment,
                            "health gate breached",
                            reason.to_string(),
                        )
                        .servers(failed_servers)
                        .service(self.wf.service_name.clone()),
                    )
                    .await;
                Ok(StepResult::Failed(reason))
            }
        }
    }

    // ── Dispatch ────────────────────────────────────────────────────────

    /// Record the pending entry (intent) before any publish.
    async fn issue(
        &mut self,
        phase_index: usize,
        step_index: usize,
        agent: AgentId,
    ) -> Result<CommandId, Interrupt> {
        let phase = &self.wf.phases[phase_index];
        let step = &phase.steps[step_index];
        let command_id =
            CommandId::derive(self.wf.id, phase.id, step.id, agent, self.wf.attempt);
        let entry = PendingCommand {
            command_id,
            agent_id: agent,
            phase_index,
            step_index,
            state: ServerStepState::Issued,
            issued_at_ms: self.inner.clock.epoch_ms(),
            attempt: self.wf.attempt,
        };
        self.pending.insert(command_id, entry.clone());
        self.wf.phases[phase_index].steps[step_index]
            .servers
            .insert(agent.to_string(), ServerStepState::Issued);

        self.inner
            .store
            .set(&keys::pending(self.wf.id, command_id), &entry, None)
            .await?;
        self.persist().await?;
        Ok(command_id)
    }

    async fn publish_command(
        &self,
        command_id: CommandId,
        operation: Operation,
        params: &HashMap<String, String>,
        deadline_ms: u64,
    ) -> Result<(), EngineError> {
        let Some(entry) = self.pending.get(&command_id) else {
            return Ok(());
        };
        let phase = &self.wf.phases[entry.phase_index];
        let step = &phase.steps[entry.step_index];
        let command = DeploymentCommand {
            command_id,
            workflow_id: self.wf.id,
            phase_id: phase.id,
            step_id: step.id,
            agent_id: entry.agent_id,
            service_name: self.wf.service_name.clone(),
            version: self.wf.target_version.clone(),
            strategy: self.wf.strategy,
            operation,
            priority: self.wf.priority,
            package: (operation == Operation::Deploy).then(|| self.wf.package.clone()),
            params: params.clone(),
            issued_at_ms: entry.issued_at_ms,
            deadline_ms,
            correlation_id: self.wf.id.to_string(),
        };
        let payload = serde_json::to_vec(&command)
            .map_err(|e| EngineError::Internal(e.to_string()))?;
        let props = MessageProps::default()
            .priority(self.wf.priority)
            .correlation_id(self.wf.id.as_str())
            .message_id(command_id.as_str());
        self.inner.fabric.publish(&command.routing_key(), payload, props).await?;
        Ok(())
    }

    /// A target the registry reports unhealthy fails immediately and
    /// counts against the gate.
    async fn mark_unreachable(
        &mut self,
        phase_index: usize,
        step_index: usize,
        agent: AgentId,
    ) -> Result<(), Interrupt> {
        tracing::warn!(workflow = %self.wf.id, %agent, "target unhealthy, not dispatching");
        self.wf.phases[phase_index].steps[step_index]
            .servers
            .insert(agent.to_string(), ServerStepState::Rejected);
        self.wf.metrics.record_failure(&agent);
        self.persist().await?;
        Ok(())
    }

    /// Apply a status update. Returns whether the entry reached terminal
    /// state. Re-delivery for an already-terminal command is a no-op.
    async fn apply_status(&mut self, update: StatusUpdate) -> Result<bool, Interrupt> {
        let Some(entry) = self.pending.get(&update.command_id) else {
            tracing::debug!(command = %update.command_id, "status for unknown command");
            return Ok(false);
        };
        if entry.state.is_terminal() {
            return Ok(false);
        }

        let next = match &update.phase {
            StatusPhase::Accepted => ServerStepState::Accepted,
            StatusPhase::Running | StatusPhase::Progress(_) => ServerStepState::Running,
            StatusPhase::Succeeded => ServerStepState::Succeeded,
            StatusPhase::Failed(_) => ServerStepState::Failed,
            StatusPhase::Rejected(_) => ServerStepState::Rejected,
        };
        let (phase_index, step_index, agent) =
            (entry.phase_index, entry.step_index, entry.agent_id);

        if let Some(entry) = self.pending.get_mut(&update.command_id) {
            entry.state = next.clone();
        }
        if let Some(step) = self
            .wf
            .phases
            .get_mut(phase_index)
            .and_then(|p| p.steps.get_mut(step_index))
        {
            step.servers.insert(agent.to_string(), next.clone());
        }

        let terminal = next.is_terminal();
        if terminal {
            self.permits.remove(&update.command_id);
            if next.is_success() {
                self.wf.metrics.record_success(&agent);
            } else {
                self.wf.metrics.record_failure(&agent);
            }
            // Terminal states close the entry.
            self.inner
                .store
                .delete(&keys::pending(self.wf.id, update.command_id))
                .await?;
        } else if let Some(entry) = self.pending.get(&update.command_id) {
            self.inner
                .store
                .set(&keys::pending(self.wf.id, update.command_id), entry, None)
                .await?;
        }
        self.persist().await?;
        Ok(terminal)
    }

    /// Reissue commands that never got a response after a resume, under a
    /// fresh attempt so the ids differ and agent-side dedup cannot
    /// swallow them.
    async fn reissue_unanswered(
        &mut self,
        phase_index: usize,
        step_index: usize,
        to_publish: &mut VecDeque<CommandId>,
    ) -> Result<(), Interrupt> {
        let stale: Vec<PendingCommand> = self
            .pending
            .values()
            .filter(|p| {
                p.phase_index == phase_index && p.step_index == step_index && !p.is_terminal()
            })
            .cloned()
            .collect();
        if stale.is_empty() {
            return Ok(());
        }

        self.wf.attempt += 1;
        tracing::info!(
            workflow = %self.wf.id,
            attempt = self.wf.attempt,
            count = stale.len(),
            "reissuing unanswered commands"
        );
        for old in stale {
            self.inner
                .store
                .delete(&keys::pending(self.wf.id, old.command_id))
                .await?;
            self.pending.remove(&old.command_id);
            let permits = self.permits.remove(&old.command_id);

            let command_id = self.issue(phase_index, step_index, old.agent_id).await?;
            if let Some(permits) = permits {
                self.permits.insert(command_id, permits);
            }
            to_publish.push_back(command_id);
        }
        Ok(())
    }

    /// Fail every non-terminal entry of the step with Timeout.
    async fn timeout_step(
        &mut self,
        phase_index: usize,
        step_index: usize,
        to_issue: &mut VecDeque<AgentId>,
        to_publish: &mut VecDeque<CommandId>,
    ) -> Result<(), Interrupt> {
        // Targets that never got dispatched count as timed out too.
        for agent in to_issue.drain(..) {
            self.wf.phases[phase_index].steps[step_index]
                .servers
                .insert(agent.to_string(), ServerStepState::TimedOut);
            self.wf.metrics.record_failure(&agent);
        }
        to_publish.clear();

        let stale: Vec<CommandId> = self
            .pending
            .iter()
            .filter(|(_, p)| {
                p.phase_index == phase_index && p.step_index == step_index && !p.is_terminal()
            })
            .map(|(id, _)| *id)
            .collect();
        for command_id in stale {
            if let Some(entry) = self.pending.get_mut(&command_id) {
                entry.state = ServerStepState::TimedOut;
                let agent = entry.agent_id;
                self.wf.phases[phase_index].steps[step_index]
                    .servers
                    .insert(agent.to_string(), ServerStepState::TimedOut);
                self.wf.metrics.record_failure(&agent);
            }
            self.permits.remove(&command_id);
            self.inner.store.delete(&keys::pending(self.wf.id, command_id)).await?;
        }
        self.persist().await?;
        Ok(())
    }

    fn step_has_inflight(&self, phase_index: usize, step_index: usize) -> bool {
        self.pending.values().any(|p| {
            p.phase_index == phase_index && p.step_index == step_index && !p.is_terminal()
        })
    }

    fn step_converged(&self, phase_index: usize, step_index: usize) -> bool {
        let phase = &self.wf.phases[phase_index];
        let step = &phase.steps[step_index];
        step.servers.len() >= phase.target_servers.len()
            && step.servers.values().all(|s| s.is_terminal())
    }

    // ── Rollback, cancel, finalization ─────────────────────────────────

    /// Every server that reached Applied-or-later: a deploy entry that
    /// succeeded.
    fn applied_servers(&self) -> Vec<AgentId> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for phase in &self.wf.phases {
            for step in &phase.steps {
                let deploys = step
                    .params
                    .get("operation")
                    .map(|op| op == "deploy")
                    .unwrap_or(false);
                if !deploys {
                    continue;
                }
                for (agent, state) in &step.servers {
                    if state.is_success() && seen.insert(agent.clone()) {
                        if let Ok(agent) = AgentId::parse(agent) {
                            out.push(agent);
                        }
                    }
                }
            }
        }
        out
    }

    /// Rollback runs exactly once per workflow: an inverse parallel wave
    /// of Rollback commands to every applied server, with its own gate.
    async fn run_rollback(&mut self, reason: WorkflowError) -> Result<(), Interrupt> {
        self.wf.rollback_started = true;
        self.wf.last_error = Some(reason.clone());
        self.transition(WorkflowState::RollingBack).await?;

        let targets = self.applied_servers();
        self.inner
            .alerts
            .raise(
                Alert::new(
                    AlertSeverity::Critical,
                    AlertCategory::Deployment,
                    "deployment rolling back",
                    reason.to_string(),
                )
                .servers(targets.iter().map(|a| a.to_string()).collect())
                .service(self.wf.service_name.clone()),
            )
            .await;

        if targets.is_empty() {
            self.transition(WorkflowState::RolledBack).await?;
            return Ok(());
        }

        let gate = HealthGate {
            timeout: Duration::from_secs(self.inner.config.default_health_check_timeout_s),
            success_ratio: 1.0,
        };
        let step = Step::new("rollback", StepKind::Command)
            .critical()
            .param("operation", "rollback")
            .param("target_version", self.wf.target_version.clone());
        let phase = Phase::new("rollback", PhaseKind::Wave)
            .target_servers(targets)
            .steps(vec![step])
            .rollback_on_failure(false)
            .gate(gate)
            .max_parallelism(self.inner.config.max_parallelism_default);
        self.wf.phases.push(phase);
        self.wf.current_phase = self.wf.phases.len() - 1;
        self.persist().await?;

        let index = self.wf.current_phase;
        match self.run_phase(index).await? {
            PhaseOutcome::Succeeded => {
                self.transition(WorkflowState::RolledBack).await?;
                self.inner
                    .alerts
                    .raise(
                        Alert::new(
                            AlertSeverity::Critical,
                            AlertCategory::Deployment,
                            "deployment rolled back",
                            format!(
                                "{} {} rolled back: {}",
                                self.wf.service_name, self.wf.target_version, reason
                            ),
                        )
                        .service(self.wf.service_name.clone()),
                    )
                    .await;
                Ok(())
            }
            PhaseOutcome::Failed(rollback_error) => {
                // A failed rollback must not cascade into another one.
                self.wf.last_error = Some(rollback_error.clone());
                self.fail(rollback_error).await
            }
        }
    }

    /// Cancel: no new commands; best-effort Stop for servers still
    /// running; terminal Canceled. Returns false when ignored because a
    /// rollback is in flight (rollback always runs to completion).
    async fn cancel(&mut self) -> Result<bool, Interrupt> {
        if self.wf.state == WorkflowState::RollingBack {
            tracing::warn!(workflow = %self.wf.id, "cancel ignored during rollback");
            return Ok(false);
        }
        let running: Vec<PendingCommand> = self
            .pending
            .values()
            .filter(|p| {
                matches!(p.state, ServerStepState::Running | ServerStepState::Accepted)
            })
            .cloned()
            .collect();
        for entry in running {
            let phase = &self.wf.phases[entry.phase_index];
            let step = &phase.steps[entry.step_index];
            let stop_id =
                CommandId::derive(self.wf.id, phase.id, step.id, entry.agent_id, u32::MAX);
            let command = DeploymentCommand {
                command_id: stop_id,
                workflow_id: self.wf.id,
                phase_id: phase.id,
                step_id: step.id,
                agent_id: entry.agent_id,
                service_name: self.wf.service_name.clone(),
                version: self.wf.target_version.clone(),
                strategy: self.wf.strategy,
                operation: Operation::Stop,
                priority: self.wf.priority,
                package: None,
                params: HashMap::new(),
                issued_at_ms: self.inner.clock.epoch_ms(),
                deadline_ms: self.inner.clock.epoch_ms() + 60_000,
                correlation_id: self.wf.id.to_string(),
            };
            if let Ok(payload) = serde_json::to_vec(&command) {
                if let Err(e) = self
                    .inner
                    .fabric
                    .publish(&command.routing_key(), payload, MessageProps::default())
                    .await
                {
                    tracing::debug!(error = %e, "best-effort stop failed");
                }
            }
        }

        self.wf.last_error =
            Some(WorkflowError::canceled("canceled by operator request"));
        self.permits.clear();
        self.inner
            .store
            .delete_by_pattern(&keys::pending_pattern(self.wf.id))
            .await?;
        self.transition(WorkflowState::Canceled).await?;
        Ok(true)
    }

    async fn fail(&mut self, reason: WorkflowError) -> Result<(), Interrupt> {
        self.wf.last_error = Some(reason.clone());
        self.transition(WorkflowState::Failed).await?;
        self.inner
            .alerts
            .raise(
                Alert::new(
                    AlertSeverity::Critical,
                    AlertCategory::Deployment,
                    "deployment failed",
                    reason.to_string(),
                )
                .service(self.wf.service_name.clone()),
            )
            .await;
        Ok(())
    }

    async fn finalize_success(&mut self) -> Result<(), Interrupt> {
        self.transition(WorkflowState::Succeeded).await?;
        let success = Alert::new(
            AlertSeverity::Info,
            AlertCategory::Deployment,
            "deployment succeeded",
            format!("{} {} deployed", self.wf.service_name, self.wf.target_version),
        )
        .service(self.wf.service_name.clone());
        // Clears any earlier failure condition for this service.
        self.inner
            .alerts
            .resolve(
                &Alert::new(
                    AlertSeverity::Critical,
                    AlertCategory::Deployment,
                    "deployment failed",
                    String::new(),
                )
                .service(self.wf.service_name.clone()),
            )
            .await;
        self.inner.alerts.raise(success).await;
        Ok(())
    }

    // ── Waiting ─────────────────────────────────────────────────────────

    async fn wait_for_resume(&mut self) -> Result<(), Interrupt> {
        let tick = self.inner.config.tick_interval();
        let drain = self.inner.drain.clone();
        loop {
            self.maintain_lease().await?;
            let wake = tokio::select! {
                _ = drain.cancelled() => Wake::Drained,
                update = self.status_rx.recv() => update.map(Wake::Status).unwrap_or(Wake::Tick),
                control = self.control_rx.recv() => control.map(Wake::Control).unwrap_or(Wake::Tick),
                _ = tokio::time::sleep(tick) => Wake::Tick,
            };
            match wake {
                Wake::Drained => return Err(Interrupt::Drained),
                Wake::Status(update) => {
                    self.apply_status(update).await?;
                }
                Wake::Control(Control::Resume) => {
                    self.transition(WorkflowState::Running).await?;
                    return Ok(());
                }
                Wake::Control(Control::Cancel) => {
                    if self.cancel().await? {
                        return Err(Interrupt::Canceled);
                    }
                }
                Wake::Control(Control::Pause) | Wake::Tick => {}
            }
        }
    }

    /// Sleep `duration_ms` of clock time, staying responsive to control
    /// signals and status replay.
    async fn wait_clock(&mut self, duration_ms: u64) -> Result<(), Interrupt> {
        let until = self.inner.clock.epoch_ms() + duration_ms;
        let tick = self.inner.config.tick_interval();
        let drain = self.inner.drain.clone();
        while self.inner.clock.epoch_ms() < until {
            self.maintain_lease().await?;
            let wake = tokio::select! {
                _ = drain.cancelled() => Wake::Drained,
                update = self.status_rx.recv() => update.map(Wake::Status).unwrap_or(Wake::Tick),
                control = self.control_rx.recv() => control.map(Wake::Control).unwrap_or(Wake::Tick),
                _ = tokio::time::sleep(tick) => Wake::Tick,
            };
            match wake {
                Wake::Drained => return Err(Interrupt::Drained),
                Wake::Status(update) => {
                    self.apply_status(update).await?;
                }
                Wake::Control(Control::Cancel) => {
                    if self.cancel().await? {
                        return Err(Interrupt::Canceled);
                    }
                }
                Wake::Control(Control::Pause) => {
                    if self.wf.state == WorkflowState::Running {
                        self.transition(WorkflowState::Paused).await?;
                        self.wait_for_resume().await?;
                    }
                }
                Wake::Control(Control::Resume) | Wake::Tick => {}
            }
        }
        Ok(())
    }

    // ── Plumbing ────────────────────────────────────────────────────────

    async fn maintain_lease(&mut self) -> Result<(), Interrupt> {
        let now = self.inner.clock.epoch_ms();
        if now < self.next_lease_renew_ms {
            return Ok(());
        }
        self.next_lease_renew_ms = now + self.inner.config.lease_renew().as_millis() as u64;
        let renewed = self
            .inner
            .store
            .renew_lease(
                &keys::lease(self.wf.id),
                &self.inner.engine_id,
                self.inner.config.lease_ttl(),
            )
            .await?;
        if !renewed {
            self.lease_lost = true;
            return Err(Interrupt::LeaseLost);
        }
        Ok(())
    }

    async fn load_pending(&mut self) -> Result<(), Interrupt> {
        let keys_found = self
            .inner
            .store
            .keys(&keys::pending_pattern(self.wf.id))
            .await?;
        for key in keys_found {
            if let Some(entry) = self.inner.store.get::<PendingCommand>(&key).await? {
                self.pending.insert(entry.command_id, entry);
            }
        }
        tracing::info!(
            workflow = %self.wf.id,
            pending = self.pending.len(),
            "loaded persisted command entries"
        );
        Ok(())
    }

    async fn persist(&self) -> Result<(), Interrupt> {
        self.inner.save_workflow(&self.wf).await?;
        Ok(())
    }

    async fn transition(&mut self, next: WorkflowState) -> Result<(), Interrupt> {
        self.inner.transition(&mut self.wf, next).await?;
        Ok(())
    }
}

/// The wire operation for a step, from its kind and parameters.
fn step_operation(step: &Step) -> Operation {
    match step.kind {
        StepKind::Command => step
            .params
            .get("operation")
            .and_then(|raw| Operation::parse(raw))
            .unwrap_or(Operation::Deploy),
        StepKind::Script => Operation::Script,
        StepKind::Validation | StepKind::HealthCheck | StepKind::Wait => Operation::HealthCheck,
    }
}

#[cfg(test)]
#[path = "driver_tests/mod.rs"]
mod tests;
