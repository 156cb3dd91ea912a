// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared transport state and the coordinator-initiated operations:
//! command push, rollback, deployment streaming.

use crate::config::TransportConfig;
use crate::error::TransportError;
use convoy_core::{AgentId, Clock, CommandId};
use convoy_fabric::FabricPublisher;
use convoy_registry::FleetRegistry;
use convoy_wire::{
    CommandResult, CoordinatorFrame, DeploymentProgress, RollbackRequest, RollbackResult,
    ServiceCommand,
};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

pub(crate) struct TransportInner<C: Clock> {
    pub(crate) registry: Arc<FleetRegistry<C>>,
    pub(crate) fabric: Arc<dyn FabricPublisher>,
    pub(crate) clock: C,
    pub(crate) config: TransportConfig,
    /// Outbound frame channel per connected agent.
    pub(crate) sessions: Mutex<HashMap<AgentId, mpsc::Sender<CoordinatorFrame>>>,
    /// Commands queued for heartbeat piggyback (brokerless fallback).
    pub(crate) piggyback: Mutex<HashMap<AgentId, VecDeque<ServiceCommand>>>,
    pub(crate) command_waiters: Mutex<HashMap<CommandId, oneshot::Sender<CommandResult>>>,
    pub(crate) rollback_waiters: Mutex<HashMap<AgentId, oneshot::Sender<RollbackResult>>>,
    /// Progress routes for in-flight deployment streams.
    pub(crate) deploy_waiters:
        Mutex<HashMap<(AgentId, String), mpsc::Sender<DeploymentProgress>>>,
}

/// Coordinator-side agent transport. Cheap to clone.
pub struct Transport<C: Clock> {
    pub(crate) inner: Arc<TransportInner<C>>,
}

impl<C: Clock> Clone for Transport<C> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<C: Clock + 'static> Transport<C> {
    pub fn new(
        registry: Arc<FleetRegistry<C>>,
        fabric: Arc<dyn FabricPublisher>,
        clock: C,
        config: TransportConfig,
    ) -> Self {
        Self {
            inner: Arc::new(TransportInner {
                registry,
                fabric,
                clock,
                config,
                sessions: Mutex::new(HashMap::new()),
                piggyback: Mutex::new(HashMap::new()),
                command_waiters: Mutex::new(HashMap::new()),
                rollback_waiters: Mutex::new(HashMap::new()),
                deploy_waiters: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Agents with a live session.
    pub fn connected_agents(&self) -> Vec<AgentId> {
        self.inner.sessions.lock().keys().copied().collect()
    }

    fn session(&self, agent: &AgentId) -> Result<mpsc::Sender<CoordinatorFrame>, TransportError> {
        self.inner
            .sessions
            .lock()
            .get(agent)
            .cloned()
            .ok_or(TransportError::NotConnected(*agent))
    }

    /// Push a service command and wait for its result. A deadline breach
    /// produces a deterministic failure result, never a hang.
    pub async fn execute_command(
        &self,
        agent: AgentId,
        service: &str,
        command: &str,
    ) -> Result<CommandResult, TransportError> {
        if self.inner.registry.get(&agent).is_none() {
            return Err(TransportError::NotRegistered(agent));
        }
        let session = self.session(&agent)?;
        let command_id = CommandId::fresh();
        let (tx, rx) = oneshot::channel();
        self.inner.command_waiters.lock().insert(command_id, tx);

        let frame = CoordinatorFrame::Command(ServiceCommand {
            command_id,
            server_id: agent,
            service_name: service.to_string(),
            command: command.to_string(),
            issued_at_ms: self.inner.clock.epoch_ms(),
        });
        if session.send(frame).await.is_err() {
            self.inner.command_waiters.lock().remove(&command_id);
            return Err(TransportError::NotConnected(agent));
        }

        match tokio::time::timeout(self.inner.config.command_timeout(), rx).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(_)) => Err(TransportError::NotConnected(agent)),
            Err(_) => {
                self.inner.command_waiters.lock().remove(&command_id);
                Ok(CommandResult {
                    command_id,
                    success: false,
                    message: "command timed out".to_string(),
                    exit_code: -1,
                    executed_at_ms: self.inner.clock.epoch_ms(),
                })
            }
        }
    }

    /// Queue a command for the agent's next heartbeat. Used when the
    /// broker path is unavailable; overflow stays queued.
    pub fn queue_command(&self, agent: AgentId, service: &str, command: &str) -> CommandId {
        let command_id = CommandId::fresh();
        self.inner
            .piggyback
            .lock()
            .entry(agent)
            .or_default()
            .push_back(ServiceCommand {
                command_id,
                server_id: agent,
                service_name: service.to_string(),
                command: command.to_string(),
                issued_at_ms: self.inner.clock.epoch_ms(),
            });
        command_id
    }

    /// Ask the agent to roll a service back to `target_version`.
    pub async fn rollback_service(
        &self,
        agent: AgentId,
        service: &str,
        target_version: &str,
    ) -> Result<RollbackResult, TransportError> {
        if self.inner.registry.get(&agent).is_none() {
            return Err(TransportError::NotRegistered(agent));
        }
        let session = self.session(&agent)?;
        let (tx, rx) = oneshot::channel();
        self.inner.rollback_waiters.lock().insert(agent, tx);

        let frame = CoordinatorFrame::Rollback(RollbackRequest {
            service_name: service.to_string(),
            target_version: target_version.to_string(),
        });
        if session.send(frame).await.is_err() {
            self.inner.rollback_waiters.lock().remove(&agent);
            return Err(TransportError::NotConnected(agent));
        }

        match tokio::time::timeout(self.inner.config.command_timeout(), rx).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(_)) => Err(TransportError::NotConnected(agent)),
            Err(_) => {
                self.inner.rollback_waiters.lock().remove(&agent);
                Err(TransportError::Timeout)
            }
        }
    }
}

#[cfg(test)]
#[path = "transport_tests.rs"]
mod tests;
