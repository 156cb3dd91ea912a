// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fleet registry: writers serialize, readers get lock-free snapshots.

use crate::snapshot::{AgentEntry, FleetFilter, FleetSnapshot};
use arc_swap::ArcSwap;
use convoy_core::{
    AgentId, AgentInfo, AgentStatus, Clock, FleetEvent, ServiceRecord,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

/// Registry behavior settings.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Heartbeats older than this mark the agent Disconnected.
    pub heartbeat_timeout: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self { heartbeat_timeout: Duration::from_secs(90) }
    }
}

/// Errors from registry lookups.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("agent not registered: {0}")]
    NotRegistered(AgentId),
}

/// The coordinator's authoritative in-process view of the fleet.
pub struct FleetRegistry<C: Clock> {
    clock: C,
    config: RegistryConfig,
    /// Serializes all mutations; readers never take it.
    write: Mutex<()>,
    snapshot: ArcSwap<FleetSnapshot>,
    events: mpsc::Sender<FleetEvent>,
}

impl<C: Clock> FleetRegistry<C> {
    pub fn new(clock: C, config: RegistryConfig, events: mpsc::Sender<FleetEvent>) -> Self {
        Self {
            clock,
            config,
            write: Mutex::new(()),
            snapshot: ArcSwap::from_pointee(FleetSnapshot::default()),
            events,
        }
    }

    /// Current snapshot; cheap, lock-free, may be slightly stale for
    /// concurrent writers.
    pub fn snapshot(&self) -> FleetSnapshot {
        self.snapshot.load().as_ref().clone()
    }

    pub fn get(&self, agent_id: &AgentId) -> Option<AgentEntry> {
        self.snapshot.load().get(agent_id).cloned()
    }

    pub fn list(&self, filter: &FleetFilter) -> Vec<AgentEntry> {
        self.snapshot.load().list(filter).into_iter().cloned().collect()
    }

    /// Connected and heartbeating within the timeout.
    pub fn is_healthy(&self, agent_id: &AgentId) -> bool {
        let snapshot = self.snapshot.load();
        let Some(entry) = snapshot.get(agent_id) else {
            return false;
        };
        entry.info.status == AgentStatus::Connected
            && self.heartbeat_fresh(entry.info.last_heartbeat_ms)
    }

    fn heartbeat_fresh(&self, last_heartbeat_ms: u64) -> bool {
        let now = self.clock.epoch_ms();
        now.saturating_sub(last_heartbeat_ms) <= self.config.heartbeat_timeout.as_millis() as u64
    }

    /// Register or refresh an agent. Hostname → id is injective: a known
    /// hostname keeps its existing id and only refreshes metadata.
    pub fn upsert(&self, mut info: AgentInfo) -> AgentId {
        let _guard = self.write.lock();
        let current = self.snapshot.load_full();
        let mut agents = (*current.agents).clone();
        let mut by_hostname = (*current.by_hostname).clone();

        let agent_id = match by_hostname.get(&info.hostname) {
            Some(existing) => *existing,
            None => info.id,
        };
        info.id = agent_id;

        let services = agents.get(&agent_id).map(|e| e.services.clone()).unwrap_or_default();
        by_hostname.insert(info.hostname.clone(), agent_id);
        agents.insert(agent_id, AgentEntry { info, services });

        self.publish(FleetSnapshot {
            agents: Arc::new(agents),
            by_hostname: Arc::new(by_hostname),
        });
        agent_id
    }

    /// Record a heartbeat; flips the agent to Connected and emits
    /// `AgentConnected` on the transition.
    pub fn mark_heartbeat(&self, agent_id: &AgentId) -> Result<(), RegistryError> {
        let _guard = self.write.lock();
        let current = self.snapshot.load_full();
        let mut agents = (*current.agents).clone();
        let entry = agents
            .get_mut(agent_id)
            .ok_or(RegistryError::NotRegistered(*agent_id))?;

        let was = entry.info.status;
        entry.info.last_heartbeat_ms = self.clock.epoch_ms();
        entry.info.status = AgentStatus::Connected;
        let hostname = entry.info.hostname.clone();

        self.publish(FleetSnapshot {
            agents: Arc::new(agents),
            by_hostname: Arc::clone(&current.by_hostname),
        });

        if was != AgentStatus::Connected {
            self.emit(FleetEvent::AgentConnected { agent_id: *agent_id, hostname });
        }
        Ok(())
    }

    /// Explicit error status; overrides liveness until the next heartbeat.
    pub fn mark_error(&self, agent_id: &AgentId) -> Result<(), RegistryError> {
        let _guard = self.write.lock();
        let current = self.snapshot.load_full();
        let mut agents = (*current.agents).clone();
        let entry = agents
            .get_mut(agent_id)
            .ok_or(RegistryError::NotRegistered(*agent_id))?;
        entry.info.status = AgentStatus::Error;

        self.publish(FleetSnapshot {
            agents: Arc::new(agents),
            by_hostname: Arc::clone(&current.by_hostname),
        });
        Ok(())
    }

    /// Apply a full service snapshot. Present services are upserted by
    /// `(agent_id, name)`; services absent from two consecutive snapshots
    /// are marked inactive.
    pub fn report_services(
        &self,
        agent_id: &AgentId,
        reported: Vec<ServiceRecord>,
    ) -> Result<(), RegistryError> {
        let _guard = self.write.lock();
        let current = self.snapshot.load_full();
        let mut agents = (*current.agents).clone();
        let entry = agents
            .get_mut(agent_id)
            .ok_or(RegistryError::NotRegistered(*agent_id))?;

        let reported_names: std::collections::HashSet<String> =
            reported.iter().map(|s| s.name.clone()).collect();

        let mut changes = Vec::new();
        for mut service in reported {
            service.missed_reports = 0;
            service.is_active = true;
            if let Some(existing) = entry.services.get(&service.name) {
                if existing.status != service.status {
                    changes.push(FleetEvent::ServiceStateChanged {
                        agent_id: *agent_id,
                        service: service.name.clone(),
                        from: existing.status,
                        to: service.status,
                    });
                }
            }
            entry.services.insert(service.name.clone(), service);
        }

        // Absent services accumulate misses; the second miss deactivates.
        for (name, service) in entry.services.iter_mut() {
            if reported_names.contains(name) {
                continue;
            }
            service.missed_reports = service.missed_reports.saturating_add(1);
            if service.missed_reports >= 2 {
                service.is_active = false;
            }
        }

        self.publish(FleetSnapshot {
            agents: Arc::new(agents),
            by_hostname: Arc::clone(&current.by_hostname),
        });
        for change in changes {
            self.emit(change);
        }
        Ok(())
    }

    /// Recompute heartbeat-derived statuses; emits `AgentDisconnected`
    /// for agents whose heartbeat lapsed since the last sweep.
    pub fn sweep(&self) {
        let _guard = self.write.lock();
        let current = self.snapshot.load_full();
        let mut agents = (*current.agents).clone();
        let mut lapsed = Vec::new();

        for entry in agents.values_mut() {
            if entry.info.status == AgentStatus::Connected
                && !self.heartbeat_fresh(entry.info.last_heartbeat_ms)
            {
                entry.info.status = AgentStatus::Disconnected;
                lapsed.push(FleetEvent::AgentDisconnected {
                    agent_id: entry.info.id,
                    hostname: entry.info.hostname.clone(),
                    last_heartbeat_ms: entry.info.last_heartbeat_ms,
                });
            }
        }

        self.publish(FleetSnapshot {
            agents: Arc::new(agents),
            by_hostname: Arc::clone(&current.by_hostname),
        });
        for event in lapsed {
            self.emit(event);
        }
    }

    fn publish(&self, snapshot: FleetSnapshot) {
        self.snapshot.store(Arc::new(snapshot));
    }

    fn emit(&self, event: FleetEvent) {
        tracing::info!("{}", event.log_summary());
        if let Err(e) = self.events.try_send(event) {
            tracing::warn!(error = %e, "fleet event dropped");
        }
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
