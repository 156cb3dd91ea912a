// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Immutable fleet snapshot handed to readers.

use convoy_core::{AgentId, AgentInfo, AgentStatus, ServiceRecord};
use std::collections::HashMap;
use std::sync::Arc;

/// One agent plus its discovered services.
#[derive(Debug, Clone)]
pub struct AgentEntry {
    pub info: AgentInfo,
    /// Keyed by service name; `(agent_id, name)` is unique fleet-wide.
    pub services: HashMap<String, ServiceRecord>,
}

/// Filter for [`FleetSnapshot::list`].
#[derive(Debug, Clone, Default)]
pub struct FleetFilter {
    pub status: Option<AgentStatus>,
    pub environment: Option<String>,
    pub hostname_prefix: Option<String>,
}

impl FleetFilter {
    pub fn status(mut self, status: AgentStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    pub fn hostname_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.hostname_prefix = Some(prefix.into());
        self
    }

    fn matches(&self, entry: &AgentEntry) -> bool {
        if let Some(status) = self.status {
            if entry.info.status != status {
                return false;
            }
        }
        if let Some(ref environment) = self.environment {
            if entry.info.environment != *environment {
                return false;
            }
        }
        if let Some(ref prefix) = self.hostname_prefix {
            if !entry.info.hostname.starts_with(prefix.as_str()) {
                return false;
            }
        }
        true
    }
}

/// Copy-on-write view of the fleet. Cheap to clone; never mutated.
#[derive(Debug, Default, Clone)]
pub struct FleetSnapshot {
    pub(crate) agents: Arc<HashMap<AgentId, AgentEntry>>,
    pub(crate) by_hostname: Arc<HashMap<String, AgentId>>,
}

impl FleetSnapshot {
    pub fn get(&self, agent_id: &AgentId) -> Option<&AgentEntry> {
        self.agents.get(agent_id)
    }

    pub fn get_by_hostname(&self, hostname: &str) -> Option<&AgentEntry> {
        self.by_hostname.get(hostname).and_then(|id| self.agents.get(id))
    }

    pub fn list(&self, filter: &FleetFilter) -> Vec<&AgentEntry> {
        let mut entries: Vec<&AgentEntry> =
            self.agents.values().filter(|e| filter.matches(e)).collect();
        entries.sort_by(|a, b| a.info.hostname.cmp(&b.info.hostname));
        entries
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}
