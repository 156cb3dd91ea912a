// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fleet and workflow lifecycle events.

use crate::agent::AgentId;
use crate::workflow::{WorkflowId, WorkflowState};
use serde::{Deserialize, Serialize};

/// Events emitted by the fleet registry as agent liveness changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FleetEvent {
    AgentConnected {
        agent_id: AgentId,
        hostname: String,
    },
    AgentDisconnected {
        agent_id: AgentId,
        hostname: String,
        /// Epoch ms of the last heartbeat seen before the timeout.
        last_heartbeat_ms: u64,
    },
    ServiceStateChanged {
        agent_id: AgentId,
        service: String,
        from: crate::agent::ServiceStatus,
        to: crate::agent::ServiceStatus,
    },
}

impl FleetEvent {
    /// One-line summary for structured logging.
    pub fn log_summary(&self) -> String {
        match self {
            FleetEvent::AgentConnected { agent_id, hostname } => {
                format!("agent_connected {} ({})", hostname, agent_id)
            }
            FleetEvent::AgentDisconnected { agent_id, hostname, .. } => {
                format!("agent_disconnected {} ({})", hostname, agent_id)
            }
            FleetEvent::ServiceStateChanged { agent_id, service, from, to } => {
                format!("service_state {}@{} {} -> {}", service, agent_id, from, to)
            }
        }
    }
}

/// A workflow state transition, published on `workflow.lifecycle`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowTransition {
    pub workflow_id: WorkflowId,
    pub from: WorkflowState,
    pub to: WorkflowState,
    pub at_ms: u64,
}

impl WorkflowTransition {
    pub const ROUTING_KEY: &'static str = "workflow.lifecycle";
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
