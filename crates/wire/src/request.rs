// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Frames sent by agents to the coordinator.

use crate::types::{
    AgentRegistration, CommandResult, DeploymentProgress, HeartbeatRequest, MetricsBatch,
    RollbackResult, ServiceDiscovery,
};
use serde::{Deserialize, Serialize};

/// Agent → coordinator frames.
///
/// `Hello` must be the first frame on every connection; the coordinator
/// validates the bearer token before processing anything else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentRequest {
    Hello {
        token: String,
        protocol_version: u32,
    },
    Register(AgentRegistration),
    Heartbeat(HeartbeatRequest),
    ReportServices(ServiceDiscovery),
    /// One batch of a client-side metrics stream.
    Metrics(MetricsBatch),
    /// Result of a previously pushed [`crate::ServiceCommand`].
    CommandResult(CommandResult),
    /// Progress for a package the coordinator is streaming down.
    DeployProgress {
        service_name: String,
        progress: DeploymentProgress,
    },
    RollbackResult(RollbackResult),
    Bye,
}

impl AgentRequest {
    /// Frame name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            AgentRequest::Hello { .. } => "hello",
            AgentRequest::Register(_) => "register",
            AgentRequest::Heartbeat(_) => "heartbeat",
            AgentRequest::ReportServices(_) => "report_services",
            AgentRequest::Metrics(_) => "metrics",
            AgentRequest::CommandResult(_) => "command_result",
            AgentRequest::DeployProgress { .. } => "deploy_progress",
            AgentRequest::RollbackResult(_) => "rollback_result",
            AgentRequest::Bye => "bye",
        }
    }
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
