// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Frames sent by the coordinator to agents.

use crate::types::{
    HeartbeatResponse, MetricsSummary, RegistrationResponse, RollbackRequest, ServiceCommand,
    ServiceDiscoveryResponse,
};
use convoy_core::AgentSettings;
use serde::{Deserialize, Serialize};

/// Coordinator → agent frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CoordinatorFrame {
    /// Handshake accepted; carries the intervals the agent should use.
    HelloOk { settings: AgentSettings },
    Registered(RegistrationResponse),
    HeartbeatAck(HeartbeatResponse),
    ServicesAck(ServiceDiscoveryResponse),
    MetricsAck(MetricsSummary),
    /// Push a synchronous admin command.
    Command(ServiceCommand),
    /// One chunk of a deployment package streamed down to the agent.
    /// The agent assembles the chunks, checks the final SHA-256 against
    /// `sha256`, applies, and streams progress back.
    DeployChunk {
        service_name: String,
        version: String,
        offset: u64,
        total_size: u64,
        /// Base64-encoded chunk bytes.
        bytes: String,
        /// Hex SHA-256 of the complete package.
        sha256: String,
    },
    /// Abort an in-flight deployment stream.
    DeployAbort { service_name: String, reason: String },
    /// Ask the agent to roll a service back.
    Rollback(RollbackRequest),
    /// Typed failure; the connection is closed after a fatal one.
    Error { code: ErrorCode, message: String },
}

/// Typed error codes surfaced to agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Unauthorized,
    NotRegistered,
    Malformed,
    Unsupported,
    Internal,
}

convoy_core::simple_display! {
    ErrorCode {
        Unauthorized => "unauthorized",
        NotRegistered => "not_registered",
        Malformed => "malformed",
        Unsupported => "unsupported",
        Internal => "internal",
    }
}

impl CoordinatorFrame {
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        CoordinatorFrame::Error { code, message: message.into() }
    }
}

#[cfg(test)]
#[path = "response_tests.rs"]
mod tests;
