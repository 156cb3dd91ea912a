// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transport error type

use convoy_core::AgentId;
use thiserror::Error;

/// Errors from transport operations.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("agent not registered: {0}")]
    NotRegistered(AgentId),

    #[error("agent not connected: {0}")]
    NotConnected(AgentId),

    #[error("unauthorized")]
    Unauthorized,

    #[error("protocol error: {0}")]
    Protocol(#[from] convoy_wire::ProtocolError),

    #[error("operation timed out")]
    Timeout,

    #[error("package error: {0}")]
    Package(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}
