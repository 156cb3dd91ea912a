// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error kinds surfaced to callers and persisted in workflow state.

use serde::{Deserialize, Serialize};

/// Classification of a failure, stable across the wire and the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Broker/state-store/RPC unreachable. Retried with backoff; never
    /// mutates durable state.
    TransportUnavailable,
    /// Unknown agent id. Transient during the post-startup grace period,
    /// fatal for that target thereafter.
    NotRegistered,
    /// Agent refused the command. Per-server terminal failure, counted
    /// against the failure threshold.
    Rejected,
    /// Status wait exceeded the step deadline.
    Timeout,
    /// Bad strategy configuration. Fails the workflow at Planning.
    ValidationFailed,
    /// Health gate below the required ratio.
    GateFailed,
    /// User-initiated cancellation.
    Canceled,
    /// Programming error. Fail fast, no automatic retry.
    Internal,
}

crate::simple_display! {
    ErrorKind {
        TransportUnavailable => "transport_unavailable",
        NotRegistered => "not_registered",
        Rejected => "rejected",
        Timeout => "timeout",
        ValidationFailed => "validation_failed",
        GateFailed => "gate_failed",
        Canceled => "canceled",
        Internal => "internal",
    }
}

/// A failure with its classification and a human message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct WorkflowError {
    pub kind: ErrorKind,
    pub message: String,
}

impl WorkflowError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ValidationFailed, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    pub fn gate(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::GateFailed, message)
    }

    pub fn canceled(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Canceled, message)
    }

    /// Whether local retry with backoff is appropriate.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind, ErrorKind::TransportUnavailable)
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
