// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fabric error types

use thiserror::Error;

/// Errors from broker operations.
#[derive(Debug, Error)]
pub enum FabricError {
    /// Broker unreachable or connection lost. Callers decide whether to
    /// retry; the engine persists intent before publishing so retries are
    /// safe.
    #[error("broker unavailable: {0}")]
    Unavailable(String),

    /// The broker nacked the message or the confirm deadline lapsed.
    #[error("publish not confirmed: {0}")]
    NotConfirmed(String),

    #[error("batch publish failed")]
    Batch(#[from] BatchError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("broker error: {0}")]
    Protocol(String),
}

impl From<lapin::Error> for FabricError {
    fn from(e: lapin::Error) -> Self {
        match e {
            lapin::Error::IOError(_) | lapin::Error::InvalidConnectionState(_) => {
                FabricError::Unavailable(e.to_string())
            }
            other => FabricError::Protocol(other.to_string()),
        }
    }
}

/// Per-message outcomes of a failed batch publish.
///
/// The batch is atomic at the channel boundary: on failure no message is
/// considered delivered, and the outcomes report which publish broke.
#[derive(Debug, Error)]
#[error("{failed}/{total} messages failed at index {first_failure}")]
pub struct BatchError {
    pub total: usize,
    pub failed: usize,
    pub first_failure: usize,
    /// Outcome per message, in submission order.
    pub outcomes: Vec<Result<(), String>>,
}
