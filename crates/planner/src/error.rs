// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Planner error type

use thiserror::Error;

/// Planning failures. `Invalid` carries every violation found so a caller
/// can surface them all at once.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),

    #[error("no target servers")]
    NoTargets,
}

impl PlanError {
    /// Convert to the workflow-level error value persisted in state.
    pub fn to_workflow_error(&self) -> convoy_core::WorkflowError {
        convoy_core::WorkflowError::validation(self.to_string())
    }
}
