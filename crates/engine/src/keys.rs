// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! State-store key layout.
//!
//! ```text
//! workflow:{id}                     serialized DeploymentWorkflow
//! workflow:{id}:lease               engine instance owning the workflow
//! workflow:{id}:pending:{command}   one PendingCommand per in-flight command
//! ```

use convoy_core::{CommandId, WorkflowId};

pub fn workflow(id: WorkflowId) -> String {
    format!("workflow:{id}")
}

pub fn lease(id: WorkflowId) -> String {
    format!("workflow:{id}:lease")
}

pub fn pending(id: WorkflowId, command: CommandId) -> String {
    format!("workflow:{id}:pending:{command}")
}

pub fn pending_pattern(id: WorkflowId) -> String {
    format!("workflow:{id}:pending:*")
}

/// Matches workflow records only, not leases or pending entries.
pub const WORKFLOW_SCAN: &str = "workflow:*";

/// True for keys produced by [`workflow`] (no suffix segments).
pub fn is_workflow_record(key: &str) -> bool {
    key.strip_prefix("workflow:")
        .map(|rest| !rest.contains(':'))
        .unwrap_or(false)
}

#[cfg(test)]
#[path = "keys_tests.rs"]
mod tests;
