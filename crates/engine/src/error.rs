// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine error type

use convoy_core::WorkflowId;
use thiserror::Error;

/// Errors from engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("workflow not found: {0}")]
    WorkflowNotFound(WorkflowId),

    #[error("workflow {0} is owned by another engine")]
    NotLeaseholder(WorkflowId),

    #[error("store error: {0}")]
    Store(#[from] convoy_store::StoreError),

    #[error("fabric error: {0}")]
    Fabric(#[from] convoy_fabric::FabricError),

    #[error("plan error: {0}")]
    Plan(#[from] convoy_planner::PlanError),

    #[error("engine is draining")]
    Draining,

    #[error("internal: {0}")]
    Internal(String),
}
