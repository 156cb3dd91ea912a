// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The deployment request handed to the planner.

use crate::config::StrategyConfig;
use convoy_core::{AgentId, PackageRef, StrategyKind};
use serde::{Deserialize, Serialize};

/// Everything needed to plan and run one deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRequest {
    pub service_name: String,
    pub version: String,
    pub strategy: StrategyKind,
    pub target_servers: Vec<AgentId>,
    pub package: PackageRef,
    /// Validated principal that initiated the deployment.
    pub initiated_by: String,
    /// 0–10; maps onto broker message priority.
    pub priority: u8,
    pub config: StrategyConfig,
}

impl WorkflowRequest {
    pub fn new(
        service_name: impl Into<String>,
        version: impl Into<String>,
        strategy: StrategyKind,
        target_servers: Vec<AgentId>,
        package: PackageRef,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            version: version.into(),
            strategy,
            target_servers,
            package,
            initiated_by: String::new(),
            priority: 5,
            config: StrategyConfig::default(),
        }
    }

    convoy_core::setters! {
        into {
            initiated_by: String,
        }
        set {
            priority: u8,
            config: StrategyConfig,
        }
    }
}
