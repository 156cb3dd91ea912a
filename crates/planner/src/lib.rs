// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! convoy-planner: pure strategy planning.
//!
//! Turns a deployment request into an ordered list of phases. No I/O:
//! validation, planning, and estimation are all deterministic functions
//! of their inputs.

mod blue_green;
mod canary;
mod config;
mod error;
mod estimate;
mod immediate;
mod phases;
mod request;
mod rolling;

pub use config::{
    CanaryConfig, HealthCheckConfig, RollingConfig, StrategyConfig, WaveConfig, WaveStrategy,
};
pub use error::PlanError;
pub use estimate::estimate;
pub use request::WorkflowRequest;

use convoy_core::{Phase, StrategyKind};

/// Validate a strategy configuration. Reports every violation, not just
/// the first.
pub fn validate(strategy: StrategyKind, config: &StrategyConfig) -> Result<(), PlanError> {
    config.validate(strategy)
}

/// Produce the ordered phase list for a request: prologue, strategy
/// waves, post-deployment, cleanup.
///
/// Fails with [`PlanError`] before producing any phase when the
/// configuration is invalid; planning has no partial effects.
pub fn plan(request: &WorkflowRequest) -> Result<Vec<Phase>, PlanError> {
    validate(request.strategy, &request.config)?;

    let mut phases = Vec::new();
    phases.push(phases::pre_deployment(request));
    match request.strategy {
        StrategyKind::Rolling => rolling::waves(request, &mut phases),
        StrategyKind::BlueGreen => blue_green::waves(request, &mut phases),
        StrategyKind::Canary => canary::waves(request, &mut phases),
        StrategyKind::Immediate => immediate::waves(request, &mut phases),
    }
    phases.push(phases::post_deployment(request));
    phases.push(phases::cleanup(request));
    Ok(phases)
}

#[cfg(test)]
#[path = "plan_tests.rs"]
mod tests;
