// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Blue-green strategy: deploy the idle color across the full set, smoke
//! test, cut traffic over, drain the old color.
//!
//! The cut-over is a critical `switch_traffic` command step inside the
//! single deploy wave, so the wave partition of the target set stays
//! exact (every server in exactly one wave). A cut-over failure rolls the
//! wave back, which flips traffic back to the old color.

use crate::phases::deploy_step;
use crate::request::WorkflowRequest;
use convoy_core::{Phase, PhaseKind, Step, StepKind};

pub fn waves(request: &WorkflowRequest, out: &mut Vec<Phase>) {
    let steps = vec![
        deploy_step(),
        Step::new("smoke-test", StepKind::HealthCheck).critical(),
        Step::new("switch-traffic", StepKind::Command)
            .critical()
            .param("operation", "switch_traffic"),
        Step::new("drain-old-color", StepKind::Command).param("operation", "stop"),
    ];
    out.push(
        Phase::new("blue-green-cutover", PhaseKind::Wave)
            .target_servers(request.target_servers.clone())
            .steps(steps)
            .gate(request.config.gate()),
    );
}

#[cfg(test)]
#[path = "blue_green_tests.rs"]
mod tests;
