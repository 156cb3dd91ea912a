// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Canary strategy: small cohort, observation, broader cohort, remainder.

use crate::phases::deploy_step;
use crate::request::WorkflowRequest;
use convoy_core::{AgentId, Phase, PhaseKind, Step, StepKind};

pub fn waves(request: &WorkflowRequest, out: &mut Vec<Phase>) {
    let canary = request.config.canary.clone().unwrap_or_default();
    let total = request.target_servers.len();

    let canary_len = cohort_len(total, canary.canary_percentage);
    let secondary_len = cohort_len(total, canary.secondary_percentage)
        .min(total.saturating_sub(canary_len));

    let (canary_servers, rest) = request.target_servers.split_at(canary_len.min(total));
    let (secondary_servers, remainder) = rest.split_at(secondary_len.min(rest.len()));

    out.push(gated_wave(
        "canary",
        canary_servers.to_vec(),
        request,
        canary.observation_s,
        canary.manual_gates,
    ));
    if !secondary_servers.is_empty() {
        out.push(gated_wave(
            "canary-secondary",
            secondary_servers.to_vec(),
            request,
            canary.observation_s,
            canary.manual_gates,
        ));
    }
    if !remainder.is_empty() {
        // The final cohort completes the rollout; no pause after it.
        out.push(gated_wave("canary-remainder", remainder.to_vec(), request, 0, false));
    }
}

fn cohort_len(total: usize, percentage: f64) -> usize {
    if total == 0 {
        return 0;
    }
    ((total as f64 * percentage / 100.0).ceil() as usize).clamp(1, total)
}

fn gated_wave(
    name: &str,
    servers: Vec<AgentId>,
    request: &WorkflowRequest,
    observation_s: u64,
    pause: bool,
) -> Phase {
    let mut steps = vec![deploy_step()];
    if observation_s > 0 {
        steps.push(
            Step::new("observation", StepKind::Wait)
                .param("duration_ms", (observation_s * 1_000).to_string()),
        );
    }
    Phase::new(name, PhaseKind::Wave)
        .target_servers(servers)
        .steps(steps)
        .gate(request.config.gate())
        .pause_on_success(pause)
}

#[cfg(test)]
#[path = "canary_tests.rs"]
mod tests;
