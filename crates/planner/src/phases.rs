// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Canonical prologue and epilogue phases shared by all strategies.

use crate::request::WorkflowRequest;
use convoy_core::{Phase, PhaseKind, Step, StepKind};

/// Pre-deployment: environment validation, load-balancer readiness,
/// package existence + checksum verification. The phase as a unit is not
/// rollback-critical but its steps are.
pub fn pre_deployment(request: &WorkflowRequest) -> Phase {
    let steps = vec![
        Step::new("environment-validation", StepKind::Validation).critical(),
        Step::new("load-balancer-readiness", StepKind::HealthCheck).critical(),
        Step::new("package-verification", StepKind::Validation)
            .critical()
            .param("package_path", request.package.path.clone())
            .param("sha256", request.package.sha256.clone()),
    ];
    Phase::new("pre-deployment", PhaseKind::PreDeploy)
        .target_servers(request.target_servers.clone())
        .steps(steps)
        .rollback_on_failure(false)
        .gate(request.config.gate())
}

/// Post-deployment: health checks on all touched servers plus
/// integration tests.
pub fn post_deployment(request: &WorkflowRequest) -> Phase {
    let steps = vec![
        Step::new("fleet-health-check", StepKind::HealthCheck).critical(),
        Step::new("integration-tests", StepKind::Script)
            .critical()
            .param("suite", "post-deploy"),
    ];
    Phase::new("post-deployment", PhaseKind::PostDeploy)
        .target_servers(request.target_servers.clone())
        .steps(steps)
        .gate(request.config.gate())
}

/// Cleanup: stale artifact removal and cache warmup. Never triggers
/// rollback; steps are non-critical.
pub fn cleanup(request: &WorkflowRequest) -> Phase {
    let steps = vec![
        Step::new("stale-artifact-removal", StepKind::Script).param("keep_releases", "3"),
        Step::new("cache-warmup", StepKind::Script),
    ];
    Phase::new("cleanup", PhaseKind::Cleanup)
        .target_servers(request.target_servers.clone())
        .steps(steps)
        .rollback_on_failure(false)
        .gate(request.config.gate())
}

/// The standard per-wave deploy step.
pub fn deploy_step() -> Step {
    Step::new("deploy", StepKind::Command).critical().param("operation", "deploy")
}

/// Split servers into chunks of `size`, preserving order.
pub fn chunk<T: Clone>(items: &[T], size: usize) -> Vec<Vec<T>> {
    if size == 0 {
        return vec![items.to_vec()];
    }
    items.chunks(size).map(|c| c.to_vec()).collect()
}
