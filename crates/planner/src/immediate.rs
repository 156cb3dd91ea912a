// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Immediate strategy: one wave, full parallelism, gate at the end.

use crate::phases::deploy_step;
use crate::request::WorkflowRequest;
use convoy_core::{Phase, PhaseKind};

pub fn waves(request: &WorkflowRequest, out: &mut Vec<Phase>) {
    out.push(
        Phase::new("immediate", PhaseKind::Wave)
            .target_servers(request.target_servers.clone())
            .steps(vec![deploy_step()])
            .gate(request.config.gate()),
    );
}
