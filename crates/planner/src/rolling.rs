// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Rolling strategy: partition the target set into waves, gate each one.

use crate::config::WaveStrategy;
use crate::phases::{chunk, deploy_step};
use crate::request::WorkflowRequest;
use convoy_core::{Phase, PhaseKind, Step, StepKind};
use std::time::Duration;

pub fn waves(request: &WorkflowRequest, out: &mut Vec<Phase>) {
    let wave_config = request.config.wave.clone().unwrap_or_default();
    let rolling = request.config.rolling.clone().unwrap_or_default();
    let strategy =
        WaveStrategy::parse(&wave_config.strategy).unwrap_or(WaveStrategy::FixedSize);

    let size = match strategy {
        WaveStrategy::FixedSize => wave_config.wave_size as usize,
        WaveStrategy::Percentage => {
            let pct = wave_config.wave_percentage / 100.0;
            ((request.target_servers.len() as f64 * pct).ceil() as usize).max(1)
        }
    };

    let partitions = chunk(&request.target_servers, size.max(1));
    let total = partitions.len();
    for (index, servers) in partitions.into_iter().enumerate() {
        let mut steps = vec![deploy_step()];
        if wave_config.wave_interval_s > 0 && index + 1 < total {
            steps.push(
                Step::new("wave-interval", StepKind::Wait).param(
                    "duration_ms",
                    (wave_config.wave_interval_s * 1_000).to_string(),
                ),
            );
        }

        let mut phase = Phase::new(format!("wave-{}", index + 1), PhaseKind::Wave)
            .target_servers(servers)
            .steps(steps)
            .max_failure_pct(rolling.max_failure_threshold_pct)
            .gate(request.config.gate());
        if wave_config.parallel_within_wave {
            phase = phase.max_parallelism(wave_config.max_parallelism.max(1));
        } else {
            phase = phase
                .serial_delay(Duration::from_secs(wave_config.delay_between_servers_s));
        }
        out.push(phase);
    }
}

#[cfg(test)]
#[path = "rolling_tests.rs"]
mod tests;
