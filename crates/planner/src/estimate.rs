// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Coarse execution-time estimation, used to compute workflow deadlines.
//!
//! The estimate is an upper bound on a noiseless happy path: per-wave
//! cost plus inter-wave intervals and gate timeouts, plus prologue and
//! epilogue constants. Real runs with retries can exceed it; the engine
//! treats it as the base for the workflow deadline, not a hard promise.

use crate::config::{StrategyConfig, WaveStrategy};
use convoy_core::StrategyKind;
use std::time::Duration;

/// Assumed worst-case per-server apply time on the happy path.
const PER_SERVER_S: u64 = 30;
/// Prologue + epilogue fixed costs (validation, integration tests, cleanup).
const BOOKEND_S: u64 = 120;

/// Estimate wall-clock duration for deploying to `servers` targets.
pub fn estimate(servers: usize, strategy: StrategyKind, config: &StrategyConfig) -> Duration {
    let wave = config.wave.clone().unwrap_or_default();
    let health_timeout = config.health_check.clone().unwrap_or_default().timeout_s;

    let wave_sizes: Vec<usize> = match strategy {
        StrategyKind::Rolling => {
            let size = match WaveStrategy::parse(&wave.strategy) {
                Some(WaveStrategy::Percentage) => {
                    ((servers as f64 * wave.wave_percentage / 100.0).ceil() as usize).max(1)
                }
                _ => (wave.wave_size as usize).max(1),
            };
            sizes_of_chunks(servers, size)
        }
        StrategyKind::BlueGreen | StrategyKind::Immediate => vec![servers],
        StrategyKind::Canary => {
            let canary = config.canary.clone().unwrap_or_default();
            let first = ((servers as f64 * canary.canary_percentage / 100.0).ceil() as usize)
                .clamp(1, servers.max(1));
            let second = ((servers as f64 * canary.secondary_percentage / 100.0).ceil() as usize)
                .min(servers.saturating_sub(first));
            let rest = servers.saturating_sub(first + second);
            [first, second, rest].into_iter().filter(|n| *n > 0).collect()
        }
    };

    let mut total_s = BOOKEND_S;
    for (index, size) in wave_sizes.iter().enumerate() {
        let serial = !wave.parallel_within_wave && strategy == StrategyKind::Rolling;
        let apply_s = if serial {
            *size as u64 * (PER_SERVER_S + wave.delay_between_servers_s)
        } else {
            // Parallel dispatch still pays per-batch cost under the cap.
            let lanes = wave.max_parallelism.max(1);
            ((*size + lanes - 1) / lanes) as u64 * PER_SERVER_S
        };
        total_s += apply_s + health_timeout;
        if index + 1 < wave_sizes.len() {
            total_s += wave.wave_interval_s;
        }
    }

    // Canary observation windows.
    if strategy == StrategyKind::Canary {
        let canary = config.canary.clone().unwrap_or_default();
        total_s += canary.observation_s * 2;
    }

    Duration::from_secs(total_s)
}

fn sizes_of_chunks(total: usize, chunk: usize) -> Vec<usize> {
    if total == 0 {
        return Vec::new();
    }
    let full = total / chunk;
    let tail = total % chunk;
    let mut out = vec![chunk; full];
    if tail > 0 {
        out.push(tail);
    }
    out
}

#[cfg(test)]
#[path = "estimate_tests.rs"]
mod tests;
