// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::config::{HealthCheckConfig, RollingConfig, StrategyConfig, WaveConfig};

fn rolling_config(wave: WaveConfig) -> StrategyConfig {
    StrategyConfig {
        rolling: Some(RollingConfig::default()),
        wave: Some(wave),
        health_check: Some(HealthCheckConfig { timeout_s: 30, success_ratio: 1.0 }),
        canary: None,
    }
}

#[test]
fn more_waves_cost_more() {
    let small_waves = rolling_config(WaveConfig { wave_size: 2, ..WaveConfig::default() });
    let big_waves = rolling_config(WaveConfig { wave_size: 6, ..WaveConfig::default() });
    let fine = estimate(12, StrategyKind::Rolling, &small_waves);
    let coarse = estimate(12, StrategyKind::Rolling, &big_waves);
    assert!(fine > coarse);
}

#[test]
fn serial_costs_more_than_parallel() {
    let serial = rolling_config(WaveConfig {
        wave_size: 6,
        parallel_within_wave: false,
        delay_between_servers_s: 5,
        ..WaveConfig::default()
    });
    let parallel = rolling_config(WaveConfig {
        wave_size: 6,
        parallel_within_wave: true,
        max_parallelism: 6,
        ..WaveConfig::default()
    });
    assert!(
        estimate(12, StrategyKind::Rolling, &serial)
            > estimate(12, StrategyKind::Rolling, &parallel)
    );
}

#[test]
fn wave_interval_is_counted_between_waves_only() {
    let without = rolling_config(WaveConfig { wave_size: 4, ..WaveConfig::default() });
    let with = rolling_config(WaveConfig {
        wave_size: 4,
        wave_interval_s: 60,
        ..WaveConfig::default()
    });
    let delta = estimate(12, StrategyKind::Rolling, &with)
        - estimate(12, StrategyKind::Rolling, &without);
    // 3 waves -> 2 intervals.
    assert_eq!(delta.as_secs(), 120);
}

#[test]
fn estimate_includes_gate_timeouts() {
    let config = rolling_config(WaveConfig { wave_size: 12, ..WaveConfig::default() });
    let estimate = estimate(12, StrategyKind::Rolling, &config);
    // One wave: bookends (120) + gate (30) at minimum.
    assert!(estimate.as_secs() >= 150);
}

#[test]
fn empty_fleet_is_just_bookends() {
    let config = rolling_config(WaveConfig::default());
    let estimate = estimate(0, StrategyKind::Rolling, &config);
    assert_eq!(estimate.as_secs(), 120);
}
