// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Configuration validation and estimation bounds.

use crate::harness::{agents, fleet, rolling_request};
use convoy_core::{ErrorKind, StrategyKind, WorkflowState};
use convoy_planner::{
    estimate, HealthCheckConfig, RollingConfig, StrategyConfig, WaveConfig,
};
use std::time::Duration;

#[tokio::test]
async fn invalid_wave_configuration_never_leaves_planning() {
    let fleet = fleet();
    let targets = agents(4);
    let mut request = rolling_request(&targets, 4, 25, 30);
    request.config.wave = Some(WaveConfig {
        strategy: "Invalid".to_string(),
        wave_size: 0,
        wave_percentage: 150.0,
        ..WaveConfig::default()
    });
    let id = fleet.engine.submit(request).await.unwrap();

    tokio::time::sleep(Duration::from_millis(150)).await;
    let status = fleet.engine.status(id).await.unwrap();
    assert_eq!(status.state, WorkflowState::Planning);
    assert_eq!(status.last_error.map(|e| e.kind), Some(ErrorKind::ValidationFailed));
    assert!(fleet.fabric.published_to("command.").is_empty(), "no side effects");
}

#[test]
fn validation_reports_every_violation_at_once() {
    let config = StrategyConfig {
        rolling: Some(RollingConfig::default()),
        wave: Some(WaveConfig {
            strategy: "Invalid".to_string(),
            wave_size: 0,
            wave_percentage: 150.0,
            ..WaveConfig::default()
        }),
        health_check: Some(HealthCheckConfig { timeout_s: 0, success_ratio: 2.0 }),
        canary: None,
    };
    let err = convoy_planner::validate(StrategyKind::Rolling, &config).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("unknown wave strategy"));
    assert!(message.contains("timeout"));
    assert!(message.contains("ratio"));
}

#[test]
fn estimate_bounds_a_noiseless_happy_path_from_above() {
    // A 12-server rolling deployment in waves of 4 with a 30s gate: the
    // noiseless floor is three gate waits plus per-wave apply time.
    let config = StrategyConfig {
        rolling: Some(RollingConfig::default()),
        wave: Some(WaveConfig { wave_size: 4, wave_interval_s: 10, ..WaveConfig::default() }),
        health_check: Some(HealthCheckConfig { timeout_s: 30, success_ratio: 1.0 }),
        canary: None,
    };
    let estimated = estimate(12, StrategyKind::Rolling, &config);
    let floor = Duration::from_secs(3 * 30 + 2 * 10);
    assert!(estimated >= floor, "{estimated:?} under the noiseless floor {floor:?}");
}
