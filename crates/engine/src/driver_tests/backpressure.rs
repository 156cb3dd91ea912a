// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-workflow and global in-flight caps.

use super::*;
use convoy_core::test_support::package_ref;
use convoy_core::{DeploymentCommand, StrategyKind};
use convoy_planner::{
    HealthCheckConfig, RollingConfig, StrategyConfig, WaveConfig, WorkflowRequest,
};
use std::collections::HashSet;

fn capped_request(targets: &[convoy_core::AgentId], cap: usize) -> WorkflowRequest {
    WorkflowRequest::new(
        "api",
        "2.0.0",
        StrategyKind::Rolling,
        targets.to_vec(),
        package_ref(),
    )
    .config(StrategyConfig {
        rolling: Some(RollingConfig::default()),
        wave: Some(WaveConfig {
            wave_size: targets.len() as u32,
            parallel_within_wave: true,
            max_parallelism: cap,
            ..WaveConfig::default()
        }),
        health_check: Some(HealthCheckConfig { timeout_s: 600, success_ratio: 1.0 }),
        canary: None,
    })
}

#[tokio::test]
async fn in_flight_commands_never_exceed_the_cap() {
    let ctx = setup();
    let targets = agents(8);
    let cap = 2;
    let id = ctx.engine.submit(capped_request(&targets, cap)).await.unwrap();

    let mut answered: HashSet<convoy_core::CommandId> = HashSet::new();
    let mut outstanding: Vec<DeploymentCommand> = Vec::new();
    let deadline = std::time::Instant::now() + Duration::from_secs(10);
    loop {
        for command in ctx.new_commands() {
            if command.operation == Operation::Deploy {
                outstanding.push(command);
            } else {
                answered.insert(command.command_id);
                ctx.respond(&command, StatusPhase::Succeeded).await;
            }
        }

        // The invariant under observation: open deploys never exceed cap.
        assert!(
            outstanding.len() <= cap,
            "observed {} in-flight deploys with cap {}",
            outstanding.len(),
            cap
        );

        // Answer one open deploy at a time so the window keeps sliding.
        if let Some(command) = outstanding.pop() {
            answered.insert(command.command_id);
            ctx.respond(&command, StatusPhase::Succeeded).await;
        }

        let status = ctx.engine.status(id).await.unwrap();
        if status.state.is_terminal() {
            assert_eq!(status.state, WorkflowState::Succeeded);
            break;
        }
        assert!(std::time::Instant::now() < deadline, "capped workflow stalled");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    // All eight targets were eventually deployed despite the cap.
    let deployed: HashSet<_> = ctx
        .fabric
        .published_to("command.deploy.")
        .iter()
        .map(|m| m.decode::<DeploymentCommand>())
        .filter(|c| c.operation == Operation::Deploy)
        .map(|c| c.agent_id)
        .collect();
    assert_eq!(deployed.len(), 8);
}

#[tokio::test]
async fn serial_waves_dispatch_one_at_a_time() {
    let ctx = setup();
    let targets = agents(3);
    let mut request = capped_request(&targets, 8);
    if let Some(wave) = request.config.wave.as_mut() {
        wave.parallel_within_wave = false;
        wave.delay_between_servers_s = 0;
    }
    let id = ctx.engine.submit(request).await.unwrap();

    let deadline = std::time::Instant::now() + Duration::from_secs(10);
    let mut open: Vec<DeploymentCommand> = Vec::new();
    loop {
        for command in ctx.new_commands() {
            if command.operation == Operation::Deploy {
                open.push(command);
            } else {
                ctx.respond(&command, StatusPhase::Succeeded).await;
            }
        }
        assert!(open.len() <= 1, "serial wave dispatched {} at once", open.len());
        if let Some(command) = open.pop() {
            ctx.respond(&command, StatusPhase::Succeeded).await;
        }
        let status = ctx.engine.status(id).await.unwrap();
        if status.state.is_terminal() {
            assert_eq!(status.state, WorkflowState::Succeeded);
            break;
        }
        assert!(std::time::Instant::now() < deadline, "serial workflow stalled");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
