// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine failover: a second engine resumes a workflow whose lease
//! lapsed, without duplicate execution.

use super::*;
use crate::engine::{Engine, EngineDeps};
use crate::EngineConfig;
use convoy_core::{Clock, DeploymentCommand};
use std::collections::HashSet;
use std::sync::Arc;

fn second_engine(ctx: &crate::test_helpers::TestContext) -> crate::test_helpers::TestEngine {
    Engine::new(
        EngineDeps {
            store: Arc::new(ctx.store.clone()),
            fabric: Arc::new(ctx.fabric.clone()),
            clock: ctx.clock.clone(),
            health: None,
        },
        EngineConfig {
            tick_interval_ms: 10,
            resume_window_s: 2,
            ..EngineConfig::default()
        },
    )
}

#[tokio::test]
async fn lease_is_mutually_exclusive_between_engines() {
    let ctx = setup();
    let targets = agents(4);
    let id = ctx
        .engine
        .submit(rolling_request(&targets, 4, 0, 30))
        .await
        .unwrap();
    // Let the first driver take its lease.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let other = second_engine(&ctx);
    let resumed = other.resume_orphaned().await.unwrap();
    assert!(resumed.is_empty(), "second engine must not steal a live lease");

    ctx.drive(id, all_ok).await;
}

#[tokio::test]
async fn second_engine_resumes_after_drain_and_completes_via_replay() {
    let ctx = setup();
    let targets = agents(4);
    let id = ctx
        .engine
        .submit(rolling_request(&targets, 4, 25, 30))
        .await
        .unwrap();

    // Answer everything except one server's wave deploy, until the
    // persisted state shows the other three terminal in the wave.
    let silent = targets[3];
    let checkpoint = std::time::Instant::now() + Duration::from_secs(5);
    loop {
        for command in ctx.new_commands() {
            if !(command.operation == Operation::Deploy && command.agent_id == silent) {
                ctx.respond(&command, StatusPhase::Succeeded).await;
            }
        }
        let status = ctx.engine.status(id).await.unwrap();
        let silent_issued = status
            .servers
            .get(&silent.to_string())
            .map(|s| s == "issued")
            .unwrap_or(false);
        let done = status.servers.values().filter(|s| *s == "succeeded").count();
        if silent_issued && done == 3 {
            break;
        }
        assert!(std::time::Instant::now() < checkpoint, "wave never reached 3/4");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    // Stop the first engine at a safe checkpoint (lease released,
    // state and pending entries persisted).
    ctx.engine.drain().await;

    // Second engine acquires the lease and resumes from persisted state.
    let other = second_engine(&ctx);
    let resumed = other.resume_orphaned().await.unwrap();
    assert_eq!(resumed, vec![id]);

    // Broker replay: every published command's status reaches the new
    // owner; duplicates for closed entries are no-ops.
    let deadline = std::time::Instant::now() + Duration::from_secs(10);
    loop {
        for message in ctx.fabric.published_to("command.") {
            let command: DeploymentCommand = message.decode();
            other
                .ingest_status(convoy_core::StatusUpdate {
                    command_id: command.command_id,
                    workflow_id: command.workflow_id,
                    agent_id: command.agent_id,
                    timestamp_ms: ctx.clock.epoch_ms(),
                    phase: StatusPhase::Succeeded,
                    details: None,
                })
                .await;
        }
        let status = other.status(id).await.unwrap();
        if status.state.is_terminal() {
            assert_eq!(status.state, WorkflowState::Succeeded);
            break;
        }
        assert!(std::time::Instant::now() < deadline, "failover did not complete");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    // No duplicate command ids were ever produced for the same work.
    let mut ids = HashSet::new();
    let mut agents_deployed = HashSet::new();
    for message in ctx.fabric.published_to("command.deploy.") {
        let command: DeploymentCommand = message.decode();
        if command.operation == Operation::Deploy {
            assert!(ids.insert(command.command_id), "command id republished");
            agents_deployed.insert(command.agent_id);
        }
    }
    assert_eq!(agents_deployed.len(), 4);
}

#[tokio::test]
async fn unanswered_commands_are_reissued_under_a_new_attempt() {
    let ctx = setup();
    let targets = agents(2);
    let id = ctx
        .engine
        .submit(rolling_request(&targets, 2, 0, 120))
        .await
        .unwrap();

    // Answer nothing for one agent's deploy; drain; resume elsewhere.
    let silent = targets[1];
    let checkpoint = std::time::Instant::now() + Duration::from_secs(5);
    loop {
        for command in ctx.new_commands() {
            if !(command.operation == Operation::Deploy && command.agent_id == silent) {
                ctx.respond(&command, StatusPhase::Succeeded).await;
            }
        }
        let status = ctx.engine.status(id).await.unwrap();
        let silent_issued = status
            .servers
            .get(&silent.to_string())
            .map(|s| s == "issued")
            .unwrap_or(false);
        if silent_issued {
            break;
        }
        assert!(std::time::Instant::now() < checkpoint, "deploy never dispatched");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    ctx.engine.drain().await;

    let first_id = ctx
        .fabric
        .published_to("command.deploy.")
        .iter()
        .map(|m| m.decode::<DeploymentCommand>())
        .find(|c| c.operation == Operation::Deploy && c.agent_id == silent)
        .map(|c| c.command_id);

    let other = second_engine(&ctx);
    let resumed = other.resume_orphaned().await.unwrap();
    assert_eq!(resumed, vec![id]);

    // Past the resume window, the silent command comes back under a
    // fresh attempt with a different id.
    let deadline = std::time::Instant::now() + Duration::from_secs(10);
    let reissued = loop {
        let reissue = ctx
            .fabric
            .published_to("command.deploy.")
            .iter()
            .map(|m| m.decode::<DeploymentCommand>())
            .filter(|c| c.operation == Operation::Deploy && c.agent_id == silent)
            .map(|c| c.command_id)
            .find(|cid| Some(*cid) != first_id);
        if let Some(cid) = reissue {
            break cid;
        }
        assert!(std::time::Instant::now() < deadline, "no reissue happened");
        ctx.clock.advance(Duration::from_secs(1));
        tokio::time::sleep(Duration::from_millis(10)).await;
    };
    assert_ne!(Some(reissued), first_id);
}
