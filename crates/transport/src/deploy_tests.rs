// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::config::TransportConfig;
use crate::error::TransportError;
use crate::session::ConnectionSource;
use crate::test_support::{connect, make_transport, register};
use convoy_wire::{decode_chunk_bytes, AgentRequest, CoordinatorFrame};
use sha2::{Digest, Sha256};
use std::time::Duration;

fn write_package(bytes: &[u8]) -> (tempfile::TempDir, std::path::PathBuf, String) {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("api-2.0.0.tar.gz");
    std::fs::write(&path, bytes).expect("write package");
    let sha = format!("{:x}", Sha256::digest(bytes));
    (dir, path, sha)
}

#[tokio::test]
async fn streams_chunks_and_returns_terminal_progress() {
    let ctx = make_transport(TransportConfig {
        deploy_chunk_bytes: 16,
        ..TransportConfig::default()
    });
    let mut conn = connect(&ctx, ConnectionSource::Tcp, "").await;
    let id = register(&mut conn, "server-01").await;

    let payload: Vec<u8> = (0u8..=99).collect();
    let (_dir, path, sha) = write_package(&payload);

    let transport = ctx.transport.clone();
    let sha_clone = sha.clone();
    let deploy = tokio::spawn(async move {
        transport.deploy_service(id, "api", "2.0.0", &path, &sha_clone).await
    });

    // Agent side: reassemble the chunks and verify what was advertised.
    let mut assembled = Vec::new();
    loop {
        match conn.recv().await {
            CoordinatorFrame::DeployChunk { offset, total_size, bytes, sha256, .. } => {
                assert_eq!(offset as usize, assembled.len());
                assert_eq!(total_size as usize, payload.len());
                assert_eq!(sha256, sha);
                assembled.extend(decode_chunk_bytes(&bytes).unwrap());
                if assembled.len() == payload.len() {
                    break;
                }
            }
            other => unreachable!("expected DeployChunk, got {other:?}"),
        }
    }
    assert_eq!(assembled, payload);
    assert_eq!(format!("{:x}", Sha256::digest(&assembled)), sha);

    // Stream progress phases up to a healthy terminal.
    for (status, pct) in [
        (convoy_wire::DeployStatus::Received, 25),
        (convoy_wire::DeployStatus::Verified, 50),
        (convoy_wire::DeployStatus::Applied, 75),
        (convoy_wire::DeployStatus::Started, 90),
        (convoy_wire::DeployStatus::HealthOk, 100),
    ] {
        conn.send(&AgentRequest::DeployProgress {
            service_name: "api".to_string(),
            progress: convoy_wire::DeploymentProgress {
                status,
                message: String::new(),
                progress_percent: pct,
                timestamp_ms: 1_000,
            },
        })
        .await;
    }

    let progress = deploy.await.unwrap().unwrap();
    assert_eq!(progress.status, convoy_wire::DeployStatus::HealthOk);
}

#[tokio::test]
async fn checksum_mismatch_sends_nothing() {
    let ctx = make_transport(TransportConfig::default());
    let mut conn = connect(&ctx, ConnectionSource::Tcp, "").await;
    let id = register(&mut conn, "server-01").await;

    let (_dir, path, _) = write_package(b"real contents");
    let wrong = "0".repeat(64);
    let err = ctx
        .transport
        .deploy_service(id, "api", "2.0.0", &path, &wrong)
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::Package(_)));
}

#[tokio::test]
async fn failed_progress_is_returned_to_the_caller() {
    let ctx = make_transport(TransportConfig::default());
    let mut conn = connect(&ctx, ConnectionSource::Tcp, "").await;
    let id = register(&mut conn, "server-01").await;

    let (_dir, path, sha) = write_package(b"package bytes");
    let transport = ctx.transport.clone();
    let sha_clone = sha.clone();
    let deploy = tokio::spawn(async move {
        transport.deploy_service(id, "api", "2.0.0", &path, &sha_clone).await
    });

    // Consume the single chunk, then fail the apply.
    match conn.recv().await {
        CoordinatorFrame::DeployChunk { .. } => {}
        other => unreachable!("expected DeployChunk, got {other:?}"),
    }
    conn.send(&AgentRequest::DeployProgress {
        service_name: "api".to_string(),
        progress: convoy_wire::DeploymentProgress {
            status: convoy_wire::DeployStatus::Failed,
            message: "checksum mismatch after assembly".to_string(),
            progress_percent: 50,
            timestamp_ms: 1_000,
        },
    })
    .await;

    let progress = deploy.await.unwrap().unwrap();
    assert_eq!(progress.status, convoy_wire::DeployStatus::Failed);
    assert!(progress.message.contains("checksum"));
}

#[tokio::test]
async fn deploy_deadline_aborts_the_stream() {
    let ctx = make_transport(TransportConfig {
        deploy_timeout_s: 1,
        ..TransportConfig::default()
    });
    let mut conn = connect(&ctx, ConnectionSource::Tcp, "").await;
    let id = register(&mut conn, "server-01").await;

    let (_dir, path, sha) = write_package(b"slow package");
    let transport = ctx.transport.clone();
    let deploy = tokio::spawn(async move {
        transport.deploy_service(id, "api", "2.0.0", &path, &sha).await
    });

    match conn.recv().await {
        CoordinatorFrame::DeployChunk { .. } => {}
        other => unreachable!("expected DeployChunk, got {other:?}"),
    }
    // Never send progress: the caller times out and an abort arrives.
    let err = deploy.await.unwrap().unwrap_err();
    assert!(matches!(err, TransportError::Timeout));
    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    loop {
        match conn.recv().await {
            CoordinatorFrame::DeployAbort { reason, .. } => {
                assert!(reason.contains("deadline"));
                break;
            }
            _ => assert!(std::time::Instant::now() < deadline, "no abort frame"),
        }
    }
}
