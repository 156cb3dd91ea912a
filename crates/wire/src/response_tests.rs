// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn error_frame_carries_typed_code() {
    let frame = CoordinatorFrame::error(ErrorCode::NotRegistered, "unknown agent");
    let json = serde_json::to_value(&frame).unwrap();
    assert_eq!(json["type"], "error");
    assert_eq!(json["code"], "not_registered");
}

#[test]
fn hello_ok_carries_settings() {
    let frame = CoordinatorFrame::HelloOk { settings: AgentSettings::default() };
    let json = serde_json::to_value(&frame).unwrap();
    assert_eq!(json["settings"]["heartbeat_interval_s"], 30);
}

#[test]
fn rollback_frame_round_trips() {
    let frame = CoordinatorFrame::Rollback(crate::RollbackRequest {
        service_name: "api".into(),
        target_version: "1.9.1".into(),
    });
    let json = serde_json::to_string(&frame).unwrap();
    let back: CoordinatorFrame = serde_json::from_str(&json).unwrap();
    assert_eq!(back, frame);
}

#[test]
fn deploy_chunk_round_trips() {
    let chunk = CoordinatorFrame::DeployChunk {
        service_name: "api".into(),
        version: "2.0.0".into(),
        offset: 4096,
        total_size: 1_048_576,
        bytes: crate::encode_chunk_bytes(b"payload"),
        sha256: "ab".repeat(32),
    };
    let json = serde_json::to_string(&chunk).unwrap();
    let back: CoordinatorFrame = serde_json::from_str(&json).unwrap();
    assert_eq!(back, chunk);
}
