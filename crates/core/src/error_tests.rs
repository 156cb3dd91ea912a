// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn display_includes_kind_and_message() {
    let err = WorkflowError::new(ErrorKind::GateFailed, "wave 2 below ratio");
    assert_eq!(err.to_string(), "gate_failed: wave 2 below ratio");
}

#[test]
fn only_transport_errors_are_retryable() {
    assert!(WorkflowError::new(ErrorKind::TransportUnavailable, "broker down").is_retryable());
    assert!(!WorkflowError::new(ErrorKind::Rejected, "unknown service").is_retryable());
    assert!(!WorkflowError::internal("bug").is_retryable());
}

#[test]
fn serde_round_trip_preserves_kind() {
    let err = WorkflowError::validation("wave size must be >= 1");
    let json = serde_json::to_string(&err).unwrap();
    let back: WorkflowError = serde_json::from_str(&json).unwrap();
    assert_eq!(back.kind, ErrorKind::ValidationFailed);
    assert_eq!(back, err);
}
