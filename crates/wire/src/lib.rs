// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent RPC protocol for coordinator ↔ agent communication.
//!
//! Wire format: 4-byte length prefix (big-endian) + JSON payload

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod codec;
mod request;
mod response;
mod types;

pub use codec::{
    decode, decode_chunk_bytes, encode, encode_chunk_bytes, read_frame, write_frame,
    ProtocolError, MAX_FRAME_BYTES, PROTOCOL_VERSION,
};
pub use request::AgentRequest;
pub use response::{CoordinatorFrame, ErrorCode};
pub use types::{
    AgentRegistration, CommandResult, DeployStatus, DeploymentProgress, DiscoveredService,
    HeartbeatRequest, HeartbeatResponse, MetricSample, MetricsBatch, MetricsSummary,
    RegistrationResponse, RollbackRequest, RollbackResult, ServiceCommand, ServiceDiscovery,
    ServiceDiscoveryResponse,
};

#[cfg(test)]
mod property_tests;
