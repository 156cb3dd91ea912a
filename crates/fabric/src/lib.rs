// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! convoy-fabric: topic-routed publish/consume over a durable AMQP broker.
//!
//! Delivery is at-least-once; handlers must be idempotent. Messages that
//! exceed their TTL or are rejected without requeue land on the dead-letter
//! queue for supervision.

mod config;
mod consumer;
mod error;
mod limiter;
mod pool;
mod publisher;
mod topology;

#[cfg(any(test, feature = "test-support"))]
mod fake;

pub use config::{FabricConfig, MessageProps};
pub use consumer::{Consumer, DeliveryCtx, HandlerOutcome};
pub use error::{BatchError, FabricError};
pub use limiter::RateLimiter;
pub use pool::ChannelPool;
pub use publisher::{AmqpPublisher, FabricPublisher};
pub use topology::Topology;

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeFabric, PublishedMessage};
