// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Exchange and queue topology, declared idempotently at startup.

use crate::config::FabricConfig;
use crate::error::FabricError;
use lapin::options::{ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions};
use lapin::types::{AMQPValue, FieldTable, ShortString};
use lapin::{Channel, ExchangeKind};

/// A queue bound to the topic exchange by routing-key prefix.
struct QueueSpec {
    name: &'static str,
    binding: &'static str,
    /// Purpose-specific TTL override in seconds; 0 uses the config default.
    ttl_s: u64,
    max_length: u32,
    max_priority: Option<u8>,
}

const QUEUES: &[QueueSpec] = &[
    QueueSpec { name: "deployment", binding: "deployment.#", ttl_s: 0, max_length: 100_000, max_priority: None },
    QueueSpec { name: "command", binding: "command.#", ttl_s: 600, max_length: 100_000, max_priority: None },
    QueueSpec { name: "status", binding: "status.#", ttl_s: 0, max_length: 500_000, max_priority: None },
    QueueSpec { name: "alert", binding: "alert.#", ttl_s: 86_400, max_length: 50_000, max_priority: None },
    QueueSpec { name: "metrics", binding: "metrics.#", ttl_s: 300, max_length: 500_000, max_priority: None },
    QueueSpec { name: "workflow", binding: "workflow.#", ttl_s: 0, max_length: 100_000, max_priority: None },
    QueueSpec { name: "priority", binding: "priority.#", ttl_s: 600, max_length: 100_000, max_priority: Some(10) },
    QueueSpec { name: "batch", binding: "batch.#", ttl_s: 0, max_length: 100_000, max_priority: None },
    QueueSpec { name: "monitoring", binding: "monitoring.#", ttl_s: 3_600, max_length: 100_000, max_priority: None },
];

/// Declares the exchange, dead-letter exchange, and per-purpose queues.
pub struct Topology {
    config: FabricConfig,
}

impl Topology {
    pub fn new(config: FabricConfig) -> Self {
        Self { config }
    }

    /// Name of the dead-letter queue.
    pub fn dlx_queue(&self) -> String {
        format!("{}.queue", self.config.dlx)
    }

    /// Queue name for a purpose prefix (e.g. "status").
    pub fn queue_name(&self, purpose: &str) -> String {
        format!("{}.{}", self.config.exchange, purpose)
    }

    /// Declare everything. Safe to call on every startup; declarations are
    /// idempotent as long as arguments match.
    pub async fn declare(&self, channel: &Channel) -> Result<(), FabricError> {
        let durable = ExchangeDeclareOptions { durable: true, ..Default::default() };

        channel
            .exchange_declare(
                self.config.exchange.as_str().into(),
                ExchangeKind::Topic,
                durable,
                FieldTable::default(),
            )
            .await?;

        channel
            .exchange_declare(
                self.config.dlx.as_str().into(),
                ExchangeKind::Direct,
                durable,
                FieldTable::default(),
            )
            .await?;

        let dlx_queue = self.dlx_queue();
        channel
            .queue_declare(
                dlx_queue.as_str().into(),
                QueueDeclareOptions { durable: true, ..Default::default() },
                FieldTable::default(),
            )
            .await?;
        channel
            .queue_bind(
                dlx_queue.as_str().into(),
                self.config.dlx.as_str().into(),
                "".into(),
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await?;

        for spec in QUEUES {
            let queue = self.queue_name(spec.name);
            channel
                .queue_declare(
                    queue.as_str().into(),
                    QueueDeclareOptions { durable: true, ..Default::default() },
                    self.queue_args(spec),
                )
                .await?;
            channel
                .queue_bind(
                    queue.as_str().into(),
                    self.config.exchange.as_str().into(),
                    spec.binding.into(),
                    QueueBindOptions::default(),
                    FieldTable::default(),
                )
                .await?;
        }

        tracing::info!(
            exchange = %self.config.exchange,
            dlx = %self.config.dlx,
            queues = QUEUES.len(),
            "topology declared"
        );
        Ok(())
    }

    fn queue_args(&self, spec: &QueueSpec) -> FieldTable {
        let mut args = FieldTable::default();
        args.insert(
            ShortString::from("x-dead-letter-exchange"),
            AMQPValue::LongString(self.config.dlx.clone().into()),
        );
        let ttl_s = if spec.ttl_s == 0 { self.config.message_ttl_s } else { spec.ttl_s };
        args.insert(
            ShortString::from("x-message-ttl"),
            AMQPValue::LongInt((ttl_s * 1_000) as i32),
        );
        args.insert(ShortString::from("x-max-length"), AMQPValue::LongInt(spec.max_length as i32));
        if let Some(max) = spec.max_priority {
            args.insert(ShortString::from("x-max-priority"), AMQPValue::ShortShortUInt(max));
        }
        // Mirror to all nodes where clustered; ignored standalone.
        args.insert(
            ShortString::from("x-ha-policy"),
            AMQPValue::LongString("all".into()),
        );
        args
    }
}

#[cfg(test)]
#[path = "topology_tests.rs"]
mod tests;
