// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Consuming with concurrent dispatch, ack/requeue/dead outcomes, and
//! automatic recovery.

use crate::config::FabricConfig;
use crate::error::FabricError;
use crate::pool::{backoff, ChannelPool};
use futures_util::StreamExt;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicGetOptions, BasicQosOptions, BasicRejectOptions,
};
use lapin::types::FieldTable;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// What a handler decided about a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// Done; acknowledge.
    Ack,
    /// Transient failure; return to the queue for redelivery.
    Requeue,
    /// Poison; reject without requeue so the broker dead-letters it.
    Dead,
}

/// Delivery metadata passed to handlers.
#[derive(Debug, Clone)]
pub struct DeliveryCtx {
    pub message_id: Option<String>,
    pub correlation_id: Option<String>,
    /// 1 on first delivery, 2+ after redelivery.
    pub delivery_count: u32,
    pub routing_key: String,
}

/// Queue consumer over the channel pool.
pub struct Consumer {
    pool: Arc<ChannelPool>,
    config: FabricConfig,
}

impl Consumer {
    pub fn new(pool: Arc<ChannelPool>, config: FabricConfig) -> Self {
        Self { pool, config }
    }

    /// Consume `queue` until cancelled, dispatching handlers concurrently
    /// up to `prefetch` unacked deliveries.
    ///
    /// On connection loss the loop reconnects with bounded backoff when
    /// `auto_recover` is set, otherwise it returns the error.
    pub async fn consume<F, Fut>(
        &self,
        queue: &str,
        handler: F,
        cancel: CancellationToken,
    ) -> Result<(), FabricError>
    where
        F: Fn(Vec<u8>, DeliveryCtx) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = HandlerOutcome> + Send + 'static,
    {
        let mut attempt: u32 = 0;
        loop {
            match self.consume_once(queue, handler.clone(), &cancel).await {
                Ok(()) => return Ok(()),
                Err(e) if self.config.auto_recover && !cancel.is_cancelled() => {
                    tracing::warn!(queue, error = %e, attempt, "consumer lost, recovering");
                    tokio::time::sleep(backoff(self.config.recovery_interval_s, attempt)).await;
                    attempt = attempt.saturating_add(1);
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn consume_once<F, Fut>(
        &self,
        queue: &str,
        handler: F,
        cancel: &CancellationToken,
    ) -> Result<(), FabricError>
    where
        F: Fn(Vec<u8>, DeliveryCtx) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = HandlerOutcome> + Send + 'static,
    {
        let channel = self.pool.checkout().await?;
        channel
            .basic_qos(self.config.prefetch, BasicQosOptions::default())
            .await?;
        let mut deliveries = channel
            .basic_consume(
                queue,
                &format!("convoy-{}", uuid::Uuid::new_v4().simple()),
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;
        tracing::info!(queue, prefetch = self.config.prefetch, "consuming");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                delivery = deliveries.next() => {
                    let Some(delivery) = delivery else {
                        return Err(FabricError::Unavailable("consumer stream ended".to_string()));
                    };
                    let delivery = delivery?;
                    let ctx = DeliveryCtx {
                        message_id: delivery
                            .properties
                            .message_id()
                            .as_ref()
                            .map(|s| s.to_string()),
                        correlation_id: delivery
                            .properties
                            .correlation_id()
                            .as_ref()
                            .map(|s| s.to_string()),
                        delivery_count: if delivery.redelivered { 2 } else { 1 },
                        routing_key: delivery.routing_key.to_string(),
                    };
                    let handler = handler.clone();
                    tokio::spawn(async move {
                        let payload = delivery.data.clone();
                        let outcome = handler(payload, ctx).await;
                        let acked = match outcome {
                            HandlerOutcome::Ack => {
                                delivery.ack(BasicAckOptions::default()).await
                            }
                            HandlerOutcome::Requeue => {
                                delivery.reject(BasicRejectOptions { requeue: true }).await
                            }
                            HandlerOutcome::Dead => {
                                delivery.reject(BasicRejectOptions { requeue: false }).await
                            }
                        };
                        if let Err(e) = acked {
                            tracing::warn!(error = %e, "delivery settle failed");
                        }
                    });
                }
            }
        }
    }

    /// Single-shot polling receive. Returns `None` when the queue stays
    /// empty past `timeout`. The delivery is acked before returning.
    pub async fn receive(
        &self,
        queue: &str,
        timeout: Duration,
    ) -> Result<Option<(Vec<u8>, DeliveryCtx)>, FabricError> {
        let channel = self.pool.checkout().await?;
        let deadline = tokio::time::Instant::now() + timeout;
        let result = loop {
            let message = channel.basic_get(queue, BasicGetOptions::default()).await?;
            if let Some(message) = message {
                let ctx = DeliveryCtx {
                    message_id: message
                        .delivery
                        .properties
                        .message_id()
                        .as_ref()
                        .map(|s| s.to_string()),
                    correlation_id: message
                        .delivery
                        .properties
                        .correlation_id()
                        .as_ref()
                        .map(|s| s.to_string()),
                    delivery_count: if message.delivery.redelivered { 2 } else { 1 },
                    routing_key: message.delivery.routing_key.to_string(),
                };
                let payload = message.delivery.data.clone();
                message.delivery.ack(BasicAckOptions::default()).await?;
                break Some((payload, ctx));
            }
            if tokio::time::Instant::now() >= deadline {
                break None;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        };
        self.pool.checkin(channel);
        Ok(result)
    }
}
