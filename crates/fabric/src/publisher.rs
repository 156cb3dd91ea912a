// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Publishing with confirms, batches, and rate limiting.

use crate::config::MessageProps;
use crate::error::{BatchError, FabricError};
use crate::limiter::RateLimiter;
use crate::pool::ChannelPool;
use lapin::options::BasicPublishOptions;
use lapin::publisher_confirm::Confirmation;
use lapin::types::{AMQPValue, FieldTable, ShortString};
use lapin::BasicProperties;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// The seam the engine publishes through. Implemented by [`AmqpPublisher`]
/// in production and `FakeFabric` in tests.
#[async_trait::async_trait]
pub trait FabricPublisher: Send + Sync {
    /// Publish one persistent message. Returns once the broker confirms
    /// acceptance, or fails after the per-call deadline.
    async fn publish(
        &self,
        routing_key: &str,
        payload: Vec<u8>,
        props: MessageProps,
    ) -> Result<(), FabricError>;

    /// Publish a batch on a single borrowed channel. Either all messages
    /// are confirmed or the call fails with per-message outcomes.
    async fn publish_batch(
        &self,
        routing_key: &str,
        payloads: Vec<Vec<u8>>,
    ) -> Result<(), FabricError>;
}

/// Production publisher over the channel pool.
pub struct AmqpPublisher {
    pool: Arc<ChannelPool>,
    limiter: Arc<RateLimiter>,
    exchange: String,
    publish_timeout: Duration,
}

impl AmqpPublisher {
    pub fn new(
        pool: Arc<ChannelPool>,
        limiter: Arc<RateLimiter>,
        exchange: impl Into<String>,
        publish_timeout: Duration,
    ) -> Self {
        Self { pool, limiter, exchange: exchange.into(), publish_timeout }
    }

    fn amqp_properties(props: &MessageProps) -> BasicProperties {
        // delivery_mode 2 = persistent
        let mut out = BasicProperties::default().with_delivery_mode(2);
        if let Some(priority) = props.priority {
            out = out.with_priority(priority.min(10));
        }
        if let Some(ref correlation_id) = props.correlation_id {
            out = out.with_correlation_id(correlation_id.as_str().into());
        }
        if let Some(expiration_ms) = props.expiration_ms {
            out = out.with_expiration(expiration_ms.to_string().into());
        }
        let message_id =
            props.message_id.clone().unwrap_or_else(|| Uuid::new_v4().to_string());
        out = out.with_message_id(message_id.into());
        if !props.headers.is_empty() {
            let mut table = FieldTable::default();
            for (key, value) in &props.headers {
                table.insert(
                    ShortString::from(key.as_str()),
                    AMQPValue::LongString(value.as_str().into()),
                );
            }
            out = out.with_headers(table);
        }
        out
    }

    async fn confirmed(
        &self,
        confirm: lapin::publisher_confirm::PublisherConfirm,
    ) -> Result<(), FabricError> {
        let confirmation = tokio::time::timeout(self.publish_timeout, confirm)
            .await
            .map_err(|_| FabricError::NotConfirmed("confirm deadline lapsed".to_string()))??;
        match confirmation {
            Confirmation::Nack(_) => {
                Err(FabricError::NotConfirmed("broker nacked".to_string()))
            }
            _ => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl FabricPublisher for AmqpPublisher {
    async fn publish(
        &self,
        routing_key: &str,
        payload: Vec<u8>,
        props: MessageProps,
    ) -> Result<(), FabricError> {
        self.limiter.acquire().await;
        let channel = self.pool.checkout().await?;
        let result = async {
            let confirm = channel
                .basic_publish(
                    &self.exchange,
                    routing_key,
                    BasicPublishOptions::default(),
                    &payload,
                    Self::amqp_properties(&props),
                )
                .await?;
            self.confirmed(confirm).await
        }
        .await;
        match &result {
            Ok(()) => {
                tracing::debug!(routing_key, bytes = payload.len(), "published");
                self.pool.checkin(channel);
            }
            Err(e) => tracing::warn!(routing_key, error = %e, "publish failed"),
        }
        result
    }

    async fn publish_batch(
        &self,
        routing_key: &str,
        payloads: Vec<Vec<u8>>,
    ) -> Result<(), FabricError> {
        if payloads.is_empty() {
            return Ok(());
        }
        for _ in 0..payloads.len() {
            self.limiter.acquire().await;
        }
        let channel = self.pool.checkout().await?;
        let total = payloads.len();

        let mut confirms = Vec::with_capacity(total);
        for payload in &payloads {
            let sent = channel
                .basic_publish(
                    &self.exchange,
                    routing_key,
                    BasicPublishOptions::default(),
                    payload,
                    Self::amqp_properties(&MessageProps::default()),
                )
                .await;
            confirms.push(sent);
        }

        let mut outcomes: Vec<Result<(), String>> = Vec::with_capacity(total);
        for sent in confirms {
            let outcome = match sent {
                Ok(confirm) => self.confirmed(confirm).await.map_err(|e| e.to_string()),
                Err(e) => Err(FabricError::from(e).to_string()),
            };
            outcomes.push(outcome);
        }

        let failed = outcomes.iter().filter(|o| o.is_err()).count();
        if failed == 0 {
            self.pool.checkin(channel);
            tracing::debug!(routing_key, total, "batch published");
            return Ok(());
        }
        let first_failure = outcomes.iter().position(|o| o.is_err()).unwrap_or(0);
        Err(FabricError::Batch(BatchError { total, failed, first_failure, outcomes }))
    }
}

#[cfg(test)]
#[path = "publisher_tests.rs"]
mod tests;
