// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory fabric for tests: records publishes, simulates outages.

use crate::config::MessageProps;
use crate::error::FabricError;
use crate::publisher::FabricPublisher;
use parking_lot::Mutex;
use std::sync::Arc;

/// A message recorded by [`FakeFabric`].
#[derive(Debug, Clone)]
pub struct PublishedMessage {
    pub routing_key: String,
    pub payload: Vec<u8>,
    pub props: MessageProps,
}

impl PublishedMessage {
    /// Deserialize the payload as JSON.
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> T {
        match serde_json::from_slice(&self.payload) {
            Ok(v) => v,
            Err(e) => unreachable!("fake fabric payload not {}: {}", std::any::type_name::<T>(), e),
        }
    }
}

#[derive(Default)]
struct Inner {
    published: Vec<PublishedMessage>,
    available: bool,
    publish_count: u64,
}

/// Test double for the broker. Clones share state.
#[derive(Clone)]
pub struct FakeFabric {
    inner: Arc<Mutex<Inner>>,
}

impl FakeFabric {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                published: Vec::new(),
                available: true,
                publish_count: 0,
            })),
        }
    }

    /// Simulate broker outage/recovery.
    pub fn set_available(&self, available: bool) {
        self.inner.lock().available = available;
    }

    /// Every message published so far, in order.
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.inner.lock().published.clone()
    }

    /// Messages whose routing key starts with `prefix`.
    pub fn published_to(&self, prefix: &str) -> Vec<PublishedMessage> {
        self.inner
            .lock()
            .published
            .iter()
            .filter(|m| m.routing_key.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Drain and return all recorded messages.
    pub fn take_published(&self) -> Vec<PublishedMessage> {
        std::mem::take(&mut self.inner.lock().published)
    }

    pub fn publish_count(&self) -> u64 {
        self.inner.lock().publish_count
    }
}

impl Default for FakeFabric {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl FabricPublisher for FakeFabric {
    async fn publish(
        &self,
        routing_key: &str,
        payload: Vec<u8>,
        props: MessageProps,
    ) -> Result<(), FabricError> {
        let mut inner = self.inner.lock();
        if !inner.available {
            return Err(FabricError::Unavailable("fake broker down".to_string()));
        }
        inner.publish_count += 1;
        inner.published.push(PublishedMessage {
            routing_key: routing_key.to_string(),
            payload,
            props,
        });
        Ok(())
    }

    async fn publish_batch(
        &self,
        routing_key: &str,
        payloads: Vec<Vec<u8>>,
    ) -> Result<(), FabricError> {
        for payload in payloads {
            self.publish(routing_key, payload, MessageProps::default()).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
