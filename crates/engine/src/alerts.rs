// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Alert sink with suppression windows and recovery alerts.

use convoy_core::{Alert, Clock};
use convoy_fabric::{FabricPublisher, MessageProps};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Publishes alerts to `alert.{severity}.{category}`, suppressing
/// duplicates of the same `(category, title, servers, service)` tuple
/// within the window. Raising and later resolving a condition emits a
/// recovery alert.
pub struct AlertSink<F, C> {
    fabric: Arc<F>,
    clock: C,
    window: Duration,
    /// dedup key → (last published at, currently raised)
    seen: Mutex<HashMap<String, SeenAlert>>,
}

struct SeenAlert {
    last_published_ms: u64,
    raised: Alert,
}

impl<F: FabricPublisher, C: Clock> AlertSink<F, C> {
    pub fn new(fabric: Arc<F>, clock: C, window: Duration) -> Self {
        Self { fabric, clock, window, seen: Mutex::new(HashMap::new()) }
    }

    /// Publish unless an identical alert fired within the window.
    /// Best-effort: a broker failure is logged, never propagated.
    pub async fn raise(&self, mut alert: Alert) {
        let now = self.clock.epoch_ms();
        alert.at_ms = now;
        let key = alert.dedup_key();

        {
            let mut seen = self.seen.lock();
            if let Some(prior) = seen.get(&key) {
                if now.saturating_sub(prior.last_published_ms) < self.window.as_millis() as u64 {
                    tracing::debug!(title = %alert.title, "alert suppressed");
                    return;
                }
            }
            seen.insert(key, SeenAlert { last_published_ms: now, raised: alert.clone() });
        }

        self.publish(&alert).await;
    }

    /// Emit a recovery alert if the condition was previously raised.
    pub async fn resolve(&self, alert: &Alert) {
        let key = alert.dedup_key();
        let raised = self.seen.lock().remove(&key);
        let Some(prior) = raised else {
            return;
        };
        let recovery = Alert {
            message: format!("recovered: {}", prior.raised.message),
            at_ms: self.clock.epoch_ms(),
            recovery: true,
            severity: convoy_core::AlertSeverity::Info,
            ..prior.raised
        };
        self.publish(&recovery).await;
    }

    async fn publish(&self, alert: &Alert) {
        let payload = match serde_json::to_vec(alert) {
            Ok(p) => p,
            Err(e) => {
                tracing::error!(error = %e, "alert serialization failed");
                return;
            }
        };
        if let Err(e) = self
            .fabric
            .publish(&alert.routing_key(), payload, MessageProps::default())
            .await
        {
            tracing::warn!(error = %e, title = %alert.title, "alert publish failed");
        }
    }
}

#[cfg(test)]
#[path = "alerts_tests.rs"]
mod tests;
