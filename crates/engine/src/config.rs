// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Workflow-engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Agents silent longer than this are considered disconnected.
    pub heartbeat_timeout_s: u64,
    /// Lease TTL on `workflow:{id}:lease`.
    pub lease_ttl_s: u64,
    /// Lease renewal cadence; must be well below the TTL.
    pub lease_renew_s: u64,
    /// Per-workflow dispatch cap when the plan does not set one.
    pub max_parallelism_default: usize,
    pub default_health_check_timeout_s: u64,
    /// Cap on in-flight commands across all workflows.
    pub max_inflight_global: usize,
    /// Window during which identical alerts are suppressed.
    pub alert_suppression_s: u64,
    /// How long a resumed workflow waits for replayed statuses before
    /// reissuing unanswered commands under a new attempt.
    pub resume_window_s: u64,
    /// Event-loop poll cadence; deadlines are clock-checked each tick.
    pub tick_interval_ms: u64,
    /// Backoff between publish retries when the broker is unavailable.
    pub publish_retry_s: u64,
    /// TTL on terminal workflow records in the store.
    pub terminal_record_ttl_s: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            heartbeat_timeout_s: 90,
            lease_ttl_s: 30,
            lease_renew_s: 10,
            max_parallelism_default: 16,
            default_health_check_timeout_s: 60,
            max_inflight_global: 256,
            alert_suppression_s: 300,
            resume_window_s: 10,
            tick_interval_ms: 100,
            publish_retry_s: 1,
            terminal_record_ttl_s: 86_400,
        }
    }
}

impl EngineConfig {
    pub fn lease_ttl(&self) -> Duration {
        Duration::from_secs(self.lease_ttl_s)
    }

    pub fn lease_renew(&self) -> Duration {
        Duration::from_secs(self.lease_renew_s)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(10))
    }

    pub fn resume_window(&self) -> Duration {
        Duration::from_secs(self.resume_window_s)
    }
}
