// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Alert events emitted by the workflow engine and fleet registry.

use serde::{Deserialize, Serialize};

/// Alert severity, used for routing (`alert.{severity}.{category}`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

crate::simple_display! {
    AlertSeverity {
        Info => "info",
        Warning => "warning",
        Critical => "critical",
    }
}

/// Alert category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertCategory {
    Deployment,
    Fleet,
    System,
}

crate::simple_display! {
    AlertCategory {
        Deployment => "deployment",
        Fleet => "fleet",
        System => "system",
    }
}

/// An alert. Duplicate `(category, title, server, service)` tuples are
/// suppressed within a configurable window by the publishing side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub severity: AlertSeverity,
    pub category: AlertCategory,
    pub title: String,
    pub message: String,
    /// Affected server set (agent id strings).
    #[serde(default)]
    pub servers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    pub at_ms: u64,
    /// Marks the alert that clears a previously raised condition.
    #[serde(default)]
    pub recovery: bool,
}

impl Alert {
    pub fn new(
        severity: AlertSeverity,
        category: AlertCategory,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            category,
            title: title.into(),
            message: message.into(),
            servers: Vec::new(),
            service: None,
            at_ms: 0,
            recovery: false,
        }
    }

    crate::setters! {
        set {
            servers: Vec<String>,
            at_ms: u64,
            recovery: bool,
        }
        option {
            service: String,
        }
    }

    /// Routing key: `alert.{severity}.{category}`.
    pub fn routing_key(&self) -> String {
        format!("alert.{}.{}", self.severity, self.category)
    }

    /// Suppression key: identical tuples are rate-limited.
    pub fn dedup_key(&self) -> String {
        format!(
            "{}|{}|{}|{}",
            self.category,
            self.title,
            self.servers.join(","),
            self.service.as_deref().unwrap_or("")
        )
    }
}

#[cfg(test)]
#[path = "alert_tests.rs"]
mod tests;
