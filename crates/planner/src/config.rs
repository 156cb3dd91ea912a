// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Strategy configuration and validation.

use crate::error::PlanError;
use convoy_core::StrategyKind;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Wave partitioning policy for rolling deployments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaveStrategy {
    FixedSize,
    Percentage,
}

impl WaveStrategy {
    /// Parse the raw config string; unknown values are a validation error.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "fixed_size" | "FixedSize" => Some(WaveStrategy::FixedSize),
            "percentage" | "Percentage" => Some(WaveStrategy::Percentage),
            _ => None,
        }
    }
}

/// Rolling-specific thresholds (`RollingConfiguration`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RollingConfig {
    /// Percent of a wave allowed to fail before the phase fails.
    pub max_failure_threshold_pct: u8,
    pub max_retries: u32,
}

impl Default for RollingConfig {
    fn default() -> Self {
        Self { max_failure_threshold_pct: 0, max_retries: 1 }
    }
}

/// Wave construction settings (`WaveConfiguration`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveConfig {
    /// `fixed_size` or `percentage`; kept raw so validation can name bad
    /// values instead of failing deserialization.
    pub strategy: String,
    pub wave_size: u32,
    pub wave_percentage: f64,
    pub wave_interval_s: u64,
    pub parallel_within_wave: bool,
    pub max_parallelism: usize,
    pub delay_between_servers_s: u64,
}

impl Default for WaveConfig {
    fn default() -> Self {
        Self {
            strategy: "fixed_size".to_string(),
            wave_size: 1,
            wave_percentage: 10.0,
            wave_interval_s: 0,
            parallel_within_wave: true,
            max_parallelism: 8,
            delay_between_servers_s: 0,
        }
    }
}

/// Shared health-gate settings (`HealthCheckConfiguration`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    pub timeout_s: u64,
    /// Fraction of servers (0, 1] that must succeed.
    pub success_ratio: f64,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self { timeout_s: 60, success_ratio: 1.0 }
    }
}

/// Canary cohort settings; defaults give 5% / 25% / remainder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanaryConfig {
    pub canary_percentage: f64,
    pub secondary_percentage: f64,
    pub observation_s: u64,
    /// Pause for external resume after each gated cohort.
    pub manual_gates: bool,
}

impl Default for CanaryConfig {
    fn default() -> Self {
        Self {
            canary_percentage: 5.0,
            secondary_percentage: 25.0,
            observation_s: 60,
            manual_gates: true,
        }
    }
}

/// The full strategy configuration submitted with a request.
///
/// Sections are optional at the serde layer; [`StrategyConfig::validate`]
/// enforces which are required for the chosen strategy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rolling: Option<RollingConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wave: Option<WaveConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_check: Option<HealthCheckConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canary: Option<CanaryConfig>,
}

impl StrategyConfig {
    /// Validate for a strategy, collecting every violation.
    pub fn validate(&self, strategy: StrategyKind) -> Result<(), PlanError> {
        let mut violations = Vec::new();

        let health = self.health_check.as_ref();
        match health {
            None => violations.push("HealthCheckConfiguration is required".to_string()),
            Some(h) => {
                if h.timeout_s == 0 {
                    violations.push("health check timeout must be positive".to_string());
                }
                if h.success_ratio <= 0.0 || h.success_ratio > 1.0 {
                    violations.push(format!(
                        "success ratio {} outside (0, 1]",
                        h.success_ratio
                    ));
                }
            }
        }

        if strategy == StrategyKind::Rolling {
            if self.rolling.is_none() {
                violations.push("RollingConfiguration is required".to_string());
            }
            if let Some(rolling) = &self.rolling {
                if rolling.max_failure_threshold_pct > 100 {
                    violations.push(format!(
                        "failure threshold {}% outside 0..=100",
                        rolling.max_failure_threshold_pct
                    ));
                }
            }
            match &self.wave {
                None => violations.push("WaveConfiguration is required".to_string()),
                Some(wave) => match WaveStrategy::parse(&wave.strategy) {
                    None => violations.push(format!("unknown wave strategy {:?}", wave.strategy)),
                    Some(WaveStrategy::FixedSize) if wave.wave_size < 1 => {
                        violations.push(format!("wave size {} must be >= 1", wave.wave_size));
                    }
                    Some(WaveStrategy::Percentage)
                        if wave.wave_percentage <= 0.0 || wave.wave_percentage > 100.0 =>
                    {
                        violations.push(format!(
                            "wave percentage {} outside (0, 100]",
                            wave.wave_percentage
                        ));
                    }
                    Some(_) => {}
                },
            }
        }

        if strategy == StrategyKind::Canary {
            if let Some(canary) = &self.canary {
                if canary.canary_percentage <= 0.0 || canary.canary_percentage > 100.0 {
                    violations.push(format!(
                        "canary percentage {} outside (0, 100]",
                        canary.canary_percentage
                    ));
                }
                if canary.secondary_percentage <= 0.0 || canary.secondary_percentage > 100.0 {
                    violations.push(format!(
                        "secondary percentage {} outside (0, 100]",
                        canary.secondary_percentage
                    ));
                }
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(PlanError::Invalid(violations))
        }
    }

    /// Health gate derived from the (validated) health-check section.
    pub fn gate(&self) -> convoy_core::HealthGate {
        let health = self.health_check.clone().unwrap_or_default();
        convoy_core::HealthGate {
            timeout: Duration::from_secs(health.timeout_s),
            success_ratio: health.success_ratio,
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
