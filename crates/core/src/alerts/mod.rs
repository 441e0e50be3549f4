//! Alert generation.
//!
//! A polling cycle samples quotes for the watched symbol set and classifies
//! them into alerts with severity tiers. Options-flow alerts are a heuristic
//! proxy derived from price/volume co-movement; no options-chain data is
//! involved and callers must not present them as such.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

mod engine;

pub use engine::AlertEngine;

/// Alert classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    PriceSpike,
    VolumeSpike,
    TechnicalBreakout,
    OptionsFlow,
}

/// Severity tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
}

/// One entry in the alert feed. Append-only within a session; retention is
/// handled by the engine's ring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    /// Deterministic per (ticker, kind, polling bucket) so the same market
    /// event re-sampled within one tick cannot duplicate.
    pub id: String,
    pub ticker: String,
    pub kind: AlertKind,
    pub severity: AlertSeverity,
    pub message: String,
    pub observed_value: f64,
    pub created_at: DateTime<Utc>,
}

/// What started a polling cycle. A manual refresh is the only path that
/// surfaces a whole-feed outage to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleTrigger {
    Scheduled,
    Manual,
}

/// Per-cycle accounting, logged after every run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CycleSummary {
    pub evaluated: usize,
    pub fetched: usize,
    pub failed: usize,
    pub emitted: usize,
}

/// Engine thresholds and retention knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AlertEngineConfig {
    /// Minimum |change %| for a price-spike alert.
    pub price_change_threshold: f64,
    /// Minimum volume/avg-volume ratio (percent) for a volume-spike alert.
    pub volume_spike_threshold: f64,
    /// Reserved for a future options-flow calibration; currently unread by
    /// the heuristic.
    pub options_flow_threshold: f64,
    /// Ring capacity, newest-first.
    pub alert_retention_count: usize,
    /// Entries older than this are purged on every merge.
    pub alert_retention_window_hours: i64,
    /// Polling cadence; also the alert-id dedup bucket width.
    pub refresh_interval_ms: u64,
    /// Per-symbol fetch budget within a cycle.
    #[serde(skip)]
    pub fetch_timeout: Duration,
}

impl Default for AlertEngineConfig {
    fn default() -> Self {
        Self {
            price_change_threshold: 3.0,
            volume_spike_threshold: 150.0,
            options_flow_threshold: 200.0,
            alert_retention_count: 20,
            alert_retention_window_hours: 24,
            refresh_interval_ms: 30_000,
            fetch_timeout: Duration::from_secs(5),
        }
    }
}

impl AlertEngineConfig {
    /// The continuous-alert variant trips on smaller moves.
    pub fn continuous() -> Self {
        Self {
            price_change_threshold: 2.0,
            ..Self::default()
        }
    }
}
