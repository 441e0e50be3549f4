//! Polling alert engine.
//!
//! Each cycle fires all per-symbol quote fetches concurrently, awaits them
//! all, evaluates threshold rules per quote, and merges the new alerts into
//! the bounded newest-first ring in one non-interleaved step. A single
//! symbol failing (or timing out) is skipped silently; only a manual refresh
//! where every fetch failed surfaces an error.

use chrono::{Duration as ChronoDuration, Utc};
use futures::future::join_all;
use log::{debug, warn};
use std::collections::VecDeque;
use std::sync::{Arc, RwLock};

use watchdeck_market_data::{MarketDataProvider, Quote};

use crate::alerts::{Alert, AlertEngineConfig, AlertKind, AlertSeverity, CycleSummary, CycleTrigger};
use crate::errors::{Error, Result};
use crate::sync::normalize_ticker;

/// Price band around the 52-week extremes that counts as a breakout.
const BREAKOUT_HIGH_BAND: f64 = 0.98;
const BREAKOUT_LOW_BAND: f64 = 1.02;

/// Volume multiple over average that the options-flow heuristic requires.
const FLOW_VOLUME_MULTIPLE: f64 = 1.2;
/// Minimum |change %| for the options-flow heuristic.
const FLOW_CHANGE_FLOOR: f64 = 1.0;

pub struct AlertEngine {
    feed: Arc<dyn MarketDataProvider>,
    config: AlertEngineConfig,
    ring: RwLock<VecDeque<Alert>>,
}

impl AlertEngine {
    pub fn new(feed: Arc<dyn MarketDataProvider>, config: AlertEngineConfig) -> Self {
        Self {
            feed,
            config,
            ring: RwLock::new(VecDeque::new()),
        }
    }

    pub fn config(&self) -> &AlertEngineConfig {
        &self.config
    }

    /// Run one polling cycle over `symbols`.
    ///
    /// Fetches run concurrently with a per-symbol timeout; each failure is
    /// logged and skipped. The merge into the ring happens once, after all
    /// fetches settle.
    pub async fn run_cycle(&self, symbols: &[String], trigger: CycleTrigger) -> Result<CycleSummary> {
        let fetches = symbols.iter().map(|symbol| async move {
            let result =
                tokio::time::timeout(self.config.fetch_timeout, self.feed.quote(symbol)).await;
            (symbol.as_str(), result)
        });
        let settled = join_all(fetches).await;

        let now = Utc::now();
        let mut summary = CycleSummary {
            evaluated: symbols.len(),
            ..CycleSummary::default()
        };
        let mut fresh = Vec::new();

        for (symbol, result) in settled {
            let quote = match result {
                Ok(Ok(quote)) => quote,
                Ok(Err(e)) => {
                    debug!("quote fetch for '{}' failed, skipping this cycle: {}", symbol, e);
                    summary.failed += 1;
                    continue;
                }
                Err(_) => {
                    debug!("quote fetch for '{}' timed out, skipping this cycle", symbol);
                    summary.failed += 1;
                    continue;
                }
            };
            summary.fetched += 1;
            fresh.extend(self.evaluate(&quote, now));
        }

        if trigger == CycleTrigger::Manual && !symbols.is_empty() && summary.fetched == 0 {
            warn!("manual refresh: all {} quote fetches failed", symbols.len());
            return Err(Error::FeedUnavailable);
        }

        summary.emitted = self.merge(fresh);
        debug!(
            "alert cycle done: {} symbols, {} fetched, {} failed, {} new alerts",
            summary.evaluated, summary.fetched, summary.failed, summary.emitted
        );
        Ok(summary)
    }

    /// Apply all threshold rules to one quote.
    fn evaluate(&self, quote: &Quote, now: chrono::DateTime<Utc>) -> Vec<Alert> {
        let mut alerts = Vec::new();
        let ticker = normalize_ticker(&quote.symbol);
        let change = quote.change_percent;

        // Price movement
        if change.abs() >= self.config.price_change_threshold {
            let severity = if change.abs() > 5.0 {
                AlertSeverity::High
            } else if change.abs() > 3.0 {
                AlertSeverity::Medium
            } else {
                AlertSeverity::Low
            };
            alerts.push(self.alert(
                &ticker,
                AlertKind::PriceSpike,
                severity,
                format!("{} moved {:+.2}% today", ticker, change),
                change,
                now,
            ));
        }

        // Volume spike; needs a known average
        if let Some(ratio) = quote.volume_ratio_percent() {
            if ratio >= self.config.volume_spike_threshold {
                let severity = if ratio > 300.0 {
                    AlertSeverity::High
                } else if ratio > 200.0 {
                    AlertSeverity::Medium
                } else {
                    AlertSeverity::Low
                };
                alerts.push(self.alert(
                    &ticker,
                    AlertKind::VolumeSpike,
                    severity,
                    format!("{} volume at {:.0}% of average", ticker, ratio),
                    ratio,
                    now,
                ));
            }
        }

        // 52-week proximity; zero-filled absent extremes never fire
        if quote.high52w > 0.0 && quote.price >= BREAKOUT_HIGH_BAND * quote.high52w {
            alerts.push(self.alert(
                &ticker,
                AlertKind::TechnicalBreakout,
                AlertSeverity::High,
                format!("{} approaching its 52-week high", ticker),
                quote.price,
                now,
            ));
        }
        if quote.low52w > 0.0 && quote.price <= BREAKOUT_LOW_BAND * quote.low52w {
            alerts.push(self.alert(
                &ticker,
                AlertKind::TechnicalBreakout,
                AlertSeverity::High,
                format!("{} near its 52-week low", ticker),
                quote.price,
                now,
            ));
        }

        // Options-flow proxy: price/volume co-movement, not chain data
        if change.abs() >= FLOW_CHANGE_FLOOR
            && quote.avg_volume > 0.0
            && quote.volume > FLOW_VOLUME_MULTIPLE * quote.avg_volume
        {
            let direction = if change >= 0.0 { "bullish" } else { "bearish" };
            let severity = if change.abs() > 3.0 {
                AlertSeverity::High
            } else {
                AlertSeverity::Medium
            };
            let ratio = quote.volume / quote.avg_volume * 100.0;
            alerts.push(self.alert(
                &ticker,
                AlertKind::OptionsFlow,
                severity,
                format!(
                    "{} unusual {} activity: volume {:.0}% of average on a {:+.2}% move",
                    ticker, direction, ratio, change
                ),
                ratio,
                now,
            ));
        }

        alerts
    }

    fn alert(
        &self,
        ticker: &str,
        kind: AlertKind,
        severity: AlertSeverity,
        message: String,
        observed_value: f64,
        created_at: chrono::DateTime<Utc>,
    ) -> Alert {
        Alert {
            id: self.alert_id(ticker, kind, created_at),
            ticker: ticker.to_string(),
            kind,
            severity,
            message,
            observed_value,
            created_at,
        }
    }

    /// Bucket the timestamp by the polling cadence so re-sampling the same
    /// event within one tick derives the same id.
    fn alert_id(&self, ticker: &str, kind: AlertKind, at: chrono::DateTime<Utc>) -> String {
        let bucket_ms = self.config.refresh_interval_ms.max(1) as i64;
        let bucket = at.timestamp_millis() / bucket_ms;
        let kind_tag = match kind {
            AlertKind::PriceSpike => "price_spike",
            AlertKind::VolumeSpike => "volume_spike",
            AlertKind::TechnicalBreakout => "technical_breakout",
            AlertKind::OptionsFlow => "options_flow",
        };
        format!("{}:{}:{}", ticker, kind_tag, bucket)
    }

    /// Merge new alerts into the ring: purge expired entries, drop ids that
    /// are already present, prepend newest-first, cap the total. Returns how
    /// many entries were actually inserted.
    fn merge(&self, fresh: Vec<Alert>) -> usize {
        let mut ring = self.ring.write().unwrap_or_else(|e| e.into_inner());

        let cutoff = Utc::now() - ChronoDuration::hours(self.config.alert_retention_window_hours);
        ring.retain(|alert| alert.created_at >= cutoff);

        let mut inserted = 0;
        for alert in fresh {
            if ring.iter().any(|existing| existing.id == alert.id) {
                continue;
            }
            ring.push_front(alert);
            inserted += 1;
        }
        while ring.len() > self.config.alert_retention_count {
            ring.pop_back();
        }
        inserted
    }

    /// The current feed, newest first.
    pub fn all_alerts(&self) -> Vec<Alert> {
        self.ring
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    pub fn by_kind(&self, kind: AlertKind) -> Vec<Alert> {
        self.ring
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|a| a.kind == kind)
            .cloned()
            .collect()
    }

    /// Price, volume, and breakout alerts; everything except the
    /// options-flow heuristic.
    pub fn price_movement_alerts(&self) -> Vec<Alert> {
        self.ring
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|a| a.kind != AlertKind::OptionsFlow)
            .cloned()
            .collect()
    }

    pub fn options_flow_alerts(&self) -> Vec<Alert> {
        self.by_kind(AlertKind::OptionsFlow)
    }
}
