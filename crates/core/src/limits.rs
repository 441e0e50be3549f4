//! Plan tiers and quota enforcement.
//!
//! Limits are resolved once per session from the user's subscription state
//! and held immutable until an explicit refresh re-resolves them. A limit of
//! `-1` means unlimited; `0` means the feature is disabled outright.

use serde::{Deserialize, Serialize};

/// Sentinel for "no limit".
pub const UNLIMITED: i64 = -1;

/// Features a plan can cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanFeature {
    Watchlist,
    Alerts,
    OptionsFlow,
}

/// Per-plan feature limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanLimits {
    pub plan_name: String,
    pub max_watchlist: i64,
    pub max_alerts: i64,
    pub max_options_flow: i64,
}

/// Result of trimming a collection to its plan limit. Always usable; never
/// an error.
#[derive(Debug, Clone, PartialEq)]
pub struct QuotaEnforcement<T> {
    pub kept: Vec<T>,
    pub dropped_count: usize,
}

impl PlanLimits {
    pub fn free() -> Self {
        Self {
            plan_name: "free".to_string(),
            max_watchlist: 10,
            max_alerts: 20,
            max_options_flow: 0,
        }
    }

    pub fn pro() -> Self {
        Self {
            plan_name: "pro".to_string(),
            max_watchlist: 50,
            max_alerts: 100,
            max_options_flow: 20,
        }
    }

    pub fn premium() -> Self {
        Self {
            plan_name: "premium".to_string(),
            max_watchlist: UNLIMITED,
            max_alerts: UNLIMITED,
            max_options_flow: UNLIMITED,
        }
    }

    /// Resolve limits from a subscription tier name. Unknown tiers fall back
    /// to the free plan.
    pub fn for_plan(tier: &str) -> Self {
        match tier.to_ascii_lowercase().as_str() {
            "premium" => Self::premium(),
            "pro" => Self::pro(),
            _ => Self::free(),
        }
    }

    /// The cap for a feature, or `None` when unlimited.
    pub fn limit_for(&self, feature: PlanFeature) -> Option<usize> {
        let raw = match feature {
            PlanFeature::Watchlist => self.max_watchlist,
            PlanFeature::Alerts => self.max_alerts,
            PlanFeature::OptionsFlow => self.max_options_flow,
        };
        if raw < 0 {
            None
        } else {
            Some(raw as usize)
        }
    }

    /// Strict at-limit check: adding is blocked once `current_count` reaches
    /// the cap, not only past it.
    pub fn can_add(&self, feature: PlanFeature, current_count: usize) -> bool {
        match self.limit_for(feature) {
            None => true,
            Some(limit) => current_count < limit,
        }
    }

    /// Trim `items` to the feature's cap, retaining the most-recently-added
    /// `limit` items (collections are kept in insertion order, so the suffix
    /// is the newest).
    pub fn enforce<T>(&self, feature: PlanFeature, mut items: Vec<T>) -> QuotaEnforcement<T> {
        let limit = match self.limit_for(feature) {
            None => {
                return QuotaEnforcement {
                    kept: items,
                    dropped_count: 0,
                }
            }
            Some(limit) => limit,
        };
        if items.len() <= limit {
            return QuotaEnforcement {
                kept: items,
                dropped_count: 0,
            };
        }
        let cut = items.len() - limit;
        let kept = items.split_off(cut);
        QuotaEnforcement {
            kept,
            dropped_count: cut,
        }
    }
}
