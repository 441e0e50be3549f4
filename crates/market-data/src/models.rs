//! Quote models.
//!
//! Providers return loosely-shaped JSON with optional fields. The raw shape
//! is confined to [`RawQuote`]; everything downstream consumes the closed
//! [`Quote`] struct where an absent field has already been normalized to
//! zero, so rule code never branches on presence.

use serde::{Deserialize, Serialize};

/// Provider payload as it arrives on the wire. Every numeric field is
/// optional; missing and null are equivalent.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawQuote {
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub change: Option<f64>,
    #[serde(default)]
    pub change_percent: Option<f64>,
    #[serde(default)]
    pub volume: Option<f64>,
    #[serde(default)]
    pub avg_volume: Option<f64>,
    #[serde(default)]
    pub high52w: Option<f64>,
    #[serde(default)]
    pub low52w: Option<f64>,
}

/// A normalized per-symbol quote. Absent upstream fields are zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub symbol: String,
    pub price: f64,
    pub change: f64,
    pub change_percent: f64,
    pub volume: f64,
    pub avg_volume: f64,
    pub high52w: f64,
    pub low52w: f64,
}

impl Quote {
    /// Normalize a raw payload for `symbol`. The raw payload's own symbol
    /// field, when present, wins over the requested one (providers may
    /// canonicalize suffixes).
    pub fn from_raw(symbol: &str, raw: RawQuote) -> Self {
        Self {
            symbol: raw.symbol.unwrap_or_else(|| symbol.to_string()),
            price: raw.price.unwrap_or(0.0),
            change: raw.change.unwrap_or(0.0),
            change_percent: raw.change_percent.unwrap_or(0.0),
            volume: raw.volume.unwrap_or(0.0),
            avg_volume: raw.avg_volume.unwrap_or(0.0),
            high52w: raw.high52w.unwrap_or(0.0),
            low52w: raw.low52w.unwrap_or(0.0),
        }
    }

    /// Ratio of current to average volume as a percentage, or `None` when
    /// average volume is unknown.
    pub fn volume_ratio_percent(&self) -> Option<f64> {
        if self.avg_volume > 0.0 {
            Some(self.volume / self.avg_volume * 100.0)
        } else {
            None
        }
    }
}
