//! Pure transforms from raw API fields to display values and classification bands.
//! Nothing in here fails: malformed input degrades to `None`, `0` or `"unknown"`.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;

use crate::config::{brier_thresholds, confidence_thresholds, volume_units};
use crate::types::{CalibrationBin, SignalKind};

// ---------------------------------------------------------------------------
// Outcome prices
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct OutcomePrices {
    pub yes: Option<f64>,
    pub no: Option<f64>,
}

/// Decode `outcomePrices` (`"[\"0.62\", \"0.38\"]"`). Any decode failure yields
/// both prices unknown; a missing second element only loses `no`.
pub fn parse_outcome_prices(raw: Option<&str>) -> OutcomePrices {
    raw.and_then(try_parse_outcome_prices).unwrap_or_default()
}

fn try_parse_outcome_prices(raw: &str) -> Option<OutcomePrices> {
    let values: Vec<Value> = serde_json::from_str(raw).ok()?;
    let yes = values.first().and_then(price_value)?;
    let no = match values.get(1) {
        None | Some(Value::Null) => None,
        Some(v) => Some(price_value(v)?),
    };
    Some(OutcomePrices { yes: Some(yes), no })
}

fn price_value(v: &Value) -> Option<f64> {
    let price = match v {
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    };
    price.filter(|p| p.is_finite())
}

/// Price in cents with one decimal, `--` when unknown.
pub fn format_price_cents(price: Option<f64>) -> String {
    match price {
        Some(p) => format!("{:.1}c", p * 100.0),
        None => "--".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Volume
// ---------------------------------------------------------------------------

/// Numeric volume, 0 when absent or not a finite number.
pub fn parse_volume(raw: Option<&str>) -> f64 {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// `1.2M`, `3.4K`, or the truncated integer below one thousand.
/// Values that would round up to `1000.0K` are shown as `1.0M`.
pub fn format_volume(v: f64) -> String {
    if v >= volume_units::MILLION || (v / volume_units::THOUSAND * 10.0).round() >= 10_000.0 {
        format!("{:.1}M", v / volume_units::MILLION)
    } else if v >= volume_units::THOUSAND {
        format!("{:.1}K", v / volume_units::THOUSAND)
    } else {
        format!("{}", v.trunc() as i64)
    }
}

/// Integer part with thousands separators: `1234567.8` → `1,234,567.8`.
pub fn group_thousands(v: f64) -> String {
    let rounded = (v * 1000.0).round() / 1000.0;
    let sign = if rounded < 0.0 { "-" } else { "" };
    let abs = rounded.abs();
    let int = abs.trunc() as u64;
    let digits = int.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let frac = format!("{:.3}", abs.fract());
    let frac = frac.trim_start_matches('0').trim_end_matches('0');
    if frac == "." {
        format!("{sign}{grouped}")
    } else {
        format!("{sign}{grouped}{frac}")
    }
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// Accepts RFC 3339 and naive ISO-8601 (read as UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// `"59m ago"`, `"23h ago"`, `"3d ago"`; floor division at each stage.
pub fn format_relative_time(ts: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(ts) = ts else {
        return "unknown".to_string();
    };
    let minutes = (now - ts).num_milliseconds().max(0) / 60_000;
    if minutes < 60 {
        return format!("{minutes}m ago");
    }
    let hours = minutes / 60;
    if hours < 24 {
        return format!("{hours}h ago");
    }
    format!("{}d ago", hours / 24)
}

// ---------------------------------------------------------------------------
// Confidence
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfidenceBand {
    High,
    Medium,
    Low,
}

impl ConfidenceBand {
    /// Absent confidence falls in the low band.
    pub fn from_confidence(confidence: Option<f64>) -> Self {
        use confidence_thresholds::*;
        match confidence {
            Some(c) if c >= HIGH_MIN => ConfidenceBand::High,
            Some(c) if c >= MEDIUM_MIN => ConfidenceBand::Medium,
            _ => ConfidenceBand::Low,
        }
    }
}

impl std::fmt::Display for ConfidenceBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConfidenceBand::High => "high",
            ConfidenceBand::Medium => "medium",
            ConfidenceBand::Low => "low",
        };
        write!(f, "{s}")
    }
}

pub fn confidence_label(confidence: Option<f64>) -> String {
    match confidence {
        Some(c) => format!("{:.0}%", c * 100.0),
        None => "N/A".to_string(),
    }
}

/// Progress indicator fill in [0, 1]; absent counts as empty.
pub fn confidence_fill(confidence: Option<f64>) -> f64 {
    confidence.unwrap_or(0.0).clamp(0.0, 1.0)
}

// ---------------------------------------------------------------------------
// Brier score
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrierBand {
    /// score < 0.1
    Good,
    /// 0.1 <= score < 0.2
    Fair,
    /// score >= 0.2
    Poor,
    /// No resolved markets to score.
    Unknown,
}

impl BrierBand {
    pub fn from_score(score: Option<f64>) -> Self {
        use brier_thresholds::*;
        match score {
            None => BrierBand::Unknown,
            Some(s) if s < GOOD_MAX => BrierBand::Good,
            Some(s) if s < FAIR_MAX => BrierBand::Fair,
            Some(_) => BrierBand::Poor,
        }
    }
}

impl std::fmt::Display for BrierBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BrierBand::Good => "good",
            BrierBand::Fair => "fair",
            BrierBand::Poor => "poor",
            BrierBand::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

pub fn format_brier(score: Option<f64>) -> String {
    match score {
        Some(s) => format!("{s:.4}"),
        None => "N/A".to_string(),
    }
}

pub fn resolved_markets_label(count: u64) -> String {
    let plural = if count == 1 { "" } else { "s" };
    format!("{count} resolved market{plural}")
}

// ---------------------------------------------------------------------------
// Calibration curve
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationPoint {
    pub predicted: f64,
    pub actual: f64,
    pub count: u64,
    /// `"10-20%"`
    pub label: String,
}

/// Chartable points: bins without an observed frequency are dropped, order kept.
pub fn calibration_points(bins: &[CalibrationBin]) -> Vec<CalibrationPoint> {
    bins.iter()
        .filter_map(|b| {
            b.actual_frequency.map(|actual| CalibrationPoint {
                predicted: b.avg_predicted,
                actual,
                count: b.count,
                label: format!("{:.0}-{:.0}%", b.bin_start * 100.0, b.bin_end * 100.0),
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Signal details
// ---------------------------------------------------------------------------

/// Type-specific detail lines for a signal card. Empty without metadata.
pub fn signal_details(kind: &SignalKind) -> Vec<String> {
    match kind {
        SignalKind::VolumeSpike(Some(meta)) => vec![
            format!("Z-Score: {}", meta.z_score),
            format!("Avg Volume: {}", group_thousands(meta.avg_volume)),
        ],
        SignalKind::PriceMomentum(Some(meta)) => vec![
            format!("Direction: {}", meta.direction),
            format!("Change: {:.1}%", meta.change * 100.0),
        ],
        SignalKind::VolumeSpike(None) | SignalKind::PriceMomentum(None) => Vec::new(),
    }
}
