use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::metrics::parse_timestamp;

// ---------------------------------------------------------------------------
// Signals
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalType {
    VolumeSpike,
    PriceMomentum,
}

impl SignalType {
    /// Wire value used for the `signal_type` query parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalType::VolumeSpike => "volume_spike",
            SignalType::PriceMomentum => "price_momentum",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SignalType::VolumeSpike => "Volume Spike",
            SignalType::PriceMomentum => "Price Momentum",
        }
    }
}

impl std::fmt::Display for SignalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeSpikeMeta {
    pub current_volume: f64,
    pub avg_volume: f64,
    pub std_dev: f64,
    pub z_score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Up => write!(f, "up"),
            Direction::Down => write!(f, "down"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceMomentumMeta {
    pub current_price: f64,
    pub earlier_price: f64,
    pub change: f64,
    pub direction: Direction,
}

/// Signal type together with its type-matched payload. The payload is `None`
/// when the server sent no metadata or metadata of the wrong shape.
#[derive(Debug, Clone, PartialEq)]
pub enum SignalKind {
    VolumeSpike(Option<VolumeSpikeMeta>),
    PriceMomentum(Option<PriceMomentumMeta>),
}

impl SignalKind {
    pub fn signal_type(&self) -> SignalType {
        match self {
            SignalKind::VolumeSpike(_) => SignalType::VolumeSpike,
            SignalKind::PriceMomentum(_) => SignalType::PriceMomentum,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "RawSignal")]
pub struct Signal {
    pub id: String,
    /// Empty for history payloads, which are already scoped to one market.
    pub market_id: String,
    pub title: Option<String>,
    pub confidence: Option<f64>,
    pub detected_at: Option<DateTime<Utc>>,
    pub kind: SignalKind,
}

impl Signal {
    pub fn signal_type(&self) -> SignalType {
        self.kind.signal_type()
    }

    /// Card heading: the title when present, otherwise the market id.
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.market_id)
    }
}

/// Wire shape of a signal: `signal_type` and `metadata` arrive as siblings.
#[derive(Deserialize)]
struct RawSignal {
    #[serde(deserialize_with = "de::text")]
    id: String,
    #[serde(default)]
    market_id: String,
    #[serde(default)]
    title: Option<String>,
    signal_type: SignalType,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    detected_at: Option<String>,
    #[serde(default)]
    metadata: Option<serde_json::Value>,
}

impl From<RawSignal> for Signal {
    fn from(raw: RawSignal) -> Self {
        let kind = match raw.signal_type {
            SignalType::VolumeSpike => {
                SignalKind::VolumeSpike(decode_metadata(&raw.id, raw.metadata))
            }
            SignalType::PriceMomentum => {
                SignalKind::PriceMomentum(decode_metadata(&raw.id, raw.metadata))
            }
        };

        Signal {
            detected_at: raw.detected_at.as_deref().and_then(parse_timestamp),
            id: raw.id,
            market_id: raw.market_id,
            title: raw.title,
            confidence: raw.confidence,
            kind,
        }
    }
}

fn decode_metadata<T: serde::de::DeserializeOwned>(
    signal_id: &str,
    metadata: Option<serde_json::Value>,
) -> Option<T> {
    let value = metadata.filter(|v| !v.is_null())?;
    match serde_json::from_value(value) {
        Ok(meta) => Some(meta),
        Err(e) => {
            debug!(signal_id, "metadata does not match signal type: {e}");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Markets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Market {
    #[serde(deserialize_with = "de::text")]
    pub id: String,
    #[serde(default, deserialize_with = "de::text_or_empty")]
    pub question: String,
    #[serde(default)]
    pub category: Option<String>,
    /// Decimal amount as text. May be absent or non-numeric.
    #[serde(default, deserialize_with = "de::opt_text")]
    pub volume: Option<String>,
    /// JSON-encoded array of decimal strings, `[yes, no]` by convention.
    #[serde(default, rename = "outcomePrices", deserialize_with = "de::opt_text")]
    pub outcome_prices: Option<String>,
}

/// One page of `/markets`.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(from = "RawMarketsPage")]
pub struct MarketsPage {
    pub markets: Vec<Market>,
    pub total: u64,
}

/// Older deployments answer `/markets` with a bare array.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawMarketsPage {
    Paged { markets: Vec<Market>, total: u64 },
    Bare(Vec<Market>),
}

impl From<RawMarketsPage> for MarketsPage {
    fn from(raw: RawMarketsPage) -> Self {
        match raw {
            RawMarketsPage::Paged { markets, total } => MarketsPage { markets, total },
            RawMarketsPage::Bare(markets) => MarketsPage {
                total: markets.len() as u64,
                markets,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Calibration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationBin {
    pub bin_start: f64,
    pub bin_end: f64,
    pub avg_predicted: f64,
    /// None when no resolved market fell in the bucket.
    #[serde(default)]
    pub actual_frequency: Option<f64>,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryBreakdown {
    pub category: String,
    pub brier_score: f64,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CalibrationData {
    pub brier_score: Option<f64>,
    #[serde(default)]
    pub market_count: u64,
    #[serde(default)]
    pub calibration_curve: Vec<CalibrationBin>,
    #[serde(default)]
    pub category_breakdown: Vec<CategoryBreakdown>,
}

// ---------------------------------------------------------------------------
// Lenient field decoders
// ---------------------------------------------------------------------------

mod de {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    fn value_to_text(v: Value) -> Option<String> {
        match v {
            Value::Null => None,
            Value::String(s) => Some(s),
            other => Some(other.to_string()),
        }
    }

    pub fn opt_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(Option::<Value>::deserialize(d)?.and_then(value_to_text))
    }

    pub fn text_or_empty<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        Ok(opt_text(d)?.unwrap_or_default())
    }

    /// Identifiers arrive as strings or bare numbers.
    pub fn text<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        match Value::deserialize(d)? {
            Value::String(s) => Ok(s),
            Value::Number(n) => Ok(n.to_string()),
            other => Err(serde::de::Error::custom(format!(
                "expected string or number id, got {other}"
            ))),
        }
    }
}
