use chrono::{DateTime, Utc};

use crate::metrics::{
    confidence_fill, confidence_label, format_brier, format_price_cents, format_relative_time,
    format_volume, parse_outcome_prices, parse_volume, signal_details, BrierBand, ConfidenceBand,
    OutcomePrices,
};
use crate::types::{CategoryBreakdown, Market, Signal};

// ---------------------------------------------------------------------------
// Market rows
// ---------------------------------------------------------------------------

/// A market with its encoded fields decoded once for display.
#[derive(Debug, Clone)]
pub struct MarketRow<'a> {
    pub market: &'a Market,
    pub prices: OutcomePrices,
    pub volume: f64,
}

impl<'a> MarketRow<'a> {
    pub fn new(market: &'a Market) -> Self {
        Self {
            market,
            prices: parse_outcome_prices(market.outcome_prices.as_deref()),
            volume: parse_volume(market.volume.as_deref()),
        }
    }

    pub fn category_label(&self) -> &str {
        self.market.category.as_deref().unwrap_or("--")
    }

    pub fn yes_label(&self) -> String {
        format_price_cents(self.prices.yes)
    }

    pub fn no_label(&self) -> String {
        format_price_cents(self.prices.no)
    }

    pub fn volume_label(&self) -> String {
        format!("${}", format_volume(self.volume))
    }
}

// ---------------------------------------------------------------------------
// Signal cards
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SignalCard<'a> {
    pub signal: &'a Signal,
    pub band: ConfidenceBand,
}

impl<'a> SignalCard<'a> {
    pub fn new(signal: &'a Signal) -> Self {
        Self { signal, band: ConfidenceBand::from_confidence(signal.confidence) }
    }

    pub fn label(&self) -> &'static str {
        self.signal.signal_type().label()
    }

    pub fn title(&self) -> &str {
        self.signal.display_title()
    }

    pub fn time_ago(&self, now: DateTime<Utc>) -> String {
        format_relative_time(self.signal.detected_at, now)
    }

    pub fn details(&self) -> Vec<String> {
        signal_details(&self.signal.kind)
    }

    pub fn confidence_label(&self) -> String {
        confidence_label(self.signal.confidence)
    }

    pub fn confidence_fill(&self) -> f64 {
        confidence_fill(self.signal.confidence)
    }
}

// ---------------------------------------------------------------------------
// Category rows
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CategoryRow<'a> {
    pub breakdown: &'a CategoryBreakdown,
    pub band: BrierBand,
}

impl<'a> CategoryRow<'a> {
    pub fn new(breakdown: &'a CategoryBreakdown) -> Self {
        Self { breakdown, band: BrierBand::from_score(Some(breakdown.brier_score)) }
    }

    pub fn score_label(&self) -> String {
        format_brier(Some(self.breakdown.brier_score))
    }
}
