use crate::query::ActiveSignalsQuery;
use crate::types::SignalType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignalFilter {
    #[default]
    All,
    VolumeSpike,
    PriceMomentum,
}

impl SignalFilter {
    pub const ALL: [SignalFilter; 3] =
        [SignalFilter::All, SignalFilter::VolumeSpike, SignalFilter::PriceMomentum];

    pub fn signal_type(self) -> Option<SignalType> {
        match self {
            SignalFilter::All => None,
            SignalFilter::VolumeSpike => Some(SignalType::VolumeSpike),
            SignalFilter::PriceMomentum => Some(SignalType::PriceMomentum),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SignalFilter::All => "All",
            SignalFilter::VolumeSpike => "Volume Spike",
            SignalFilter::PriceMomentum => "Price Momentum",
        }
    }

    pub fn next(self) -> Self {
        match self {
            SignalFilter::All => SignalFilter::VolumeSpike,
            SignalFilter::VolumeSpike => SignalFilter::PriceMomentum,
            SignalFilter::PriceMomentum => SignalFilter::All,
        }
    }
}

/// Signal type selection. Filtering happens on the server: the selection only
/// decides which active-signals query is live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterState {
    filter: SignalFilter,
    limit: u32,
}

impl FilterState {
    pub fn new(limit: u32) -> Self {
        Self { filter: SignalFilter::All, limit }
    }

    pub fn filter(&self) -> SignalFilter {
        self.filter
    }

    /// Returns true when the selection changed (and the query with it).
    pub fn select(&mut self, filter: SignalFilter) -> bool {
        let changed = self.filter != filter;
        self.filter = filter;
        changed
    }

    pub fn query(&self) -> ActiveSignalsQuery {
        ActiveSignalsQuery { limit: self.limit, signal_type: self.filter.signal_type() }
    }
}
