use std::fmt::Debug;
use std::hash::Hash;
use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::config::{
    CALIBRATION_POLL_SECS, DEFAULT_HISTORY_LIMIT, DEFAULT_SIGNALS_LIMIT, MARKETS_PAGE_SIZE,
    MARKETS_POLL_SECS, SIGNALS_POLL_SECS,
};
use crate::types::{CalibrationData, MarketsPage, Signal, SignalType};

/// A polled GET endpoint. The value itself is the cache key: two equal
/// queries share one poller and one cached result.
pub trait Query: Clone + Eq + Hash + Debug + Send + Sync + 'static {
    type Output: DeserializeOwned + Send + Sync + 'static;

    /// Unencoded path segments below the API base. Each one stays a single
    /// segment on the wire, whatever characters it holds.
    fn path(&self) -> Vec<String>;

    /// Path for logs and error messages, e.g. `/signals/active`.
    fn endpoint(&self) -> String {
        format!("/{}", self.path().join("/"))
    }

    fn params(&self) -> Vec<(&'static str, String)>;

    fn poll_interval(&self) -> Duration;
}

// ---------------------------------------------------------------------------
// Signals
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActiveSignalsQuery {
    pub limit: u32,
    /// None asks the server for every signal type.
    pub signal_type: Option<SignalType>,
}

impl Default for ActiveSignalsQuery {
    fn default() -> Self {
        Self { limit: DEFAULT_SIGNALS_LIMIT, signal_type: None }
    }
}

impl Query for ActiveSignalsQuery {
    type Output = Vec<Signal>;

    fn path(&self) -> Vec<String> {
        vec!["signals".to_string(), "active".to_string()]
    }

    fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("limit", self.limit.to_string())];
        if let Some(t) = self.signal_type {
            params.push(("signal_type", t.as_str().to_string()));
        }
        params
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_secs(SIGNALS_POLL_SECS)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SignalHistoryQuery {
    pub market_id: String,
    pub limit: u32,
}

impl SignalHistoryQuery {
    pub fn new(market_id: impl Into<String>) -> Self {
        Self { market_id: market_id.into(), limit: DEFAULT_HISTORY_LIMIT }
    }
}

impl Query for SignalHistoryQuery {
    type Output = Vec<Signal>;

    fn path(&self) -> Vec<String> {
        vec!["signals".to_string(), "history".to_string(), self.market_id.clone()]
    }

    fn params(&self) -> Vec<(&'static str, String)> {
        vec![("limit", self.limit.to_string())]
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_secs(SIGNALS_POLL_SECS)
    }
}

// ---------------------------------------------------------------------------
// Markets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MarketsQuery {
    /// 1-based.
    pub page: u32,
    pub page_size: u32,
    pub search: Option<String>,
}

impl Default for MarketsQuery {
    fn default() -> Self {
        Self { page: 1, page_size: MARKETS_PAGE_SIZE, search: None }
    }
}

impl Query for MarketsQuery {
    type Output = MarketsPage;

    fn path(&self) -> Vec<String> {
        vec!["markets".to_string()]
    }

    fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("page", self.page.to_string()),
            ("pageSize", self.page_size.to_string()),
        ];
        if let Some(search) = self.search.as_deref().filter(|s| !s.is_empty()) {
            params.push(("search", search.to_string()));
        }
        params
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_secs(MARKETS_POLL_SECS)
    }
}

// ---------------------------------------------------------------------------
// Calibration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct CalibrationQuery {
    pub category: Option<String>,
}

impl Query for CalibrationQuery {
    type Output = CalibrationData;

    fn path(&self) -> Vec<String> {
        vec!["calibration".to_string()]
    }

    fn params(&self) -> Vec<(&'static str, String)> {
        match &self.category {
            Some(c) => vec![("category", c.clone())],
            None => Vec::new(),
        }
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_secs(CALIBRATION_POLL_SECS)
    }
}
