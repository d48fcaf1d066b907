pub mod cache;
pub mod client;
pub mod keys;

pub use cache::{QueryCache, QueryState, Subscription};
pub use client::ApiClient;
pub use keys::{ActiveSignalsQuery, CalibrationQuery, MarketsQuery, Query, SignalHistoryQuery};

/// One cache per query type, all sharing a single HTTP client.
#[derive(Clone)]
pub struct QueryClient {
    pub signals: QueryCache<ActiveSignalsQuery>,
    pub history: QueryCache<SignalHistoryQuery>,
    pub markets: QueryCache<MarketsQuery>,
    pub calibration: QueryCache<CalibrationQuery>,
}

impl QueryClient {
    pub fn new(client: ApiClient) -> Self {
        Self {
            signals: QueryCache::new(client.clone()),
            history: QueryCache::new(client.clone()),
            markets: QueryCache::new(client.clone()),
            calibration: QueryCache::new(client),
        }
    }
}
