pub mod panel;
pub mod rows;

use std::time::Duration;

use tracing::info;

use crate::config::MARKETS_PAGE_SIZE;
use crate::controller::{FilterState, Pagination, SignalFilter, SortKey, SortState};
use crate::query::{
    ActiveSignalsQuery, CalibrationQuery, MarketsQuery, QueryClient, QueryState,
    SignalHistoryQuery, Subscription,
};
use crate::types::{CalibrationData, MarketsPage, Signal};

pub use panel::Panel;
pub use rows::{CategoryRow, MarketRow, SignalCard};

/// Market-scoped signal history opened from the market table.
pub struct HistoryView {
    pub market_id: String,
    pub question: Option<String>,
    sub: Subscription<SignalHistoryQuery>,
}

impl HistoryView {
    pub fn panel(&self) -> Panel<Vec<Signal>> {
        Panel::from_state(&self.sub.snapshot())
    }
}

/// View state for both dashboard pages. Filter, page, search and calibration
/// category select which queries are live; sort only reorders fetched rows.
pub struct Dashboard {
    queries: QueryClient,
    filter: FilterState,
    sort: SortState,
    pagination: Pagination,
    search: Option<String>,
    calibration_category: Option<String>,
    signals: Subscription<ActiveSignalsQuery>,
    markets: Subscription<MarketsQuery>,
    calibration: Subscription<CalibrationQuery>,
    history: Option<HistoryView>,
}

impl Dashboard {
    /// Subscribes the three top-level queries. Must run inside a tokio runtime.
    pub fn new(queries: QueryClient, signals_limit: u32) -> Self {
        let filter = FilterState::new(signals_limit);
        let pagination = Pagination::new(MARKETS_PAGE_SIZE);
        let signals = queries.signals.subscribe(filter.query());
        let markets = queries.markets.subscribe(pagination.query(None));
        let calibration = queries.calibration.subscribe(CalibrationQuery::default());

        Self {
            queries,
            filter,
            sort: SortState::default(),
            pagination,
            search: None,
            calibration_category: None,
            signals,
            markets,
            calibration,
            history: None,
        }
    }

    // --- state accessors ---

    pub fn signal_filter(&self) -> SignalFilter {
        self.filter.filter()
    }

    pub fn sort(&self) -> SortState {
        self.sort
    }

    pub fn pagination(&self) -> Pagination {
        self.pagination
    }

    pub fn search(&self) -> Option<&str> {
        self.search.as_deref()
    }

    pub fn calibration_category(&self) -> Option<&str> {
        self.calibration_category.as_deref()
    }

    pub fn history(&self) -> Option<&HistoryView> {
        self.history.as_ref()
    }

    // --- transitions ---

    /// Swap the live signals query. The previous query is torn down and any
    /// of its in-flight results are discarded.
    pub fn set_signal_filter(&mut self, filter: SignalFilter) -> bool {
        if !self.filter.select(filter) {
            return false;
        }
        info!(filter = filter.label(), "signal filter changed");
        self.signals = self.queries.signals.subscribe(self.filter.query());
        true
    }

    pub fn cycle_signal_filter(&mut self) -> bool {
        self.set_signal_filter(self.filter.filter().next())
    }

    /// Local reorder only; never touches the network.
    pub fn select_sort(&mut self, key: SortKey) {
        self.sort.select(key);
    }

    /// Returns false (and does nothing) outside `1..=total_pages`.
    pub fn change_page(&mut self, page: u32) -> bool {
        self.sync_total();
        if !self.pagination.go_to(page) {
            return false;
        }
        self.resubscribe_markets();
        true
    }

    pub fn next_page(&mut self) -> bool {
        let page = self.pagination.page() + 1;
        self.change_page(page)
    }

    pub fn previous_page(&mut self) -> bool {
        match self.pagination.page() {
            1 => false,
            page => self.change_page(page - 1),
        }
    }

    /// New search text restarts at page 1. Blank text clears the search.
    pub fn apply_search(&mut self, text: &str) {
        let search = Some(text.trim().to_string()).filter(|s| !s.is_empty());
        if search == self.search {
            return;
        }
        info!(search = ?search, "market search changed");
        self.search = search;
        self.pagination.reset();
        self.resubscribe_markets();
    }

    pub fn set_calibration_category(&mut self, category: Option<String>) {
        if category == self.calibration_category {
            return;
        }
        info!(category = ?category, "calibration category changed");
        self.calibration = self
            .queries
            .calibration
            .subscribe(CalibrationQuery { category: category.clone() });
        self.calibration_category = category;
    }

    /// Step through None → each category seen in the breakdown → None.
    pub fn cycle_calibration_category(&mut self, known: &[String]) {
        let next = match &self.calibration_category {
            None => known.first().cloned(),
            Some(current) => known
                .iter()
                .position(|c| c == current)
                .and_then(|i| known.get(i + 1))
                .cloned(),
        };
        self.set_calibration_category(next);
    }

    pub fn open_history(&mut self, market_id: &str, question: Option<String>) {
        if self.history.as_ref().is_some_and(|h| h.market_id == market_id) {
            return;
        }
        let sub = self.queries.history.subscribe(SignalHistoryQuery::new(market_id));
        self.history = Some(HistoryView { market_id: market_id.to_string(), question, sub });
    }

    pub fn close_history(&mut self) {
        self.history = None;
    }

    pub fn refresh_all(&self) {
        self.signals.refresh();
        self.markets.refresh();
        self.calibration.refresh();
        if let Some(h) = &self.history {
            h.sub.refresh();
        }
    }

    /// Pull the latest market total into the pagination state.
    pub fn sync_total(&mut self) {
        if let Some(page) = &self.markets.snapshot().data {
            self.pagination.set_total(page.total);
        }
    }

    fn resubscribe_markets(&mut self) {
        let query = self.pagination.query(self.search.as_deref());
        info!(page = query.page, "markets page changed");
        self.markets = self.queries.markets.subscribe(query);
    }

    // --- views ---

    pub fn signals_panel(&self) -> Panel<Vec<Signal>> {
        Panel::from_state(&self.signals.snapshot())
    }

    pub fn markets_panel(&self) -> Panel<MarketsPage> {
        Panel::from_state(&self.markets.snapshot())
    }

    pub fn calibration_panel(&self) -> Panel<CalibrationData> {
        Panel::from_state(&self.calibration.snapshot())
    }

    /// Rows of an already-fetched page in the current sort order.
    pub fn market_rows<'a>(&self, page: &'a MarketsPage) -> Vec<MarketRow<'a>> {
        self.sort.sort(&page.markets).into_iter().map(MarketRow::new).collect()
    }

    /// Status line entries for the header, one per top-level query.
    pub fn query_health(&self) -> [QueryHealth; 3] {
        [
            QueryHealth::of("signals", &self.signals.snapshot()),
            QueryHealth::of("markets", &self.markets.snapshot()),
            QueryHealth::of("calibration", &self.calibration.snapshot()),
        ]
    }
}

/// Header summary of one query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryHealth {
    pub name: &'static str,
    pub loading: bool,
    pub error: Option<String>,
    /// Time since the last successful poll.
    pub age: Option<Duration>,
}

impl QueryHealth {
    fn of<T>(name: &'static str, state: &QueryState<T>) -> Self {
        Self {
            name,
            loading: state.is_loading(),
            error: state.error.as_ref().map(|e| e.to_string()),
            age: state.updated_at.map(|t| t.elapsed()),
        }
    }

    /// `12s`, `3m`, or empty before the first success.
    pub fn age_label(&self) -> String {
        match self.age.map(|a| a.as_secs()) {
            None => String::new(),
            Some(s) if s < 60 => format!("{s}s"),
            Some(s) => format!("{}m", s / 60),
        }
    }
}
