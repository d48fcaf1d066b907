use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::error::{AppError, Result};
use crate::query::client::ApiClient;
use crate::query::keys::Query;

// ---------------------------------------------------------------------------
// QueryState
// ---------------------------------------------------------------------------

/// Snapshot of one query: last good result plus the outcome of the latest attempt.
#[derive(Debug)]
pub struct QueryState<T> {
    pub data: Option<Arc<T>>,
    /// Error of the most recent attempt; cleared by the next success.
    pub error: Option<Arc<AppError>>,
    pub updated_at: Option<Instant>,
    /// Completed attempts, successful or not.
    pub attempts: u64,
}

impl<T> Default for QueryState<T> {
    fn default() -> Self {
        Self { data: None, error: None, updated_at: None, attempts: 0 }
    }
}

impl<T> Clone for QueryState<T> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            error: self.error.clone(),
            updated_at: self.updated_at,
            attempts: self.attempts,
        }
    }
}

impl<T> QueryState<T> {
    /// True until the first attempt completes. Refreshes never re-enter loading.
    pub fn is_loading(&self) -> bool {
        self.data.is_none() && self.error.is_none()
    }

    /// Data is shown but the latest poll failed.
    pub fn is_stale(&self) -> bool {
        self.data.is_some() && self.error.is_some()
    }

    fn apply(&mut self, result: Result<T>) {
        self.attempts += 1;
        match result {
            Ok(data) => {
                self.data = Some(Arc::new(data));
                self.error = None;
                self.updated_at = Some(Instant::now());
            }
            // previous data is kept
            Err(e) => self.error = Some(Arc::new(e)),
        }
    }
}

// ---------------------------------------------------------------------------
// QueryCache
// ---------------------------------------------------------------------------

/// Live queries of one type. Each distinct key owns exactly one polling task,
/// created by its first subscriber and aborted when the last one drops.
pub struct QueryCache<Q: Query> {
    inner: Arc<CacheInner<Q>>,
}

impl<Q: Query> Clone for QueryCache<Q> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

struct CacheInner<Q: Query> {
    client: ApiClient,
    entries: DashMap<Q, Entry<Q::Output>>,
}

struct Entry<T> {
    rx: watch::Receiver<QueryState<T>>,
    refresh: Arc<Notify>,
    subscribers: usize,
    task: JoinHandle<()>,
}

impl<Q: Query> QueryCache<Q> {
    pub fn new(client: ApiClient) -> Self {
        Self {
            inner: Arc::new(CacheInner { client, entries: DashMap::new() }),
        }
    }

    /// Attach to `query`, starting its poller if nobody is watching it yet.
    /// Must be called from within a tokio runtime.
    pub fn subscribe(&self, query: Q) -> Subscription<Q> {
        let mut entry = self
            .inner
            .entries
            .entry(query.clone())
            .or_insert_with(|| spawn_entry(self.inner.client.clone(), query.clone()));
        entry.subscribers += 1;

        Subscription {
            rx: entry.rx.clone(),
            refresh: Arc::clone(&entry.refresh),
            cache: Arc::clone(&self.inner),
            query,
        }
    }

    /// Number of keys with a live poller.
    pub fn live_queries(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_live(&self, query: &Q) -> bool {
        self.inner.entries.contains_key(query)
    }
}

impl<Q: Query> CacheInner<Q> {
    fn release(&self, query: &Q) {
        if let Some(mut entry) = self.entries.get_mut(query) {
            entry.subscribers = entry.subscribers.saturating_sub(1);
        }
        if let Some((_, entry)) = self.entries.remove_if(query, |_, e| e.subscribers == 0) {
            // An in-flight request dies with the task; its result is never written.
            entry.task.abort();
            info!(query = ?query, "query torn down");
        }
    }
}

fn spawn_entry<Q: Query>(client: ApiClient, query: Q) -> Entry<Q::Output> {
    let (tx, rx) = watch::channel(QueryState::default());
    let refresh = Arc::new(Notify::new());
    info!(query = ?query, every_secs = query.poll_interval().as_secs(), "query started");
    let task = tokio::spawn(poll_loop(client, query, tx, Arc::clone(&refresh)));
    Entry { rx, refresh, subscribers: 0, task }
}

/// Sequential poll loop: a tick or refresh that lands while a request is in
/// flight is not acted on, so a key never has two requests outstanding.
async fn poll_loop<Q: Query>(
    client: ApiClient,
    query: Q,
    tx: watch::Sender<QueryState<Q::Output>>,
    refresh: Arc<Notify>,
) {
    let mut ticker = interval(query.poll_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = refresh.notified() => {
                debug!(query = ?query, "manual refresh");
                ticker.reset();
            }
        }

        let result = client.fetch(&query).await;
        if let Err(e) = &result {
            warn!(query = ?query, "poll failed: {e}");
        }
        tx.send_modify(|state| state.apply(result));
    }
}

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// A consumer's handle on a live query. Dropping it detaches the consumer.
pub struct Subscription<Q: Query> {
    query: Q,
    rx: watch::Receiver<QueryState<Q::Output>>,
    refresh: Arc<Notify>,
    cache: Arc<CacheInner<Q>>,
}

impl<Q: Query> Subscription<Q> {
    pub fn query(&self) -> &Q {
        &self.query
    }

    pub fn snapshot(&self) -> QueryState<Q::Output> {
        self.rx.borrow().clone()
    }

    /// Wait for the next completed attempt. False once the query is torn down.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }

    /// Poll now if idle. Dropped when a request for this key is already in flight.
    pub fn refresh(&self) {
        self.refresh.notify_waiters();
    }
}

impl<Q: Query> Drop for Subscription<Q> {
    fn drop(&mut self) {
        self.cache.release(&self.query);
    }
}

impl<Q: Query> std::fmt::Debug for Subscription<Q> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("query", &self.query).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::query::keys::{CalibrationQuery, MarketsQuery};
    use crate::test_support::{wait_until, StubApi};

    fn cache<Q: Query>(stub: &StubApi) -> QueryCache<Q> {
        QueryCache::new(ApiClient::new(reqwest::Client::new(), &stub.base_url))
    }

    #[tokio::test]
    async fn first_poll_ends_loading() {
        let stub = StubApi::spawn().await;
        let cache = cache::<CalibrationQuery>(&stub);
        let mut sub = cache.subscribe(CalibrationQuery::default());
        assert!(sub.snapshot().is_loading());

        let state = wait_until(&mut sub, |s| s.data.is_some()).await;
        assert!(!state.is_loading());
        assert!(state.error.is_none());
        assert_eq!(state.data.unwrap().market_count, 12);
    }

    #[tokio::test]
    async fn failed_poll_keeps_previous_data() {
        let stub = StubApi::spawn().await;
        let cache = cache::<CalibrationQuery>(&stub);
        let mut sub = cache.subscribe(CalibrationQuery::default());
        wait_until(&mut sub, |s| s.data.is_some()).await;

        stub.fail("/api/calibration", 503);
        sub.refresh();
        let state = wait_until(&mut sub, |s| s.error.is_some()).await;

        assert!(state.is_stale());
        assert!(!state.is_loading());
        assert_eq!(state.error.unwrap().status(), Some(503));
        assert_eq!(state.data.unwrap().market_count, 12);
    }

    #[tokio::test]
    async fn first_attempt_failure_is_not_loading() {
        let stub = StubApi::spawn().await;
        stub.fail("/api/calibration", 500);
        let cache = cache::<CalibrationQuery>(&stub);
        let mut sub = cache.subscribe(CalibrationQuery::default());
        let state = wait_until(&mut sub, |s| s.attempts > 0).await;
        assert!(!state.is_loading());
        assert!(state.data.is_none());
        assert_eq!(state.error.unwrap().status(), Some(500));
    }

    #[tokio::test]
    async fn equal_keys_share_one_request() {
        let stub = StubApi::spawn().await;
        let cache = cache::<MarketsQuery>(&stub);
        let mut a = cache.subscribe(MarketsQuery::default());
        let mut b = cache.subscribe(MarketsQuery::default());
        assert_eq!(cache.live_queries(), 1);

        wait_until(&mut a, |s| s.data.is_some()).await;
        wait_until(&mut b, |s| s.data.is_some()).await;
        assert_eq!(stub.hits(), 1);
    }

    #[tokio::test]
    async fn refresh_during_flight_is_deduplicated() {
        let stub = StubApi::spawn().await;
        stub.set_delay(Duration::from_millis(300));
        let cache = cache::<MarketsQuery>(&stub);
        let mut sub = cache.subscribe(MarketsQuery::default());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(stub.hits(), 1);
        sub.refresh();
        sub.refresh();
        sub.refresh();

        wait_until(&mut sub, |s| s.data.is_some()).await;
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(stub.hits(), 1);
    }

    #[tokio::test]
    async fn distinct_keys_poll_independently() {
        let stub = StubApi::spawn().await;
        let cache = cache::<MarketsQuery>(&stub);
        let mut first = cache.subscribe(MarketsQuery::default());
        let mut second = cache.subscribe(MarketsQuery { page: 2, ..MarketsQuery::default() });
        assert_eq!(cache.live_queries(), 2);

        wait_until(&mut first, |s| s.data.is_some()).await;
        wait_until(&mut second, |s| s.data.is_some()).await;
        let requests = stub.requests();
        assert!(requests.iter().any(|r| r.contains("page=1")));
        assert!(requests.iter().any(|r| r.contains("page=2")));
    }

    #[tokio::test]
    async fn last_subscriber_drop_tears_down() {
        let stub = StubApi::spawn().await;
        stub.set_delay(Duration::from_millis(200));
        let cache = cache::<CalibrationQuery>(&stub);
        let a = cache.subscribe(CalibrationQuery::default());
        let b = cache.subscribe(CalibrationQuery::default());

        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(a);
        assert!(cache.is_live(&CalibrationQuery::default()));
        drop(b);
        assert_eq!(cache.live_queries(), 0);

        // the aborted request's answer has nowhere to land; a new subscriber starts over
        tokio::time::sleep(Duration::from_millis(300)).await;
        let fresh = cache.subscribe(CalibrationQuery::default());
        assert!(fresh.snapshot().is_loading());
        assert_eq!(fresh.snapshot().attempts, 0);
    }
}
