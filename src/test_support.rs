//! In-process stand-in for the analytics API, bound to an ephemeral port.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{OriginalUri, Path, Query as QueryParams, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::query::{Query, QueryState, Subscription};

#[derive(Clone, Default)]
struct StubState {
    hits: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<String>>>,
    failing: Arc<Mutex<HashMap<String, u16>>>,
    delay_ms: Arc<AtomicU64>,
}

pub struct StubApi {
    /// Includes the `/api` prefix.
    pub base_url: String,
    state: StubState,
}

impl StubApi {
    pub async fn spawn() -> Self {
        let state = StubState::default();
        let api = Router::new()
            .route("/signals/active", get(active_signals))
            .route("/signals/history/:market_id", get(signal_history))
            .route("/markets", get(markets))
            .route("/calibration", get(calibration));
        let app = Router::new().nest("/api", api).with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url: format!("http://{addr}/api"), state }
    }

    pub fn hits(&self) -> usize {
        self.state.hits.load(Ordering::SeqCst)
    }

    /// Path and query string of every request received, in arrival order.
    pub fn requests(&self) -> Vec<String> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn fail(&self, path: &str, status: u16) {
        self.state.failing.lock().unwrap().insert(path.to_string(), status);
    }

    pub fn recover(&self, path: &str) {
        self.state.failing.lock().unwrap().remove(path);
    }

    pub fn set_delay(&self, delay: Duration) {
        self.state.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }
}

/// Wait (up to 5s) for a snapshot matching `pred`.
pub async fn wait_until<Q: Query>(
    sub: &mut Subscription<Q>,
    pred: impl Fn(&QueryState<Q::Output>) -> bool,
) -> QueryState<Q::Output> {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let state = sub.snapshot();
            if pred(&state) {
                return state;
            }
            if !sub.changed().await {
                panic!("query torn down while waiting");
            }
        }
    })
    .await
    .expect("timed out waiting for query state")
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn gate(state: &StubState, uri: &OriginalUri) -> Option<Response> {
    state.hits.fetch_add(1, Ordering::SeqCst);
    let path_and_query = uri
        .0
        .path_and_query()
        .map(|p| p.as_str().to_string())
        .unwrap_or_default();
    state.requests.lock().unwrap().push(path_and_query);

    let delay = state.delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    let failing = state.failing.lock().unwrap().get(uri.0.path()).copied();
    failing.map(|status| {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, "stub failure").into_response()
    })
}

async fn active_signals(
    State(state): State<StubState>,
    uri: OriginalUri,
    QueryParams(params): QueryParams<HashMap<String, String>>,
) -> Response {
    if let Some(resp) = gate(&state, &uri).await {
        return resp;
    }
    let signals: Vec<Value> = signal_fixtures()
        .into_iter()
        .filter(|s| match params.get("signal_type") {
            Some(t) => s["signal_type"] == t.as_str(),
            None => true,
        })
        .collect();
    Json(Value::Array(signals)).into_response()
}

async fn signal_history(
    State(state): State<StubState>,
    uri: OriginalUri,
    Path(market_id): Path<String>,
) -> Response {
    if let Some(resp) = gate(&state, &uri).await {
        return resp;
    }
    let history: Vec<Value> = signal_fixtures()
        .into_iter()
        .filter(|s| s["market_id"] == market_id.as_str())
        .map(|mut s| {
            if let Some(obj) = s.as_object_mut() {
                obj.remove("market_id");
            }
            s
        })
        .collect();
    Json(Value::Array(history)).into_response()
}

async fn markets(State(state): State<StubState>, uri: OriginalUri) -> Response {
    if let Some(resp) = gate(&state, &uri).await {
        return resp;
    }
    Json(json!({
        "markets": [
            {"id": "m1", "question": "Will it rain?", "category": "Weather",
             "volume": "1500", "outcomePrices": "[\"0.62\", \"0.38\"]"},
            {"id": "m2", "question": "Fed cut in June?", "category": null,
             "volume": "2500000", "outcomePrices": "not json"},
            {"id": "m3", "question": "Team A wins?", "category": "Sports",
             "volume": "oops", "outcomePrices": "[\"0.15\"]"}
        ],
        "total": 45
    }))
    .into_response()
}

async fn calibration(State(state): State<StubState>, uri: OriginalUri) -> Response {
    if let Some(resp) = gate(&state, &uri).await {
        return resp;
    }
    Json(json!({
        "brier_score": 0.1523,
        "market_count": 12,
        "calibration_curve": [
            {"bin_start": 0.0, "bin_end": 0.1, "avg_predicted": 0.05, "actual_frequency": null, "count": 0},
            {"bin_start": 0.1, "bin_end": 0.2, "avg_predicted": 0.16, "actual_frequency": 0.2, "count": 5},
            {"bin_start": 0.8, "bin_end": 0.9, "avg_predicted": 0.84, "actual_frequency": 0.71, "count": 7}
        ],
        "category_breakdown": [
            {"category": "Sports", "brier_score": 0.08, "count": 4},
            {"category": "Politics", "brier_score": 0.21, "count": 8}
        ]
    }))
    .into_response()
}

fn signal_fixtures() -> Vec<Value> {
    vec![
        json!({"id": "1", "market_id": "m1", "signal_type": "volume_spike", "confidence": 0.9,
               "detected_at": "2024-03-01T12:00:00.000001",
               "metadata": {"current_volume": 52000.0, "avg_volume": 1200.0, "std_dev": 800.0, "z_score": 4.1}}),
        json!({"id": "2", "market_id": "m2", "signal_type": "price_momentum", "confidence": 0.5,
               "detected_at": "2024-03-01T11:00:00",
               "metadata": {"current_price": 0.7, "earlier_price": 0.5, "change": 0.2, "direction": "up"}}),
        json!({"id": "3", "market_id": "m1", "signal_type": "volume_spike", "confidence": null,
               "detected_at": null, "metadata": null}),
    ]
}
