use std::sync::Arc;

use crate::query::QueryState;
use crate::types::{CalibrationData, MarketsPage, Signal};

/// What a view should show for one query. Exactly one state applies.
#[derive(Debug, Clone)]
pub enum Panel<T> {
    /// No attempt has completed yet.
    Loading,
    /// The latest attempt failed and there is nothing to fall back on.
    Failed(String),
    /// A valid answer with zero rows. Not an error.
    Empty,
    /// `stale` carries the error of a failed refresh while older data is shown.
    Ready { data: Arc<T>, stale: Option<String> },
}

/// Payloads that can be legitimately empty.
pub trait Emptiness {
    fn is_empty_result(&self) -> bool;
}

impl Emptiness for Vec<Signal> {
    fn is_empty_result(&self) -> bool {
        self.is_empty()
    }
}

impl Emptiness for MarketsPage {
    fn is_empty_result(&self) -> bool {
        self.markets.is_empty()
    }
}

impl Emptiness for CalibrationData {
    /// No resolved markets means no calibration to show.
    fn is_empty_result(&self) -> bool {
        self.market_count == 0
    }
}

impl<T: Emptiness> Panel<T> {
    pub fn from_state(state: &QueryState<T>) -> Self {
        let error = state.error.as_ref().map(|e| e.to_string());
        match (&state.data, error) {
            (None, None) => Panel::Loading,
            (None, Some(e)) => Panel::Failed(e),
            (Some(data), Some(e)) if data.is_empty_result() => Panel::Failed(e),
            (Some(data), None) if data.is_empty_result() => Panel::Empty,
            (Some(data), stale) => Panel::Ready { data: Arc::clone(data), stale },
        }
    }
}

impl<T> Panel<T> {
    pub fn data(&self) -> Option<&T> {
        match self {
            Panel::Ready { data, .. } => Some(data),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    fn state(data: Option<Vec<Signal>>, status: Option<u16>) -> QueryState<Vec<Signal>> {
        QueryState {
            data: data.map(Arc::new),
            error: status.map(|s| {
                Arc::new(AppError::Status { endpoint: "/signals/active".to_string(), status: s })
            }),
            updated_at: None,
            attempts: 1,
        }
    }

    fn one_signal() -> Vec<Signal> {
        serde_json::from_str(r#"[{"id":"1","market_id":"m","signal_type":"volume_spike"}]"#).unwrap()
    }

    #[test]
    fn loading_before_first_result() {
        let s: QueryState<Vec<Signal>> = QueryState::default();
        assert!(matches!(Panel::from_state(&s), Panel::Loading));
    }

    #[test]
    fn error_without_data_fails() {
        match Panel::from_state(&state(None, Some(502))) {
            Panel::Failed(msg) => assert_eq!(msg, "/signals/active fetch failed: 502"),
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[test]
    fn empty_result_is_not_an_error() {
        assert!(matches!(Panel::from_state(&state(Some(vec![]), None)), Panel::Empty));
    }

    #[test]
    fn stale_data_is_still_shown() {
        match Panel::from_state(&state(Some(one_signal()), Some(500))) {
            Panel::Ready { data, stale } => {
                assert_eq!(data.len(), 1);
                assert!(stale.is_some());
            }
            other => panic!("expected Ready, got {other:?}"),
        }
    }

    #[test]
    fn calibration_without_resolved_markets_is_empty() {
        let s = QueryState {
            data: Some(Arc::new(CalibrationData::default())),
            ..QueryState::default()
        };
        assert!(matches!(Panel::from_state(&s), Panel::Empty));
    }
}
