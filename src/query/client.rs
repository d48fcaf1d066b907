use std::sync::Arc;

use tracing::debug;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::query::keys::Query;

/// Thin JSON GET client over the analytics API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Arc<str>,
}

impl ApiClient {
    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: Arc::from(base_url.trim_end_matches('/')),
        }
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        Ok(Self::new(cfg.http_client()?, &cfg.api_url))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Base URL with `query`'s path segments appended, each percent-encoded.
    pub fn url_for<Q: Query>(&self, query: &Q) -> Result<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| AppError::Config(format!("invalid API_URL {}: {e}", self.base_url)))?;
        url.path_segments_mut()
            .map_err(|_| AppError::Config(format!("API_URL {} cannot take a path", self.base_url)))?
            .pop_if_empty()
            .extend(query.path());
        Ok(url)
    }

    /// Non-2xx answers fail with `AppError::Status`; the body is not read.
    pub async fn fetch<Q: Query>(&self, query: &Q) -> Result<Q::Output> {
        let endpoint = query.endpoint();
        let url = self.url_for(query)?;
        let resp = self.http.get(url).query(&query.params()).send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(AppError::Status { endpoint, status: status.as_u16() });
        }

        let body = resp.bytes().await?;
        debug!(endpoint = %endpoint, bytes = body.len(), "fetched");
        Ok(serde_json::from_slice(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::keys::{CalibrationQuery, MarketsQuery, SignalHistoryQuery};
    use crate::test_support::StubApi;

    fn client(stub: &StubApi) -> ApiClient {
        ApiClient::new(reqwest::Client::new(), &stub.base_url)
    }

    #[tokio::test]
    async fn fetches_and_decodes_calibration() {
        let stub = StubApi::spawn().await;
        let data = client(&stub).fetch(&CalibrationQuery::default()).await.unwrap();
        assert_eq!(data.market_count, 12);
        assert_eq!(data.calibration_curve.len(), 3);
    }

    #[tokio::test]
    async fn non_success_status_is_a_status_error() {
        let stub = StubApi::spawn().await;
        stub.fail("/api/markets", 503);
        let err = client(&stub).fetch(&MarketsQuery::default()).await.unwrap_err();
        assert_eq!(err.status(), Some(503));
        assert_eq!(err.to_string(), "/markets fetch failed: 503");
    }

    #[tokio::test]
    async fn history_hits_market_scoped_path() {
        let stub = StubApi::spawn().await;
        let signals = client(&stub).fetch(&SignalHistoryQuery::new("m1")).await.unwrap();
        assert_eq!(signals.len(), 2);
        assert!(stub.requests().contains(&"/api/signals/history/m1?limit=50".to_string()));
    }

    #[tokio::test]
    async fn market_id_with_slash_stays_one_segment() {
        let stub = StubApi::spawn().await;
        let signals = client(&stub).fetch(&SignalHistoryQuery::new("m1/x")).await.unwrap();
        assert!(signals.is_empty());
        assert!(stub
            .requests()
            .contains(&"/api/signals/history/m1%2Fx?limit=50".to_string()));
    }

    #[test]
    fn url_keeps_base_prefix() {
        let client = ApiClient::new(reqwest::Client::new(), "http://localhost:8000/api/");
        let url = client.url_for(&SignalHistoryQuery::new("0x ab")).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/api/signals/history/0x%20ab");
    }

    #[test]
    fn unparseable_base_is_a_config_error() {
        let client = ApiClient::new(reqwest::Client::new(), "not a url");
        let err = client.url_for(&CalibrationQuery::default()).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }
}
