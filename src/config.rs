use std::time::Duration;

use crate::error::{AppError, Result};

pub const API_URL: &str = "http://localhost:8000/api";

/// Active signals poll cadence (seconds).
pub const SIGNALS_POLL_SECS: u64 = 30;

/// Markets poll cadence (seconds).
pub const MARKETS_POLL_SECS: u64 = 60;

/// Calibration poll cadence (seconds). Resolutions trickle in slowly.
pub const CALIBRATION_POLL_SECS: u64 = 300;

pub const DEFAULT_SIGNALS_LIMIT: u32 = 20;
pub const DEFAULT_HISTORY_LIMIT: u32 = 50;

/// Fixed market table page size.
pub const MARKETS_PAGE_SIZE: u32 = 20;

/// How often the dashboard redraws when no key is pressed (milliseconds).
pub const UI_TICK_MS: u64 = 250;

/// Confidence bands. Lower bounds are inclusive.
pub mod confidence_thresholds {
    pub const HIGH_MIN: f64 = 0.7;
    pub const MEDIUM_MIN: f64 = 0.4;
}

/// Brier score bands. Upper bounds are exclusive.
pub mod brier_thresholds {
    pub const GOOD_MAX: f64 = 0.1;
    pub const FAIR_MAX: f64 = 0.2;
}

/// Volume display units. Lower bounds are inclusive.
pub mod volume_units {
    pub const MILLION: f64 = 1_000_000.0;
    pub const THOUSAND: f64 = 1_000.0;
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the analytics API, including the `/api` prefix (API_URL).
    pub api_url: String,
    pub log_level: String,
    /// The TUI owns stdout, so logs go to a file (LOG_FILE).
    pub log_file: String,
    /// Active signals shown on the dashboard (SIGNALS_LIMIT).
    pub signals_limit: u32,
    /// Request timeout (HTTP_TIMEOUT_SECS). None leaves it to the transport.
    pub http_timeout: Option<Duration>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key/value source; `from_env` passes the process environment.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let http_timeout = match var("HTTP_TIMEOUT_SECS") {
            Some(raw) => Some(Duration::from_secs(raw.trim().parse::<u64>().map_err(|_| {
                AppError::Config("HTTP_TIMEOUT_SECS must be a whole number of seconds".to_string())
            })?)),
            None => None,
        };

        Ok(Self {
            api_url: var("API_URL")
                .unwrap_or_else(|| API_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            log_level: var("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            log_file: var("LOG_FILE").unwrap_or_else(|| "dashboard.log".to_string()),
            signals_limit: var("SIGNALS_LIMIT")
                .and_then(|raw| raw.trim().parse::<u32>().ok())
                .unwrap_or(DEFAULT_SIGNALS_LIMIT),
            http_timeout,
        })
    }

    pub fn http_client(&self) -> Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = self.http_timeout {
            builder = builder.timeout(timeout);
        }
        Ok(builder.build()?)
    }
}
