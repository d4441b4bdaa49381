//! xrpscan explorer API client.
//!
//! Blocking and single-threaded. Every request goes through the client's
//! `RetryPolicy`; once it gives up, the `fetch*` helpers return `None` ("no data")
//! instead of an error, and the caller decides whether that is fatal.

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::data::RetryPolicy;
use crate::domain::{MetricRow, TransactionsPage, WellKnownAccount};
use crate::error::{AppError, EXIT_INPUT, FetchError};

pub const DEFAULT_BASE_URL: &str = "https://api.xrpscan.com/api/v1";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub struct ExplorerClient {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl ExplorerClient {
    pub fn new(base_url: impl Into<String>, retry: RetryPolicy, timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::new(EXIT_INPUT, format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            retry,
        })
    }

    /// Build from the environment (`.env` is honoured).
    ///
    /// - `XRPSCAN_BASE_URL`: API root, defaults to the public xrpscan API
    /// - `XRPSCAN_TIMEOUT_SECS`: per-request timeout
    pub fn from_env(retry: RetryPolicy) -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        let base_url = std::env::var("XRPSCAN_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let timeout_secs = match std::env::var("XRPSCAN_TIMEOUT_SECS") {
            Ok(raw) => raw.trim().parse::<u64>().map_err(|_| {
                AppError::new(EXIT_INPUT, format!("Invalid XRPSCAN_TIMEOUT_SECS '{raw}'."))
            })?,
            Err(_) => DEFAULT_TIMEOUT_SECS,
        };
        Self::new(base_url, retry, Duration::from_secs(timeout_secs))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `{base_url}/{path}` and decode the JSON body, retrying per policy.
    pub fn try_fetch<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T, FetchError> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        self.retry.run(path, |attempt| {
            debug!(%url, attempt, ?query, "GET");
            self.get_once(&url, query)
        })
    }

    /// Like `try_fetch`, but degrades to `None` once retries are exhausted.
    pub fn fetch<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Option<T> {
        match self.try_fetch(path, query) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(%path, error = %err, "no data");
                None
            }
        }
    }

    /// Daily rows of `/metrics/{metric_type}`.
    pub fn fetch_metrics(&self, metric_type: &str) -> Option<Vec<MetricRow>> {
        self.fetch(&format!("metrics/{metric_type}"), &[])
    }

    /// The explorer's labelled exchange/service accounts.
    pub fn fetch_well_known(&self) -> Option<Vec<WellKnownAccount>> {
        self.fetch("names/well-known", &[])
    }

    /// One page of an account's transactions, newest first.
    pub fn fetch_transactions_page(
        &self,
        account: &str,
        limit: usize,
        marker: Option<&str>,
    ) -> Option<TransactionsPage> {
        let mut query = vec![("limit", limit.to_string())];
        if let Some(marker) = marker {
            query.push(("marker", marker.to_string()));
        }
        self.fetch(&format!("account/{account}/transactions"), &query)
    }

    fn get_once<T: DeserializeOwned>(&self, url: &str, query: &[(&str, String)]) -> Result<T, FetchError> {
        let resp = self.client.get(url).query(query).send()?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::RateLimited { status });
        }
        if !status.is_success() {
            return Err(FetchError::Http { status });
        }

        let body = resp.text()?;
        serde_json::from_str(&body).map_err(|e| FetchError::Decode(e.to_string()))
    }
}
