//! Binance klines fetcher
//!
//! Issues one GET per page. With the default of zero retries a failed request
//! is returned to the caller as-is; a bounded retry with exponential backoff
//! can be enabled for transient failures (network, timeout, 5xx, 429).

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};

use super::binance_config::{BinanceMarketConfig, SPOT_CONFIG};
use super::query::KlinesQuery;
use super::{FetcherError, FetcherResult, PageSource};
use crate::metrics::{record_retry_backoff, HttpRequestMetrics};
use crate::sync::config::{
    calculate_backoff, DEFAULT_MAX_RETRIES, HTTP_CONNECT_TIMEOUT_SECS,
    HTTP_POOL_IDLE_TIMEOUT_SECS, HTTP_REQUEST_TIMEOUT_SECS,
};

/// Build the HTTP client used for klines requests.
///
/// Timeouts bound every request so a stalled connection surfaces as
/// [`FetcherError::TimeoutError`].
pub fn build_http_client() -> FetcherResult<Client> {
    Client::builder()
        .connect_timeout(Duration::from_secs(HTTP_CONNECT_TIMEOUT_SECS))
        .timeout(Duration::from_secs(HTTP_REQUEST_TIMEOUT_SECS))
        .pool_idle_timeout(Duration::from_secs(HTTP_POOL_IDLE_TIMEOUT_SECS))
        .build()
        .map_err(|e| FetcherError::ClientError(format!("Failed to build HTTP client: {e}")))
}

/// Klines page source for the Binance spot API
pub struct BinanceKlinesFetcher {
    client: Client,
    base_url: String,
    config: &'static BinanceMarketConfig,
    max_retries: u32,
}

impl BinanceKlinesFetcher {
    /// Create a fetcher for the spot market
    pub fn new() -> FetcherResult<Self> {
        Ok(Self::with_client(build_http_client()?, &SPOT_CONFIG))
    }

    /// Create a fetcher from an existing client and market configuration
    pub fn with_client(client: Client, config: &'static BinanceMarketConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.to_string(),
            config,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Override the base URL (e.g., a regional mirror or a local test server)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the number of retries per page
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Base URL requests are sent to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Number of retries per page
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Full klines endpoint URL
    pub fn klines_url(&self) -> String {
        format!("{}{}", self.base_url, self.config.klines_endpoint)
    }

    async fn request_once(
        &self,
        url: &str,
        query: &KlinesQuery,
        start_time: i64,
        attempt: u32,
    ) -> FetcherResult<Bytes> {
        let metrics = HttpRequestMetrics::start(attempt);

        debug!(
            "Making GET request to: {}?{}",
            url,
            query.query_string(start_time)
        );

        let response = match self
            .client
            .get(url)
            .query(&query.params(start_time)[..])
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                metrics.record_network_error();
                return Err(e.into());
            }
        };

        let status = response.status();
        metrics.record_complete(status.as_u16());

        if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::IM_A_TEAPOT {
            return Err(FetcherError::RateLimitExceeded(status.as_u16()));
        }

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(FetcherError::HttpError {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.bytes().await?)
    }
}

#[async_trait]
impl PageSource for BinanceKlinesFetcher {
    async fn fetch_page(&self, symbol: &str, start_time: i64) -> FetcherResult<Bytes> {
        let url = self.klines_url();
        let query = KlinesQuery::new(symbol, self.config);
        let mut attempt = 0;

        loop {
            match self.request_once(&url, &query, start_time, attempt).await {
                Ok(body) => {
                    debug!(bytes = body.len(), attempt = attempt + 1, "Page received");
                    return Ok(body);
                }
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    let backoff = calculate_backoff(attempt);
                    warn!(
                        "Fetch failed on attempt {}/{}: {}; retrying after {:?}",
                        attempt + 1,
                        self.max_retries + 1,
                        e,
                        backoff
                    );
                    record_retry_backoff(backoff, attempt + 1);
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
