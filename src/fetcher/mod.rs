//! Page fetching from the remote klines source
//!
//! A [`PageSource`] issues exactly one time-windowed request per call and hands
//! back the raw payload. It keeps no pagination state: the sync loop supplies a
//! fresh cursor every time.

use async_trait::async_trait;
use bytes::Bytes;

pub mod binance;
pub mod binance_config;
pub mod query;

pub use binance::BinanceKlinesFetcher;
pub use binance_config::{BinanceMarketConfig, SPOT_CONFIG};
pub use query::KlinesQuery;

/// Maximum number of rows returned by one page
pub const PAGE_LIMIT: usize = 1000;

/// Fetcher errors
#[derive(Debug, thiserror::Error)]
pub enum FetcherError {
    /// Connection or transport failure
    #[error("network error: {0}")]
    NetworkError(String),

    /// Request did not complete within the client timeout
    #[error("timeout: {0}")]
    TimeoutError(String),

    /// Non-success HTTP status
    #[error("HTTP error {status}: {body}")]
    HttpError {
        /// Response status code
        status: u16,
        /// Response body, if readable
        body: String,
    },

    /// Rate limit exceeded (HTTP 429 or 418)
    #[error("rate limit exceeded: HTTP {0}")]
    RateLimitExceeded(u16),

    /// HTTP client could not be constructed
    #[error("client configuration error: {0}")]
    ClientError(String),
}

impl FetcherError {
    /// Whether a bounded retry could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            FetcherError::NetworkError(_)
            | FetcherError::TimeoutError(_)
            | FetcherError::RateLimitExceeded(_) => true,
            FetcherError::HttpError { status, .. } => *status >= 500,
            FetcherError::ClientError(_) => false,
        }
    }
}

impl From<reqwest::Error> for FetcherError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetcherError::TimeoutError(e.to_string())
        } else {
            FetcherError::NetworkError(e.to_string())
        }
    }
}

/// Result type for fetcher operations
pub type FetcherResult<T> = Result<T, FetcherError>;

/// Source of raw kline pages
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetch one page starting at `start_time`
    ///
    /// # Arguments
    /// * `symbol` - Trading symbol (e.g., "ETHUSDT")
    /// * `start_time` - Cursor (Unix timestamp in milliseconds)
    ///
    /// # Returns
    /// Raw response body, at most [`PAGE_LIMIT`] rows
    async fn fetch_page(&self, symbol: &str, start_time: i64) -> FetcherResult<Bytes>;
}
