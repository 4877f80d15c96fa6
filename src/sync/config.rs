//! Sync configuration constants

use std::time::Duration;

/// Default number of retries around a page fetch.
/// Zero keeps a single pass per page: any fetch failure ends the run.
pub const DEFAULT_MAX_RETRIES: u32 = 0;

/// Upper bound accepted for `--max-retries`
pub const MAX_RETRIES_LIMIT: u32 = 10;

/// Initial backoff delay in milliseconds
pub const INITIAL_BACKOFF_MS: u64 = 1000; // 1 second

/// Maximum backoff delay in milliseconds
pub const MAX_BACKOFF_MS: u64 = 30000; // 30 seconds

/// HTTP connect timeout (seconds)
pub const HTTP_CONNECT_TIMEOUT_SECS: u64 = 10;

/// HTTP request timeout (seconds), covers the whole request including body
pub const HTTP_REQUEST_TIMEOUT_SECS: u64 = 30;

/// HTTP idle connection lifetime (seconds)
pub const HTTP_POOL_IDLE_TIMEOUT_SECS: u64 = 10;

/// Calculate exponential backoff delay
pub fn calculate_backoff(retry_count: u32) -> Duration {
    let delay_ms = INITIAL_BACKOFF_MS.saturating_mul(2u64.saturating_pow(retry_count));
    let delay_ms = delay_ms.min(MAX_BACKOFF_MS);
    Duration::from_millis(delay_ms)
}
