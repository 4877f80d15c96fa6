//! Observability metrics for candle syncing
//!
//! Uses the `metrics` facade; without an installed recorder every call is a
//! no-op. [`init_metrics`] installs a Prometheus exporter with an HTTP scrape
//! endpoint.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::OnceCell;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

static METRICS_INITIALIZED: OnceCell<SocketAddr> = OnceCell::new();

/// Initialize the Prometheus exporter on `addr`.
///
/// Must be called from within a Tokio runtime. Calling it again is a no-op.
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    if let Some(existing) = METRICS_INITIALIZED.get() {
        debug!(addr = %existing, "Metrics already initialized, skipping");
        return Ok(());
    }

    info!("Initializing metrics system on {}", addr);

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        "http_requests_total",
        Unit::Count,
        "Total number of klines requests"
    );
    describe_histogram!(
        "http_request_duration_seconds",
        Unit::Seconds,
        "Klines request duration in seconds"
    );
    describe_counter!(
        "http_retries_total",
        Unit::Count,
        "Total number of fetch retry attempts"
    );
    describe_counter!(
        "sync_pages_total",
        Unit::Count,
        "Pages fetched, parsed and persisted"
    );
    describe_counter!(
        "sync_candles_stored_total",
        Unit::Count,
        "Candles appended to the store"
    );
    describe_counter!(
        "sync_runs_total",
        Unit::Count,
        "Sync runs by terminal outcome"
    );

    let _ = METRICS_INITIALIZED.set(addr);
    info!("Metrics system initialized");
    Ok(())
}

/// Timing for one HTTP request
pub struct HttpRequestMetrics {
    start_time: Instant,
    attempt: u32,
}

impl HttpRequestMetrics {
    /// Start timing an attempt (0-based)
    pub fn start(attempt: u32) -> Self {
        Self {
            start_time: Instant::now(),
            attempt,
        }
    }

    /// Record a request that produced an HTTP status
    pub fn record_complete(&self, status_code: u16) {
        let duration = self.start_time.elapsed();

        counter!(
            "http_requests_total",
            "status" => status_code.to_string(),
            "attempt" => self.attempt.to_string(),
        )
        .increment(1);
        histogram!("http_request_duration_seconds").record(duration.as_secs_f64());

        debug!(
            status = status_code,
            attempt = self.attempt,
            duration_ms = duration.as_millis(),
            "HTTP request completed"
        );
    }

    /// Record a request that failed before a status was received
    pub fn record_network_error(&self) {
        let duration = self.start_time.elapsed();

        counter!(
            "http_requests_total",
            "status" => "network_error",
            "attempt" => self.attempt.to_string(),
        )
        .increment(1);
        histogram!("http_request_duration_seconds").record(duration.as_secs_f64());

        warn!(
            attempt = self.attempt,
            duration_ms = duration.as_millis(),
            "Network error recorded"
        );
    }
}

/// Record a retry backoff before the next attempt
pub fn record_retry_backoff(duration: Duration, attempt: u32) {
    counter!("http_retries_total", "attempt" => attempt.to_string()).increment(1);
    debug!(
        attempt = attempt,
        backoff_ms = duration.as_millis(),
        "Retry backoff recorded"
    );
}

/// Metrics for one sync run
pub struct SyncMetrics {
    symbol: String,
    start_time: Instant,
}

impl SyncMetrics {
    /// Start tracking a run for `symbol`
    pub fn start(symbol: impl Into<String>) -> Self {
        let symbol = symbol.into();
        info!(symbol = %symbol, "Sync run started");
        Self {
            symbol,
            start_time: Instant::now(),
        }
    }

    /// Record one persisted page of `count` candles
    pub fn record_page(&self, count: usize) {
        counter!("sync_pages_total", "symbol" => self.symbol.clone()).increment(1);
        counter!("sync_candles_stored_total", "symbol" => self.symbol.clone())
            .increment(count as u64);
    }

    /// Record a run that ended normally or by interruption
    pub fn record_complete(&self, outcome: &'static str, loaded: u64) {
        counter!(
            "sync_runs_total",
            "symbol" => self.symbol.clone(),
            "outcome" => outcome,
        )
        .increment(1);

        info!(
            symbol = %self.symbol,
            outcome = outcome,
            loaded = loaded,
            duration_secs = self.start_time.elapsed().as_secs(),
            "Sync run completed"
        );
    }

    /// Record a failed run
    pub fn record_failure(&self, error: &str) {
        counter!(
            "sync_runs_total",
            "symbol" => self.symbol.clone(),
            "outcome" => "failed",
        )
        .increment(1);

        error!(
            symbol = %self.symbol,
            error = %error,
            duration_secs = self.start_time.elapsed().as_secs(),
            "Sync run failed"
        );
    }
}
