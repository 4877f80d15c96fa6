//! Binance market configuration
//!
//! Only the spot klines endpoint is used. Requests are always 1-second candles
//! with a page size of [`PAGE_LIMIT`](super::PAGE_LIMIT).

use super::PAGE_LIMIT;

/// Configuration for a Binance klines source
#[derive(Debug, Clone)]
pub struct BinanceMarketConfig {
    /// Base URL for API (e.g., <https://api.binance.com>)
    pub base_url: &'static str,

    /// Klines endpoint path (e.g., /api/v3/klines)
    pub klines_endpoint: &'static str,

    /// Candle granularity requested from the source
    pub interval: &'static str,

    /// Rows per page
    pub page_limit: usize,
}

/// Spot market configuration
///
/// - Base URL: <https://api.binance.com>
/// - Endpoint: /api/v3/klines
/// - Interval: 1s
pub const SPOT_CONFIG: BinanceMarketConfig = BinanceMarketConfig {
    base_url: "https://api.binance.com",
    klines_endpoint: "/api/v3/klines",
    interval: "1s",
    page_limit: PAGE_LIMIT,
};
