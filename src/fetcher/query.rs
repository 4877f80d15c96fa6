//! Klines query construction

use super::binance_config::BinanceMarketConfig;

/// Query parameters for one klines page of a fixed symbol.
///
/// Parameter order is stable: `symbol`, `interval`, `limit`, `startTime`.
#[derive(Debug, Clone)]
pub struct KlinesQuery {
    symbol: String,
    interval: &'static str,
    limit: String,
}

impl KlinesQuery {
    /// Build a query for `symbol` using the market's interval and page size
    pub fn new(symbol: impl Into<String>, config: &BinanceMarketConfig) -> Self {
        Self {
            symbol: symbol.into(),
            interval: config.interval,
            limit: config.page_limit.to_string(),
        }
    }

    /// Key/value pairs for a page starting at `start_time` (milliseconds)
    pub fn params(&self, start_time: i64) -> [(&'static str, String); 4] {
        [
            ("symbol", self.symbol.clone()),
            ("interval", self.interval.to_string()),
            ("limit", self.limit.clone()),
            ("startTime", start_time.to_string()),
        ]
    }

    /// Encoded query string, as sent on the wire
    pub fn query_string(&self, start_time: i64) -> String {
        self.params(start_time)
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&")
    }
}
