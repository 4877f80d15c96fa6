//! Klines response parser
//!
//! This is the only place the remote wire schema is interpreted. A page is a
//! JSON array of rows; each row is an array whose leading positional fields are
//! `[open_time, open, high, low, close, volume, close_time, ...]`. Prices and
//! volume arrive as decimal strings, times as integer milliseconds. Trailing
//! fields are ignored.

use crate::fetcher::PAGE_LIMIT;
use crate::Candle;
use serde_json::Value;

/// Minimum number of positional fields a row must carry
pub const MIN_ROW_FIELDS: usize = 7;

const HIGH_IDX: usize = 2;
const LOW_IDX: usize = 3;
const CLOSE_IDX: usize = 4;
const VOLUME_IDX: usize = 5;
const CLOSE_TIME_IDX: usize = 6;

/// Parse errors
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// Payload is not well-formed JSON
    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    /// Top-level value is not an array
    #[error("payload is not an array")]
    NotAnArray,

    /// A row is not an array
    #[error("row {row} is not an array")]
    RowNotArray {
        /// Row index within the page
        row: usize,
    },

    /// A row has fewer than the required fields
    #[error("row {row} has {len} fields, expected at least {MIN_ROW_FIELDS}")]
    RowTooShort {
        /// Row index within the page
        row: usize,
        /// Number of fields present
        len: usize,
    },

    /// A field could not be converted
    #[error("parse {field}: row {row}: {reason}")]
    InvalidField {
        /// Row index within the page
        row: usize,
        /// Field label (e.g., "close time", "high price")
        field: &'static str,
        /// Why conversion failed
        reason: String,
    },

    /// More rows than one page can hold
    #[error("{0} rows exceeds page limit of {PAGE_LIMIT}")]
    TooManyRows(usize),
}

/// Result type for parse operations
pub type ParseResult<T> = Result<T, ParseError>;

/// Reusable buffer holding at most one page of candles
#[derive(Debug, Clone)]
pub struct CandlePage {
    candles: Vec<Candle>,
}

impl Default for CandlePage {
    fn default() -> Self {
        Self::new()
    }
}

impl CandlePage {
    /// Create an empty page with room for [`PAGE_LIMIT`] candles
    pub fn new() -> Self {
        Self {
            candles: Vec::with_capacity(PAGE_LIMIT),
        }
    }

    /// Candles decoded by the last successful parse
    pub fn as_slice(&self) -> &[Candle] {
        &self.candles
    }

    /// Number of decoded candles
    pub fn len(&self) -> usize {
        self.candles.len()
    }

    /// Whether the last parse produced no candles
    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    /// Whether the page holds a full [`PAGE_LIMIT`] candles
    pub fn is_full(&self) -> bool {
        self.candles.len() >= PAGE_LIMIT
    }

    /// Last decoded candle
    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }

    fn clear(&mut self) {
        self.candles.clear();
    }
}

/// Decode one page of wire rows into `dst`, returning the number of candles.
///
/// `dst` is cleared first; on error it is left empty.
///
/// # Close time
/// The wire close time is one millisecond before the next bucket opens
/// (`...998999` for the bucket opening at `...998000`). The stored close time is
/// the next bucket's open boundary: `floor(close_ms / 1000) + 1` seconds.
pub fn parse_candles(body: &[u8], dst: &mut CandlePage) -> ParseResult<usize> {
    dst.clear();
    let result = parse_into(body, &mut dst.candles);
    if result.is_err() {
        dst.clear();
    }
    result
}

fn parse_into(body: &[u8], dst: &mut Vec<Candle>) -> ParseResult<usize> {
    let value: Value =
        serde_json::from_slice(body).map_err(|e| ParseError::InvalidJson(e.to_string()))?;
    let rows = value.as_array().ok_or(ParseError::NotAnArray)?;

    if rows.len() > PAGE_LIMIT {
        return Err(ParseError::TooManyRows(rows.len()));
    }

    for (row, kline) in rows.iter().enumerate() {
        let fields = kline
            .as_array()
            .ok_or(ParseError::RowNotArray { row })?;

        if fields.len() < MIN_ROW_FIELDS {
            return Err(ParseError::RowTooShort {
                row,
                len: fields.len(),
            });
        }

        dst.push(Candle {
            close_time: parse_close_time(&fields[CLOSE_TIME_IDX], row)?,
            high: parse_float(&fields[HIGH_IDX], row, "high price")?,
            low: parse_float(&fields[LOW_IDX], row, "low price")?,
            close: parse_float(&fields[CLOSE_IDX], row, "close price")?,
            volume: parse_float(&fields[VOLUME_IDX], row, "volume")?,
        });
    }

    Ok(dst.len())
}

/// Wire close time (milliseconds) to the stored close boundary (seconds)
pub fn normalize_close_time(close_time_ms: u64) -> Option<u32> {
    u32::try_from(close_time_ms / 1000).ok()?.checked_add(1)
}

fn parse_close_time(value: &Value, row: usize) -> ParseResult<u32> {
    let invalid = |reason: String| ParseError::InvalidField {
        row,
        field: "close time",
        reason,
    };

    let ms = value
        .as_u64()
        .ok_or_else(|| invalid(format!("expected a non-negative integer, got {value}")))?;

    normalize_close_time(ms).ok_or_else(|| invalid(format!("{ms} is out of range")))
}

fn parse_float(value: &Value, row: usize, field: &'static str) -> ParseResult<f32> {
    let s = value.as_str().ok_or_else(|| ParseError::InvalidField {
        row,
        field,
        reason: format!("expected a decimal string, got {value}"),
    })?;

    let parsed: f64 = s.parse().map_err(|e| ParseError::InvalidField {
        row,
        field,
        reason: format!("{s:?}: {e}"),
    })?;

    Ok(parsed as f32)
}
