//! # Candle Loader Library
//!
//! Incrementally downloads 1-second OHLCV candles for a single trading symbol
//! and persists them into a compact append-only binary log on local disk.
//!
//! ## Features
//!
//! - **Fixed-width storage**: every candle is a 20-byte little-endian record,
//!   addressed by `index * 20` with no index or metadata file
//! - **Resumable**: the next request cursor is derived from the last stored
//!   candle, so a continued run never re-fetches or duplicates a record
//! - **Interruptible**: cancellation is polled between pages; a page already in
//!   flight always completes and is persisted before the run stops
//! - **Corruption detection**: a file whose length is not a multiple of the
//!   record size is reported, never silently rounded
//!
//! ## Quick Start
//!
//! ```no_run
//! use candle_loader::fetcher::BinanceKlinesFetcher;
//! use candle_loader::storage::CandleStore;
//! use candle_loader::sync::{initial_cursor, CandleSync, StartMode};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut store = CandleStore::create("ETHUSDT")?;
//! let cursor = initial_cursor(&mut store, StartMode::New { start_time: 1708369200000 })?;
//!
//! let sync = CandleSync::new(BinanceKlinesFetcher::new()?);
//! let outcome = sync.run(&mut store, cursor, "ETHUSDT").await?;
//! println!("{:?}", outcome);
//! store.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`storage`] - Record codec and the append-only candle store
//! - [`fetcher`] - One request per page against the remote klines endpoint
//! - [`parser`] - Decodes one page of wire rows into candles
//! - [`sync`] - The incremental fetch → parse → persist loop
//! - [`shutdown`] - Cooperative cancellation flag
//! - [`metrics`] - Page and candle counters
//! - [`cli`] - Command line surface for the `candle-loader` binary

#![warn(missing_docs)]
#![warn(clippy::all)]

/// CLI command implementation
pub mod cli;

/// Remote page fetching
pub mod fetcher;

/// Observability metrics
pub mod metrics;

/// Wire response parsing
pub mod parser;

/// Graceful shutdown coordination shared across modules
pub mod shutdown;

/// Binary candle storage
pub mod storage;

/// Incremental synchronization loop
pub mod sync;

pub use storage::CandleStore;

/// One time-bucketed price bar as stored on disk.
///
/// `close_time` is the bucket's exclusive upper boundary in epoch seconds,
/// which equals the open time of the next bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Candle {
    /// High price
    pub high: f32,
    /// Low price
    pub low: f32,
    /// Close price
    pub close: f32,
    /// Volume (base asset)
    pub volume: f32,
    /// Close boundary (Unix timestamp in seconds)
    pub close_time: u32,
}

impl Candle {
    /// Close boundary in Unix milliseconds
    pub fn close_time_millis(&self) -> i64 {
        sec_to_milli(self.close_time)
    }
}

/// Convert a stored close time in seconds into a cursor in milliseconds
pub fn sec_to_milli(t: u32) -> i64 {
    i64::from(t) * 1000
}
