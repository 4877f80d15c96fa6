//! Incremental sync of one symbol's candles into a store
//!
//! A run starts from a cursor (epoch milliseconds) and repeatedly fetches one
//! page, parses it, and appends it. The cursor then moves to the close time of
//! the last stored candle, so consecutive pages line up exactly on bucket
//! boundaries.

pub mod config;
pub mod loader;

pub use loader::CandleSync;

use crate::fetcher::FetcherError;
use crate::parser::ParseError;
use crate::storage::{CandleStore, StorageError};
use serde::Serialize;

/// Errors that end a sync run, labeled by the stage that failed
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Page fetch failed
    #[error("api do request: {0}")]
    Fetch(#[source] FetcherError),

    /// Page payload could not be decoded
    #[error("parse candles: {0}")]
    Parse(#[source] ParseError),

    /// Appending a page to the store failed
    #[error("save candles: {0}")]
    Save(#[source] StorageError),

    /// Reading the resume cursor from the store failed
    #[error("load last close time from storage: {0}")]
    LoadCursor(#[source] StorageError),

    /// Counting the stored candles failed
    #[error("get total candles: {0}")]
    TotalCandles(#[source] StorageError),

    /// A new store was asked to start from timestamp zero
    #[error("start time must be a non-zero epoch millisecond timestamp")]
    InvalidStartTime,
}

impl SyncError {
    /// Whether the error comes from a misaligned store file
    pub fn is_corruption(&self) -> bool {
        match self {
            SyncError::Save(e) | SyncError::LoadCursor(e) | SyncError::TotalCandles(e) => {
                e.is_corruption()
            }
            _ => false,
        }
    }
}

/// Result type for sync operations
pub type SyncResult<T> = Result<T, SyncError>;

/// Where a run starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartMode {
    /// Freshly created store, starting at an explicit timestamp (milliseconds)
    New {
        /// First page cursor
        start_time: i64,
    },
    /// Existing store, resuming after its last candle
    Continue,
}

/// Compute the first cursor of a run.
///
/// # Errors
/// Returns [`SyncError::InvalidStartTime`] for `StartMode::New { start_time: 0 }`
/// and [`SyncError::LoadCursor`] if the store cannot report its last close time.
pub fn initial_cursor(store: &mut CandleStore, mode: StartMode) -> SyncResult<i64> {
    match mode {
        StartMode::New { start_time } if start_time == 0 => Err(SyncError::InvalidStartTime),
        StartMode::New { start_time } => Ok(start_time),
        StartMode::Continue => store.last_close_time().map_err(SyncError::LoadCursor),
    }
}

/// Summary of a run that did not fail
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Symbol that was synced
    pub symbol: String,
    /// Cursor of the first request (milliseconds)
    pub start_cursor: i64,
    /// Cursor the next run would start from (milliseconds)
    pub final_cursor: i64,
    /// Pages persisted
    pub pages: u64,
    /// Candles appended during this run
    pub loaded: u64,
    /// Candles in the store after the run
    pub total: u64,
}

/// Terminal outcome of a run that did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The remote source has no more data
    Finished(SyncReport),
    /// Cancellation was observed between pages
    Interrupted(SyncReport),
}

impl SyncOutcome {
    /// Run summary
    pub fn report(&self) -> &SyncReport {
        match self {
            SyncOutcome::Finished(r) | SyncOutcome::Interrupted(r) => r,
        }
    }

    /// Whether the run stopped on a cancellation request
    pub fn is_interrupted(&self) -> bool {
        matches!(self, SyncOutcome::Interrupted(_))
    }

    /// Short outcome label used in logs and metrics
    pub fn label(&self) -> &'static str {
        match self {
            SyncOutcome::Finished(_) => "finished",
            SyncOutcome::Interrupted(_) => "interrupted",
        }
    }
}
