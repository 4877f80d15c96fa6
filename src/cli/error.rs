//! CLI error types and conversions

use crate::fetcher::FetcherError;
use crate::storage::StorageError;
use crate::sync::SyncError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// `--symbol` missing or empty
    #[error("symbol is required")]
    SymbolRequired,

    /// `--is-new` given without `--start-time`
    #[error("start-time is required for a new instance")]
    StartTimeRequired,

    /// `--start-time` given without `--is-new`
    #[error("start-time is required only for a new instance")]
    StartTimeWithoutNew,

    /// `--start-time` is not `YYYY-MM-DD HH:MM:SS`
    #[error("parse options start time: {0}")]
    InvalidStartTime(#[source] chrono::ParseError),

    /// Creating a fresh store failed
    #[error("init new storage: {0}")]
    InitStorage(#[source] StorageError),

    /// Opening an existing store failed
    #[error("open storage: {0}")]
    OpenStorage(#[source] StorageError),

    /// Reading the first close time for `--show-start` failed
    #[error("read storage first close time: {0}")]
    ReadFirstCloseTime(#[source] StorageError),

    /// Reading the last close time for `--show-end` failed
    #[error("read storage last close time: {0}")]
    ReadLastCloseTime(#[source] StorageError),

    /// Flushing the store at exit failed
    #[error("close storage: {0}")]
    CloseStorage(#[source] StorageError),

    /// Sync run failed
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// Fetcher error
    #[error("fetcher error: {0}")]
    FetcherError(#[from] FetcherError),

    /// Invalid argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    ConfigurationError(String),
}

impl CliError {
    /// Whether this is one of the option validation errors
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            CliError::SymbolRequired | CliError::StartTimeRequired | CliError::StartTimeWithoutNew
        )
    }

    /// Process exit code for this error.
    ///
    /// The option validation errors exit with 0, everything else with 1.
    pub fn exit_code(&self) -> i32 {
        if self.is_validation() {
            super::EXIT_OK
        } else {
            super::EXIT_ERROR
        }
    }
}
