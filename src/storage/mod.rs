//! Binary candle storage
//!
//! One append-only file per symbol holding a flat sequence of fixed 20-byte
//! records. Offsets are always `record_index * CANDLE_BYTE_SIZE`; the only
//! possible corruption is a truncated tail, detected by a modulo check.

pub mod codec;
pub mod file;

pub use codec::{decode, encode, CANDLE_BYTE_SIZE};
pub use file::CandleStore;

/// Default data directory, relative to the working directory
pub const DEFAULT_DATA_DIR: &str = "candles";

/// Default extension of a candle store file
pub const DEFAULT_EXT: &str = ".bin";

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// IO error while creating, opening, reading or writing the store
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// File length (or a read) is not a whole number of records
    #[error("{context} a corrupted candles file: {bytes} bytes is not a multiple of {CANDLE_BYTE_SIZE}")]
    Corrupted {
        /// Operation that detected the corruption
        context: &'static str,
        /// Offending byte count
        bytes: u64,
    },

    /// Store path has no file name
    #[error("invalid store path: {0}")]
    InvalidPath(String),
}

impl StorageError {
    /// Whether this error is a record alignment failure
    pub fn is_corruption(&self) -> bool {
        matches!(self, StorageError::Corrupted { .. })
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
