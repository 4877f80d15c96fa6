//! Append-only candle store backed by a single file

use super::codec::{decode, decode_all, encode, CANDLE_BYTE_SIZE};
use super::{StorageError, StorageResult, DEFAULT_DATA_DIR, DEFAULT_EXT};
use crate::Candle;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const RECORD: u64 = CANDLE_BYTE_SIZE as u64;

/// Number of whole records in `bytes`, or a corruption error naming `context`.
///
/// Every alignment check in the store goes through here.
fn records_in(bytes: u64, context: &'static str) -> StorageResult<u64> {
    if bytes % RECORD != 0 {
        return Err(StorageError::Corrupted { context, bytes });
    }
    Ok(bytes / RECORD)
}

/// Append-only store of fixed-width candle records.
///
/// The forward and backward read cursors are independent: reading forward
/// never changes what [`CandleStore::read_backward`] returns next, and vice versa.
/// Appends always land at the current end of the file.
pub struct CandleStore {
    file: File,
    path: PathBuf,
    /// Byte offset of the next forward read
    read_pos: u64,
    /// Records already returned from the tail by backward reads
    back_consumed: u64,
    read_buf: Vec<u8>,
}

impl CandleStore {
    /// Create a fresh store for `symbol` under `./candles`, truncating any prior content
    pub fn create(symbol: &str) -> StorageResult<Self> {
        Self::create_in(default_data_dir()?, symbol)
    }

    /// Open the existing store for `symbol` under `./candles`
    pub fn open(symbol: &str) -> StorageResult<Self> {
        Self::open_in(default_data_dir()?, symbol)
    }

    /// Create a fresh store for `symbol` inside `dir`
    pub fn create_in<P: AsRef<Path>>(dir: P, symbol: &str) -> StorageResult<Self> {
        Self::create_at(store_path(dir.as_ref(), symbol)?)
    }

    /// Open the existing store for `symbol` inside `dir`
    pub fn open_in<P: AsRef<Path>>(dir: P, symbol: &str) -> StorageResult<Self> {
        Self::open_at(store_path(dir.as_ref(), symbol)?)
    }

    /// Create (or truncate) a store at an explicit path, creating parent directories
    pub fn create_at<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        let path = path.as_ref();
        check_file_name(path)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        info!(path = %path.display(), "Created new candle store");
        Ok(Self::from_file(file, path))
    }

    /// Open an existing store at an explicit path for continuation
    pub fn open_at<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        let path = path.as_ref();
        check_file_name(path)?;

        let file = OpenOptions::new().read(true).write(true).open(path)?;

        info!(path = %path.display(), "Opened existing candle store");
        Ok(Self::from_file(file, path))
    }

    fn from_file(file: File, path: &Path) -> Self {
        Self {
            file,
            path: path.to_path_buf(),
            read_pos: 0,
            back_consumed: 0,
            read_buf: Vec::new(),
        }
    }

    /// Path of the underlying file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append candles to the end of the file, one record per write.
    ///
    /// On failure, records written before the failing one stay in the file.
    pub fn append(&mut self, candles: &[Candle]) -> StorageResult<()> {
        if candles.is_empty() {
            return Ok(());
        }

        self.file.seek(SeekFrom::End(0))?;
        for candle in candles {
            self.file.write_all(&encode(candle))?;
        }

        debug!(count = candles.len(), "Appended candles");
        Ok(())
    }

    /// Raw file length in bytes
    pub fn size_bytes(&self) -> StorageResult<u64> {
        Ok(self.file.metadata()?.len())
    }

    /// Number of stored records
    pub fn size_in_records(&self) -> StorageResult<u64> {
        records_in(self.size_bytes()?, "get size from")
    }

    /// Read up to `count` records at the forward cursor and advance it.
    ///
    /// Returns the candles read and whether the cursor reached the end of the file.
    pub fn read_forward(&mut self, count: usize) -> StorageResult<(Vec<Candle>, bool)> {
        let total_bytes = self.size_in_records()? * RECORD;
        let want = (count as u64)
            .saturating_mul(RECORD)
            .min(total_bytes.saturating_sub(self.read_pos));

        let n = self.read_bytes_at(self.read_pos, want)?;
        let records = records_in(n, "read from")?;
        self.read_pos += n;

        let mut candles = Vec::with_capacity(records as usize);
        decode_all(&self.read_buf, &mut candles);
        Ok((candles, self.read_pos >= total_bytes))
    }

    /// Read up to `count` records ending where the previous backward read started.
    ///
    /// The first call ends at the last record of the file. Candles are returned in
    /// file order. The flag is true once the start of the file has been reached.
    pub fn read_backward(&mut self, count: usize) -> StorageResult<(Vec<Candle>, bool)> {
        let total = self.size_in_records()?;
        let end = total.saturating_sub(self.back_consumed);
        let start = end.saturating_sub(count as u64);

        let n = self.read_bytes_at(start * RECORD, (end - start) * RECORD)?;
        let records = records_in(n, "read from")?;
        self.back_consumed += records;

        let mut candles = Vec::with_capacity(records as usize);
        decode_all(&self.read_buf, &mut candles);
        Ok((candles, start == 0))
    }

    /// Read every record in the file without touching either cursor
    pub fn read_all(&mut self) -> StorageResult<Vec<Candle>> {
        let total = self.size_in_records()?;
        let n = self.read_bytes_at(0, total * RECORD)?;
        let records = records_in(n, "read from")?;

        let mut candles = Vec::with_capacity(records as usize);
        decode_all(&self.read_buf, &mut candles);
        Ok(candles)
    }

    /// Close time of the first record in milliseconds, 0 when there is none
    pub fn first_close_time(&mut self) -> StorageResult<i64> {
        if self.size_bytes()? < RECORD {
            return Ok(0);
        }
        self.size_in_records()?;
        Ok(self.read_record(0)?.close_time_millis())
    }

    /// Close time of the last record in milliseconds, 0 when there is none
    pub fn last_close_time(&mut self) -> StorageResult<i64> {
        if self.size_bytes()? < RECORD {
            return Ok(0);
        }
        let total = self.size_in_records()?;
        Ok(self.read_record(total - 1)?.close_time_millis())
    }

    /// Flush to disk and release the file handle
    pub fn close(self) -> StorageResult<()> {
        self.file.sync_all()?;
        debug!(path = %self.path.display(), "Closed candle store");
        Ok(())
    }

    fn read_record(&mut self, index: u64) -> StorageResult<Candle> {
        let n = self.read_bytes_at(index * RECORD, RECORD)?;
        if n != RECORD {
            return Err(StorageError::Corrupted {
                context: "read record from",
                bytes: n,
            });
        }
        let mut record = [0u8; CANDLE_BYTE_SIZE];
        record.copy_from_slice(&self.read_buf);
        Ok(decode(&record))
    }

    /// Fill `read_buf` with up to `len` bytes starting at `offset`; returns bytes read
    fn read_bytes_at(&mut self, offset: u64, len: u64) -> StorageResult<u64> {
        self.read_buf.clear();
        if len == 0 {
            return Ok(0);
        }
        self.file.seek(SeekFrom::Start(offset))?;
        (&mut self.file).take(len).read_to_end(&mut self.read_buf)?;
        Ok(self.read_buf.len() as u64)
    }
}

fn default_data_dir() -> StorageResult<PathBuf> {
    Ok(std::env::current_dir()?.join(DEFAULT_DATA_DIR))
}

fn store_path(dir: &Path, symbol: &str) -> StorageResult<PathBuf> {
    if symbol.is_empty() {
        return Err(StorageError::InvalidPath("symbol is required".to_string()));
    }
    Ok(dir.join(format!("{symbol}{DEFAULT_EXT}")))
}

fn check_file_name(path: &Path) -> StorageResult<()> {
    if path.file_name().is_none() {
        return Err(StorageError::InvalidPath(format!(
            "file name is required: {}",
            path.display()
        )));
    }
    Ok(())
}
