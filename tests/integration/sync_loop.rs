//! Sync loop scenarios driven by a scripted page source

use async_trait::async_trait;
use bytes::Bytes;
use candle_loader::fetcher::{FetcherError, FetcherResult, PageSource, PAGE_LIMIT};
use candle_loader::shutdown::{SharedShutdown, ShutdownCoordinator};
use candle_loader::storage::CandleStore;
use candle_loader::sync::{initial_cursor, CandleSync, StartMode, SyncError, SyncOutcome};
use candle_loader::Candle;
use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Serves pre-built responses in order and records every requested cursor
struct ScriptedSource {
    responses: Mutex<VecDeque<FetcherResult<Bytes>>>,
    cursors: Arc<Mutex<Vec<i64>>>,
    /// Requested on every fetch, simulating a signal arriving mid-request
    trip: Option<SharedShutdown>,
}

impl ScriptedSource {
    fn new(responses: Vec<FetcherResult<Bytes>>) -> (Self, Arc<Mutex<Vec<i64>>>) {
        let cursors = Arc::new(Mutex::new(Vec::new()));
        let source = Self {
            responses: Mutex::new(responses.into()),
            cursors: Arc::clone(&cursors),
            trip: None,
        };
        (source, cursors)
    }

    fn tripping(mut self, shutdown: SharedShutdown) -> Self {
        self.trip = Some(shutdown);
        self
    }
}

#[async_trait]
impl PageSource for ScriptedSource {
    async fn fetch_page(&self, symbol: &str, start_time: i64) -> FetcherResult<Bytes> {
        assert_eq!(symbol, "ETHUSDT");
        self.cursors.lock().unwrap().push(start_time);
        if let Some(shutdown) = &self.trip {
            shutdown.request_shutdown();
        }
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(FetcherError::NetworkError("script exhausted".into())))
    }
}

/// A page of `rows` one-second klines whose first bucket opens at `open_secs`
fn page(open_secs: u64, rows: usize) -> FetcherResult<Bytes> {
    let rows: Vec<_> = (0..rows as u64)
        .map(|i| {
            let open_ms = (open_secs + i) * 1000;
            serde_json::json!([
                open_ms, "10.0", "11.5", "9.5", "10.5", "3.25", open_ms + 999,
                "34.1", 7, "1.0", "10.0", "0"
            ])
        })
        .collect();
    Ok(Bytes::from(serde_json::to_vec(&rows).unwrap()))
}

fn candle(close_time: u32) -> Candle {
    Candle {
        high: 1.0,
        low: 1.0,
        close: 1.0,
        volume: 1.0,
        close_time,
    }
}

const START_SECS: u64 = 1708369200;
const START_MS: i64 = 1708369200000;

#[tokio::test]
async fn test_short_page_finishes_after_one_fetch() {
    let temp_dir = TempDir::new().unwrap();
    let mut store = CandleStore::create_in(temp_dir.path(), "ETHUSDT").unwrap();
    let (source, cursors) = ScriptedSource::new(vec![page(START_SECS, 3)]);

    let sync = CandleSync::new(source).with_shutdown(ShutdownCoordinator::shared());
    let outcome = sync.run(&mut store, START_MS, "ETHUSDT").await.unwrap();

    let report = match outcome {
        SyncOutcome::Finished(report) => report,
        other => panic!("expected Finished, got {other:?}"),
    };
    assert_eq!(report.loaded, 3);
    assert_eq!(report.total, 3);
    assert_eq!(report.pages, 1);
    assert_eq!(report.start_cursor, START_MS);
    assert_eq!(report.final_cursor, (START_SECS as i64 + 3) * 1000);
    assert_eq!(*cursors.lock().unwrap(), vec![START_MS]);
}

#[tokio::test]
async fn test_cursor_advances_to_last_close_time() {
    let temp_dir = TempDir::new().unwrap();
    let mut store = CandleStore::create_in(temp_dir.path(), "ETHUSDT").unwrap();
    let next_open = START_SECS + PAGE_LIMIT as u64;
    let (source, cursors) =
        ScriptedSource::new(vec![page(START_SECS, PAGE_LIMIT), page(next_open, 5)]);

    let sync = CandleSync::new(source).with_shutdown(ShutdownCoordinator::shared());
    let outcome = sync.run(&mut store, START_MS, "ETHUSDT").await.unwrap();

    assert!(!outcome.is_interrupted());
    assert_eq!(outcome.report().loaded, PAGE_LIMIT as u64 + 5);
    assert_eq!(outcome.report().pages, 2);
    assert_eq!(
        *cursors.lock().unwrap(),
        vec![START_MS, next_open as i64 * 1000]
    );

    let all = store.read_all().unwrap();
    assert_eq!(all.len(), PAGE_LIMIT + 5);
    for (i, c) in all.iter().enumerate() {
        assert_eq!(c.close_time as u64, START_SECS + i as u64 + 1);
    }
}

#[tokio::test]
async fn test_empty_page_finishes_without_writing() {
    let temp_dir = TempDir::new().unwrap();
    let mut store = CandleStore::create_in(temp_dir.path(), "ETHUSDT").unwrap();
    let (source, cursors) = ScriptedSource::new(vec![page(START_SECS, 0)]);

    let sync = CandleSync::new(source).with_shutdown(ShutdownCoordinator::shared());
    let outcome = sync.run(&mut store, START_MS, "ETHUSDT").await.unwrap();

    assert_eq!(outcome.label(), "finished");
    assert_eq!(outcome.report().loaded, 0);
    assert_eq!(outcome.report().pages, 0);
    assert_eq!(outcome.report().final_cursor, START_MS);
    assert_eq!(cursors.lock().unwrap().len(), 1);
    assert_eq!(store.size_in_records().unwrap(), 0);
}

#[tokio::test]
async fn test_continue_resumes_after_last_stored_candle() {
    let temp_dir = TempDir::new().unwrap();
    let last = START_SECS as u32 + 10;
    {
        let mut store = CandleStore::create_in(temp_dir.path(), "ETHUSDT").unwrap();
        store.append(&[candle(last - 1), candle(last)]).unwrap();
        store.close().unwrap();
    }

    let mut store = CandleStore::open_in(temp_dir.path(), "ETHUSDT").unwrap();
    let cursor = initial_cursor(&mut store, StartMode::Continue).unwrap();
    assert_eq!(cursor, i64::from(last) * 1000);

    let (source, cursors) = ScriptedSource::new(vec![page(u64::from(last), 2)]);
    let sync = CandleSync::new(source).with_shutdown(ShutdownCoordinator::shared());
    let outcome = sync.run(&mut store, cursor, "ETHUSDT").await.unwrap();

    assert_eq!(*cursors.lock().unwrap(), vec![i64::from(last) * 1000]);
    assert_eq!(outcome.report().loaded, 2);
    assert_eq!(outcome.report().total, 4);

    let close_times: Vec<u32> = store.read_all().unwrap().iter().map(|c| c.close_time).collect();
    assert_eq!(close_times, vec![last - 1, last, last + 1, last + 2]);
}

#[tokio::test]
async fn test_interrupt_after_first_page() {
    let temp_dir = TempDir::new().unwrap();
    let mut store = CandleStore::create_in(temp_dir.path(), "ETHUSDT").unwrap();
    let shutdown = ShutdownCoordinator::shared();
    let (source, cursors) = ScriptedSource::new(vec![
        page(START_SECS, PAGE_LIMIT),
        page(START_SECS + PAGE_LIMIT as u64, PAGE_LIMIT),
    ]);
    let source = source.tripping(Arc::clone(&shutdown));

    let sync = CandleSync::new(source).with_shutdown(shutdown);
    let outcome = sync.run(&mut store, START_MS, "ETHUSDT").await.unwrap();

    let report = match outcome {
        SyncOutcome::Interrupted(report) => report,
        other => panic!("expected Interrupted, got {other:?}"),
    };
    assert_eq!(report.loaded, PAGE_LIMIT as u64);
    assert_eq!(report.total, PAGE_LIMIT as u64);
    assert_eq!(cursors.lock().unwrap().len(), 1);
    assert_eq!(store.size_in_records().unwrap(), PAGE_LIMIT as u64);
}

#[tokio::test]
async fn test_pending_shutdown_still_completes_in_flight_page() {
    let temp_dir = TempDir::new().unwrap();
    let mut store = CandleStore::create_in(temp_dir.path(), "ETHUSDT").unwrap();
    let shutdown = ShutdownCoordinator::shared();
    shutdown.request_shutdown();
    let (source, cursors) = ScriptedSource::new(vec![page(START_SECS, PAGE_LIMIT)]);

    let sync = CandleSync::new(source).with_shutdown(shutdown);
    let outcome = sync.run(&mut store, START_MS, "ETHUSDT").await.unwrap();

    assert!(outcome.is_interrupted());
    assert_eq!(cursors.lock().unwrap().len(), 1);
    assert_eq!(store.size_in_records().unwrap(), PAGE_LIMIT as u64);
}

#[tokio::test]
async fn test_end_of_data_wins_over_shutdown() {
    let temp_dir = TempDir::new().unwrap();
    let mut store = CandleStore::create_in(temp_dir.path(), "ETHUSDT").unwrap();
    let shutdown = ShutdownCoordinator::shared();
    let (source, cursors) = ScriptedSource::new(vec![page(START_SECS, 999)]);
    let source = source.tripping(Arc::clone(&shutdown));

    let sync = CandleSync::new(source).with_shutdown(shutdown);
    let outcome = sync.run(&mut store, START_MS, "ETHUSDT").await.unwrap();

    assert!(matches!(outcome, SyncOutcome::Finished(_)));
    assert_eq!(cursors.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_fetch_error_fails_and_keeps_earlier_pages() {
    let temp_dir = TempDir::new().unwrap();
    let mut store = CandleStore::create_in(temp_dir.path(), "ETHUSDT").unwrap();
    let (source, cursors) = ScriptedSource::new(vec![
        page(START_SECS, PAGE_LIMIT),
        Err(FetcherError::TimeoutError("deadline elapsed".into())),
    ]);

    let sync = CandleSync::new(source).with_shutdown(ShutdownCoordinator::shared());
    let err = sync.run(&mut store, START_MS, "ETHUSDT").await.unwrap_err();

    assert!(matches!(err, SyncError::Fetch(FetcherError::TimeoutError(_))));
    assert!(err.to_string().starts_with("api do request: "));
    assert_eq!(cursors.lock().unwrap().len(), 2);
    assert_eq!(store.size_in_records().unwrap(), PAGE_LIMIT as u64);
}

#[tokio::test]
async fn test_malformed_page_fails_without_writing() {
    let temp_dir = TempDir::new().unwrap();
    let mut store = CandleStore::create_in(temp_dir.path(), "ETHUSDT").unwrap();
    let (source, _) = ScriptedSource::new(vec![Ok(Bytes::from_static(
        br#"{"code":-1121,"msg":"Invalid symbol."}"#,
    ))]);

    let sync = CandleSync::new(source).with_shutdown(ShutdownCoordinator::shared());
    let err = sync.run(&mut store, START_MS, "ETHUSDT").await.unwrap_err();

    assert!(matches!(err, SyncError::Parse(_)));
    assert!(err.to_string().starts_with("parse candles: "));
    assert_eq!(store.size_in_records().unwrap(), 0);
}

#[tokio::test]
async fn test_corrupted_store_fails_before_fetching() {
    let temp_dir = TempDir::new().unwrap();
    let mut store = CandleStore::create_in(temp_dir.path(), "ETHUSDT").unwrap();
    store.append(&[candle(1)]).unwrap();
    OpenOptions::new()
        .append(true)
        .open(store.path())
        .unwrap()
        .write_all(&[0, 0, 0])
        .unwrap();

    let (source, cursors) = ScriptedSource::new(vec![page(START_SECS, 1)]);
    let sync = CandleSync::new(source).with_shutdown(ShutdownCoordinator::shared());
    let err = sync.run(&mut store, START_MS, "ETHUSDT").await.unwrap_err();

    assert!(err.is_corruption());
    assert!(matches!(err, SyncError::TotalCandles(_)));
    assert!(cursors.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_progress_bar_counts_stored_candles() {
    let temp_dir = TempDir::new().unwrap();
    let mut store = CandleStore::create_in(temp_dir.path(), "ETHUSDT").unwrap();
    let (source, _) = ScriptedSource::new(vec![page(START_SECS, PAGE_LIMIT), page(START_SECS + 1000, 7)]);
    let bar = indicatif::ProgressBar::hidden();

    let sync = CandleSync::new(source)
        .with_shutdown(ShutdownCoordinator::shared())
        .with_progress(bar.clone());
    sync.run(&mut store, START_MS, "ETHUSDT").await.unwrap();

    assert_eq!(bar.position(), PAGE_LIMIT as u64 + 7);
}
