//! Page-at-a-time sync loop
//!
//! Each iteration runs fetch, parse and persist strictly in sequence. The
//! shutdown flag is polled only after a page has been persisted, so a request
//! in flight always completes and every stored page is whole.

use bytes::Bytes;
use indicatif::ProgressBar;
use tracing::{debug, info, info_span, warn, Instrument};

use super::{SyncError, SyncOutcome, SyncReport, SyncResult};
use crate::fetcher::PageSource;
use crate::metrics::SyncMetrics;
use crate::parser::{parse_candles, CandlePage};
use crate::shutdown::{self, SharedShutdown};
use crate::storage::CandleStore;
use crate::sec_to_milli;

/// Loop states between the first fetch and a terminal outcome
enum SyncState {
    Fetching,
    Parsing(Bytes),
    Persisting,
    Finished,
    Interrupted,
}

/// Running totals of one run
#[derive(Debug, Default)]
struct Progress {
    cursor: i64,
    pages: u64,
    loaded: u64,
}

/// Drives a [`PageSource`] into a [`CandleStore`]
pub struct CandleSync {
    source: Box<dyn PageSource>,
    shutdown: Option<SharedShutdown>,
    progress: Option<ProgressBar>,
}

impl CandleSync {
    /// Create a sync over `source`, observing the global shutdown handle if one is registered
    pub fn new(source: impl PageSource + 'static) -> Self {
        Self::from_boxed(Box::new(source))
    }

    /// Create a sync over an already boxed source
    pub fn from_boxed(source: Box<dyn PageSource>) -> Self {
        Self {
            source,
            shutdown: shutdown::get_global_shutdown(),
            progress: None,
        }
    }

    /// Observe `shutdown` instead of the global handle
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Report stored candles on `bar`
    pub fn with_progress(mut self, bar: ProgressBar) -> Self {
        self.progress = Some(bar);
        self
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown
            .as_ref()
            .is_some_and(|s| s.is_shutdown_requested())
    }

    /// Sync `symbol` into `store` starting at `cursor` (milliseconds).
    ///
    /// # Returns
    /// [`SyncOutcome::Finished`] once a page comes back short of the page limit,
    /// or [`SyncOutcome::Interrupted`] if shutdown was requested after a full page.
    ///
    /// # Errors
    /// Any fetch, parse or store failure ends the run. Pages persisted before
    /// the failure stay in the store.
    pub async fn run(
        &self,
        store: &mut CandleStore,
        cursor: i64,
        symbol: &str,
    ) -> SyncResult<SyncOutcome> {
        let span = info_span!("sync", symbol = %symbol, start_cursor = cursor);
        let metrics = SyncMetrics::start(symbol);

        let result = self
            .drive(store, cursor, symbol, &metrics)
            .instrument(span)
            .await;

        match &result {
            Ok(outcome) => metrics.record_complete(outcome.label(), outcome.report().loaded),
            Err(e) => metrics.record_failure(&e.to_string()),
        }

        result
    }

    async fn drive(
        &self,
        store: &mut CandleStore,
        start_cursor: i64,
        symbol: &str,
        metrics: &SyncMetrics,
    ) -> SyncResult<SyncOutcome> {
        let existing = store.size_in_records().map_err(SyncError::TotalCandles)?;
        info!(existing, "Starting sync");

        let mut page = CandlePage::new();
        let mut progress = Progress {
            cursor: start_cursor,
            ..Progress::default()
        };
        let mut state = SyncState::Fetching;

        let interrupted = loop {
            state = match state {
                SyncState::Fetching => {
                    debug!(cursor = progress.cursor, "Fetching page");
                    let body = self
                        .source
                        .fetch_page(symbol, progress.cursor)
                        .await
                        .map_err(SyncError::Fetch)?;
                    SyncState::Parsing(body)
                }
                SyncState::Parsing(body) => {
                    let count = parse_candles(&body, &mut page).map_err(SyncError::Parse)?;
                    debug!(count, "Parsed page");
                    SyncState::Persisting
                }
                SyncState::Persisting => self.persist(store, &page, &mut progress, metrics)?,
                SyncState::Finished => break false,
                SyncState::Interrupted => break true,
            };
        };

        let total = store.size_in_records().map_err(SyncError::TotalCandles)?;
        let report = SyncReport {
            symbol: symbol.to_string(),
            start_cursor,
            final_cursor: progress.cursor,
            pages: progress.pages,
            loaded: progress.loaded,
            total,
        };

        if interrupted {
            warn!(
                loaded = report.loaded,
                cursor = report.final_cursor,
                "Sync interrupted"
            );
            Ok(SyncOutcome::Interrupted(report))
        } else {
            info!(
                loaded = report.loaded,
                total = report.total,
                "Sync finished"
            );
            Ok(SyncOutcome::Finished(report))
        }
    }

    /// Append the parsed page and pick the next state.
    ///
    /// End of data wins over a pending shutdown request.
    fn persist(
        &self,
        store: &mut CandleStore,
        page: &CandlePage,
        progress: &mut Progress,
        metrics: &SyncMetrics,
    ) -> SyncResult<SyncState> {
        let Some(last) = page.last() else {
            debug!(cursor = progress.cursor, "Empty page, no more data");
            return Ok(SyncState::Finished);
        };

        store.append(page.as_slice()).map_err(SyncError::Save)?;

        let count = page.len();
        progress.pages += 1;
        progress.loaded += count as u64;
        progress.cursor = sec_to_milli(last.close_time);
        metrics.record_page(count);

        if let Some(bar) = &self.progress {
            bar.inc(count as u64);
        }
        debug!(
            count,
            loaded = progress.loaded,
            cursor = progress.cursor,
            "Persisted page"
        );

        if !page.is_full() {
            return Ok(SyncState::Finished);
        }
        if self.shutdown_requested() {
            return Ok(SyncState::Interrupted);
        }
        Ok(SyncState::Fetching)
    }
}
