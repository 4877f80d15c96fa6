//! Load command: sync one symbol, or print its stored date range

use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};

use super::dates::{format_close_time, parse_start_time};
use super::{CliError, EXIT_INTERRUPT, EXIT_OK};
use crate::fetcher::BinanceKlinesFetcher;
use crate::shutdown::SharedShutdown;
use crate::storage::{CandleStore, DEFAULT_DATA_DIR};
use crate::sync::config::MAX_RETRIES_LIMIT;
use crate::sync::{
    initial_cursor, CandleSync, StartMode, SyncOutcome, SyncReport, SyncResult,
};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}

/// Candle loader CLI
#[derive(Parser, Debug)]
#[command(name = "candle-loader")]
#[command(about = "Load 1-second candles for a symbol into a local binary store", long_about = None)]
#[command(version)]
pub struct Cli {
    /// The pair for which to load price data (e.g., ETHUSDT)
    #[arg(short = 's', long)]
    pub symbol: Option<String>,

    /// Init a new store for the symbol, truncating any existing one
    #[arg(short = 'n', long)]
    pub is_new: bool,

    /// UTC date to start downloading from (format like 2024-02-19 03:37:05)
    #[arg(short = 't', long)]
    pub start_time: Option<String>,

    /// Print the close time of the first stored candle and exit
    #[arg(long, conflicts_with = "show_end")]
    pub show_start: bool,

    /// Print the close time of the last stored candle and exit
    #[arg(long)]
    pub show_end: bool,

    /// Directory holding the candle stores
    #[arg(long, default_value = DEFAULT_DATA_DIR)]
    pub data_dir: PathBuf,

    /// Override the API base URL
    #[arg(long)]
    pub base_url: Option<String>,

    /// Retries per page for transient failures (default: 0, max: 10)
    #[arg(long, default_value = "0", value_parser = clap::value_parser!(u32).range(0..=i64::from(MAX_RETRIES_LIMIT)))]
    pub max_retries: u32,

    /// Output format (json or human)
    #[arg(long, value_enum, default_value = "human")]
    pub output_format: OutputFormat,

    /// Serve Prometheus metrics on this address (e.g., 127.0.0.1:9000)
    #[arg(long)]
    pub metrics_addr: Option<SocketAddr>,
}

/// What a validated invocation does
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Sync candles
    Load(StartMode),
    /// Print the first stored close time
    ShowStart,
    /// Print the last stored close time
    ShowEnd,
}

/// Validated options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOptions {
    /// Upper-cased symbol
    pub symbol: String,
    /// Requested action
    pub action: Action,
}

impl Cli {
    /// Validate option combinations.
    ///
    /// # Errors
    /// - [`CliError::SymbolRequired`] if the symbol is missing or blank
    /// - [`CliError::InvalidStartTime`] if `--start-time` does not parse
    /// - [`CliError::StartTimeRequired`] for `--is-new` without `--start-time`
    /// - [`CliError::StartTimeWithoutNew`] for `--start-time` without `--is-new`
    pub fn validate(&self) -> Result<LoadOptions, CliError> {
        let symbol = self
            .symbol
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_uppercase)
            .ok_or(CliError::SymbolRequired)?;

        let start_time = self
            .start_time
            .as_deref()
            .map(parse_start_time)
            .transpose()
            .map_err(CliError::InvalidStartTime)?
            .filter(|&t| t != 0);

        if self.show_start || self.show_end {
            if self.is_new || start_time.is_some() {
                return Err(CliError::InvalidArgument(
                    "--show-start/--show-end read an existing store and take no --is-new or --start-time"
                        .to_string(),
                ));
            }
            let action = if self.show_start {
                Action::ShowStart
            } else {
                Action::ShowEnd
            };
            return Ok(LoadOptions { symbol, action });
        }

        let mode = match (self.is_new, start_time) {
            (true, Some(start_time)) => StartMode::New { start_time },
            (true, None) => return Err(CliError::StartTimeRequired),
            (false, Some(_)) => return Err(CliError::StartTimeWithoutNew),
            (false, None) => StartMode::Continue,
        };

        Ok(LoadOptions {
            symbol,
            action: Action::Load(mode),
        })
    }

    /// Run the command, returning the process exit code on success
    pub async fn execute(&self, shutdown: SharedShutdown) -> Result<i32, CliError> {
        let opts = self.validate()?;

        if let Some(addr) = self.metrics_addr {
            crate::metrics::init_metrics(addr).map_err(CliError::ConfigurationError)?;
        }

        match opts.action {
            Action::ShowStart | Action::ShowEnd => {
                let t = self.stored_close_time(&opts.symbol, &opts.action)?;
                self.print_date(&opts.symbol, t);
                Ok(EXIT_OK)
            }
            Action::Load(mode) => self.load(&opts.symbol, mode, shutdown).await,
        }
    }

    /// Close time (milliseconds) that `--show-start`/`--show-end` print, 0 for an empty store
    ///
    /// # Errors
    /// Fails if the store cannot be opened or read, or if `action` is not a show action.
    pub fn stored_close_time(&self, symbol: &str, action: &Action) -> Result<i64, CliError> {
        let mut store = self.open_store(symbol)?;
        let t = match action {
            Action::ShowStart => store
                .first_close_time()
                .map_err(CliError::ReadFirstCloseTime)?,
            Action::ShowEnd => store
                .last_close_time()
                .map_err(CliError::ReadLastCloseTime)?,
            Action::Load(_) => {
                return Err(CliError::InvalidArgument(
                    "only --show-start/--show-end read a stored close time".to_string(),
                ))
            }
        };
        store.close().map_err(CliError::CloseStorage)?;
        Ok(t)
    }

    async fn load(
        &self,
        symbol: &str,
        mode: StartMode,
        shutdown: SharedShutdown,
    ) -> Result<i32, CliError> {
        let mut store = match mode {
            StartMode::New { .. } => CandleStore::create_in(&self.data_dir, symbol)
                .map_err(CliError::InitStorage)?,
            StartMode::Continue => self.open_store(symbol)?,
        };
        info!(symbol, path = %store.path().display(), "Store ready");

        let cursor = initial_cursor(&mut store, mode)?;

        let mut fetcher = BinanceKlinesFetcher::new()?.with_max_retries(self.max_retries);
        if let Some(base_url) = &self.base_url {
            fetcher = fetcher.with_base_url(base_url.as_str());
        }

        let mut sync = CandleSync::new(fetcher).with_shutdown(shutdown);
        let progress = (self.output_format == OutputFormat::Human).then(|| create_spinner(symbol));
        if let Some(bar) = &progress {
            sync = sync.with_progress(bar.clone());
        }

        let result = sync.run(&mut store, cursor, symbol).await;

        if let Some(bar) = progress {
            bar.finish_and_clear();
        }

        // Flush on every path
        let closed = store.close().map_err(CliError::CloseStorage);
        let outcome = settle_run(result, closed)?;

        self.print_outcome(&outcome);
        Ok(match outcome {
            SyncOutcome::Finished(_) => EXIT_OK,
            SyncOutcome::Interrupted(_) => EXIT_INTERRUPT,
        })
    }

    fn open_store(&self, symbol: &str) -> Result<CandleStore, CliError> {
        CandleStore::open_in(&self.data_dir, symbol).map_err(CliError::OpenStorage)
    }

    fn print_date(&self, symbol: &str, millis: i64) {
        match self.output_format {
            OutputFormat::Human => println!("{}", format_close_time(millis)),
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "symbol": symbol,
                    "close_time": (millis != 0).then_some(millis),
                    "date": (millis != 0).then(|| format_close_time(millis)),
                });
                println!("{output}");
            }
        }
    }

    fn print_outcome(&self, outcome: &SyncOutcome) {
        match self.output_format {
            OutputFormat::Human => println!("{}", human_summary(outcome)),
            OutputFormat::Json => {
                let output = JsonSummary {
                    status: outcome.label(),
                    report: outcome.report(),
                };
                match serde_json::to_string(&output) {
                    Ok(line) => println!("{line}"),
                    Err(e) => error!("Failed to serialize summary: {}", e),
                }
            }
        }
    }
}

#[derive(Serialize)]
struct JsonSummary<'a> {
    status: &'static str,
    #[serde(flatten)]
    report: &'a SyncReport,
}

/// One-line summary printed after a run
/// Combine the sync result with the store close result.
///
/// A sync failure takes precedence; a close failure on that path is only logged.
fn settle_run(
    result: SyncResult<SyncOutcome>,
    closed: Result<(), CliError>,
) -> Result<SyncOutcome, CliError> {
    match (result, closed) {
        (Ok(outcome), closed) => closed.map(|()| outcome),
        (Err(e), closed) => {
            error!("Sync failed: {}", e);
            if let Err(close_err) = closed {
                warn!("Store not flushed after failed sync: {}", close_err);
            }
            Err(e.into())
        }
    }
}

pub fn human_summary(outcome: &SyncOutcome) -> String {
    match outcome {
        SyncOutcome::Finished(r) => format!(
            "All done! Loaded {} candles, total candles {}",
            r.loaded, r.total
        ),
        SyncOutcome::Interrupted(_) => "Interrupted!".to_string(),
    }
}

fn create_spinner(symbol: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) =
        ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {pos} candles {msg}")
    {
        pb.set_style(style);
    }
    pb.set_message(format!("Loading {symbol} 1s"));
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}
