//! Main entry point for the candle-loader CLI

use candle_loader::cli::Cli;
use candle_loader::shutdown::{self, SharedShutdown, ShutdownCoordinator};
use clap::Parser;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber with optional JSON formatting.
///
/// Logs go to stderr; stdout carries only command output.
fn init_tracing() {
    let json_format = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("candle_loader=info"));

    if json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

fn request_shutdown(shutdown: &SharedShutdown, signal: &str) {
    if shutdown.request_shutdown() {
        warn!("{} received - stopping after the current page...", signal);
    } else {
        debug!("{} received again, shutdown already pending", signal);
    }
}

/// Forward SIGINT and SIGTERM into the shutdown flag
fn spawn_signal_listener(shutdown: SharedShutdown) {
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                request_shutdown(&shutdown, "Ctrl+C");
            }
        }
    });

    #[cfg(unix)]
    tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                while term.recv().await.is_some() {
                    request_shutdown(&shutdown, "SIGTERM");
                }
            }
            Err(e) => warn!("Failed to install SIGTERM handler: {}", e),
        }
    });
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();

    let shutdown = ShutdownCoordinator::shared();
    shutdown::set_global_shutdown(shutdown.clone());
    spawn_signal_listener(shutdown.clone());

    let code = match cli.execute(shutdown).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{e}");
            e.exit_code()
        }
    };

    std::process::exit(code);
}
