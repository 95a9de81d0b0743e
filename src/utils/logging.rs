//! Logging initialisation
//!
//! Human-readable output on stdout, plus structured JSON in a daily rolling
//! file when `LOG_DIR` is set.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter when `RUST_LOG` is not set
const DEFAULT_FILTER: &str = "info,access_log_watcher=debug";

/// Initialise the global tracing subscriber.
///
/// The log level is controlled by `RUST_LOG` (default `info,access_log_watcher=debug`).
/// When `LOG_DIR` is set, JSON lines are additionally written to
/// `LOG_DIR/watcher.log.YYYY-MM-DD`.
///
/// The returned `WorkerGuard` must be held by `main` so buffered file output
/// is flushed on exit.
pub fn init_logging() -> Option<WorkerGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let stdout_layer = fmt::layer()
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_target(false);

    let (file_layer, guard) = match std::env::var("LOG_DIR") {
        Ok(log_dir) if !log_dir.trim().is_empty() => {
            let file_appender = rolling::daily(log_dir.trim(), "watcher.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = fmt::layer()
                .json()
                .with_timer(fmt::time::UtcTime::rfc_3339())
                .with_current_span(true)
                .flatten_event(false)
                .with_ansi(false)
                .with_writer(non_blocking);
            (Some(layer), Some(guard))
        }
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .or_else(|err| {
            // Detect "already initialized" via source downcasting
            use std::error::Error;
            if err
                .source()
                .and_then(|s| s.downcast_ref::<tracing::dispatcher::SetGlobalDefaultError>())
                .is_some()
            {
                return Ok(());
            }
            eprintln!("Failed to initialize tracing: {}", err);
            Err(err)
        })
        .ok();

    guard
}
