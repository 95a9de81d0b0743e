use access_log_watcher::config::WatcherConfig;
use access_log_watcher::shutdown::wait_for_stop;
use access_log_watcher::utils::{logging::init_logging, SystemClock};
use access_log_watcher::run_watcher;
use std::process::ExitCode;
use std::sync::Arc;

#[tokio::main]
async fn main() -> ExitCode {
    // 1. Load .env if present
    dotenvy::dotenv().ok();

    // 2. Logging
    let _guard = init_logging();

    // 3. Configuration
    let config = match WatcherConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(log_path = %config.log_path.display(), "👀 Log watcher starting");

    // 4. Follow the log until interrupted
    let stop = async {
        let signal = wait_for_stop().await;
        tracing::info!(%signal, "Stop requested, flushing pending alerts");
    };

    match run_watcher(config, Arc::new(SystemClock), stop).await {
        Ok(_) => {
            println!("👋 Stopped watcher.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Log watcher failed");
            ExitCode::FAILURE
        }
    }
}
