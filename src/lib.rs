//! Access-log watcher
//!
//! Tails a web-server access log, tracks the error rate over a sliding window
//! and the active backend pool, and posts cooldown-gated alerts to a webhook.

pub mod config;
pub mod event;
pub mod monitoring;
pub mod shutdown;
pub mod utils;

use config::WatcherConfig;
use monitoring::{
    AlertDispatcher, FileLogSource, Monitor, MonitorStats, RetryPolicy, StartPosition,
    WebhookNotifier,
};
use std::future::Future;
use std::sync::Arc;
use utils::{AppResult, Clock};

/// Wire the pipeline from `config` and run it until `shutdown` resolves
pub async fn run_watcher<F>(
    config: WatcherConfig,
    clock: Arc<dyn Clock>,
    shutdown: F,
) -> AppResult<MonitorStats>
where
    F: Future<Output = ()>,
{
    let notifier = WebhookNotifier::from_config(
        config.webhook_url.as_deref(),
        config.webhook_format,
        config.webhook_timeout,
    )?;
    let dispatcher = AlertDispatcher::spawn(
        Arc::new(notifier),
        config.alert_queue_capacity,
        RetryPolicy::default(),
    );

    let start = if config.read_from_start {
        StartPosition::Beginning
    } else {
        StartPosition::End
    };
    let mut source = FileLogSource::new(&config.log_path, start);

    let mut monitor = Monitor::new(&config, clock).with_dispatcher(dispatcher);
    Ok(monitor.run(&mut source, shutdown).await)
}
