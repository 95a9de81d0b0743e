//! Monitoring loop
//!
//! Sequences the pipeline for every line: classify, feed the window and the
//! failover detector, gate candidate alerts through the cooldown, hand the
//! approved ones to the dispatcher. All state is owned here; nothing is
//! shared with the delivery worker except finished [`Alert`] values.

use super::classifier::LineClassifier;
use super::dispatcher::{AlertDispatcher, DispatchOutcome};
use super::failover::FailoverDetector;
use super::log_source::LogSource;
use super::policy::AlertGate;
use super::window::{RateSnapshot, SlidingWindow};
use crate::config::WatcherConfig;
use crate::event::Alert;
use crate::utils::Clock;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Counters for one monitor run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonitorStats {
    pub lines_read: u64,
    pub lines_rejected: u64,
    pub alerts_fired: u64,
    pub alerts_suppressed: u64,
    pub alerts_dropped: u64,
}

/// Owns all detector state and drives it line by line
pub struct Monitor {
    classifier: LineClassifier,
    window: SlidingWindow,
    failover: FailoverDetector,
    gate: AlertGate,
    dispatcher: Option<AlertDispatcher>,
    error_rate_threshold: f64,
    min_samples: usize,
    poll_interval: Duration,
    stats: MonitorStats,
}

impl Monitor {
    /// Build a monitor without delivery; approved alerts are only logged
    pub fn new(config: &WatcherConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            classifier: LineClassifier::new(clock),
            window: SlidingWindow::new(config.window_mode, config.error_band),
            failover: FailoverDetector::new(),
            gate: AlertGate::new(config.alert_cooldown, config.cooldown_scope),
            dispatcher: None,
            error_rate_threshold: config.error_rate_threshold,
            min_samples: config.min_samples.max(1),
            poll_interval: config.poll_interval,
            stats: MonitorStats::default(),
        }
    }

    /// Deliver approved alerts through `dispatcher`
    pub fn with_dispatcher(mut self, dispatcher: AlertDispatcher) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    pub fn stats(&self) -> MonitorStats {
        self.stats
    }

    pub fn window(&self) -> &SlidingWindow {
        &self.window
    }

    pub fn current_pool(&self) -> Option<&str> {
        self.failover.current_pool()
    }

    /// Run one raw line through the pipeline and return the alerts that fired
    ///
    /// Rejected lines change nothing. The failover candidate is evaluated
    /// before the error-rate candidate, which matters under a shared cooldown.
    pub fn process_line(&mut self, raw_line: &str) -> Vec<Alert> {
        self.stats.lines_read += 1;

        let outcome = match self.classifier.classify(raw_line) {
            Ok(outcome) => outcome,
            Err(reason) => {
                self.stats.lines_rejected += 1;
                trace!(%reason, "Skipping unparseable line");
                return Vec::new();
            }
        };

        let snapshot = self.window.observe(&outcome);
        let failover = self.failover.observe(outcome.pool_id.as_deref());
        let now = outcome.timestamp;

        debug!(
            status = outcome.status_code,
            rate = %format_percent(snapshot.rate),
            error_count = snapshot.error_count,
            total_count = snapshot.total_count,
            "OK: error rate"
        );

        let mut candidates = Vec::with_capacity(2);
        if let Some(event) = failover {
            candidates.push(Alert::failover(&event.from, &event.to, now));
        }
        if snapshot.exceeds(self.error_rate_threshold, self.min_samples) {
            candidates.push(self.error_rate_alert(&snapshot, now));
        }

        let mut fired = Vec::new();
        for alert in candidates {
            if self.gate.try_acquire(alert.kind, alert.timestamp) {
                warn!(kind = %alert.kind, "ALERT: {}", alert.message);
                self.stats.alerts_fired += 1;
                self.deliver(alert.clone());
                fired.push(alert);
            } else {
                self.stats.alerts_suppressed += 1;
                debug!(kind = %alert.kind, "Alert suppressed by cooldown");
            }
        }
        fired
    }

    /// Follow `source` until `shutdown` resolves, then flush pending alerts
    pub async fn run<S, F>(&mut self, source: &mut S, shutdown: F) -> MonitorStats
    where
        S: LogSource + ?Sized,
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!(
            threshold = %format_percent(self.error_rate_threshold),
            window = ?self.window.mode(),
            scope = ?self.gate.scope(),
            "Log watcher started"
        );

        'watch: loop {
            let next = tokio::select! {
                biased;
                _ = &mut shutdown => break 'watch,
                next = source.next_line() => next,
            };

            match next {
                Ok(Some(line)) => {
                    self.process_line(&line);
                    continue;
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, "Log source unavailable, retrying"),
            }

            tokio::select! {
                biased;
                _ = &mut shutdown => break 'watch,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        if let Some(dispatcher) = self.dispatcher.as_mut() {
            dispatcher.shutdown().await;
        }

        let stats = self.stats;
        info!(
            lines_read = stats.lines_read,
            lines_rejected = stats.lines_rejected,
            alerts_fired = stats.alerts_fired,
            alerts_suppressed = stats.alerts_suppressed,
            alerts_dropped = stats.alerts_dropped,
            "Log watcher stopped"
        );
        stats
    }

    fn error_rate_alert(&self, snapshot: &RateSnapshot, now: DateTime<Utc>) -> Alert {
        Alert::error_rate(
            snapshot.rate,
            self.error_rate_threshold,
            snapshot.error_count,
            snapshot.total_count,
            now,
        )
    }

    fn deliver(&mut self, alert: Alert) {
        let Some(dispatcher) = &self.dispatcher else {
            debug!(kind = %alert.kind, "No dispatcher configured, alert logged only");
            return;
        };

        if dispatcher.dispatch(alert) != DispatchOutcome::Queued {
            self.stats.alerts_dropped += 1;
        }
    }
}

fn format_percent(rate: f64) -> String {
    format!("{:.1}%", rate * 100.0)
}
