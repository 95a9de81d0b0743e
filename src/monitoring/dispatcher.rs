//! Asynchronous alert delivery
//!
//! The monitoring loop hands approved alerts to [`AlertDispatcher::dispatch`],
//! which only enqueues. A background worker performs the webhook calls with
//! bounded exponential backoff, so a slow or failing endpoint never holds up
//! log ingestion.

use super::notifier::Notifier;
use crate::event::Alert;
use crate::utils::AppError;
use backoff::{future::retry, ExponentialBackoff};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Maximum time spent draining queued alerts on shutdown
const FLUSH_TIMEOUT: Duration = Duration::from_secs(10);

/// Retry schedule for a single alert
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub max_elapsed_time: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(500),
            max_interval: Duration::from_secs(10),
            max_elapsed_time: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no retries
    pub fn none() -> Self {
        Self {
            initial_interval: Duration::ZERO,
            max_interval: Duration::ZERO,
            max_elapsed_time: Duration::ZERO,
        }
    }

    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.initial_interval,
            max_interval: self.max_interval,
            max_elapsed_time: Some(self.max_elapsed_time),
            multiplier: 2.0,
            ..Default::default()
        }
    }
}

/// Result of handing an alert to the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Queued,
    /// Queue full; the alert was dropped
    Dropped,
    /// Dispatcher already shut down
    Closed,
}

/// Fire-and-forget alert queue with a delivery worker
pub struct AlertDispatcher {
    sender: Option<mpsc::Sender<Alert>>,
    worker: Option<JoinHandle<()>>,
}

impl AlertDispatcher {
    /// Spawn the delivery worker on the current tokio runtime
    pub fn spawn(notifier: Arc<dyn Notifier>, capacity: usize, retry: RetryPolicy) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let worker = tokio::spawn(delivery_loop(notifier, receiver, retry));

        Self {
            sender: Some(sender),
            worker: Some(worker),
        }
    }

    /// Enqueue an alert without waiting
    pub fn dispatch(&self, alert: Alert) -> DispatchOutcome {
        let Some(sender) = &self.sender else {
            return DispatchOutcome::Closed;
        };

        match sender.try_send(alert) {
            Ok(()) => DispatchOutcome::Queued,
            Err(mpsc::error::TrySendError::Full(alert)) => {
                warn!(kind = %alert.kind, "Alert queue full, dropping alert");
                DispatchOutcome::Dropped
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("Alert worker stopped, dropping alert");
                DispatchOutcome::Closed
            }
        }
    }

    /// Close the queue and wait for queued alerts to be delivered
    ///
    /// Gives up after the flush timeout; undelivered alerts are logged.
    pub async fn shutdown(&mut self) {
        self.sender.take();

        let Some(worker) = self.worker.take() else {
            return;
        };

        match tokio::time::timeout(FLUSH_TIMEOUT, worker).await {
            Ok(Ok(())) => debug!("Alert queue flushed"),
            Ok(Err(e)) => error!(error = %e, "Alert worker terminated abnormally"),
            Err(_) => warn!(
                timeout_secs = FLUSH_TIMEOUT.as_secs(),
                "Timed out flushing alert queue"
            ),
        }
    }
}

async fn delivery_loop(
    notifier: Arc<dyn Notifier>,
    mut receiver: mpsc::Receiver<Alert>,
    retry_policy: RetryPolicy,
) {
    while let Some(alert) = receiver.recv().await {
        match deliver_with_retry(notifier.as_ref(), &alert, &retry_policy).await {
            Ok(()) => debug!(kind = %alert.kind, "Alert delivered"),
            Err(e) => warn!(
                kind = %alert.kind,
                error = %e,
                "Giving up on alert delivery"
            ),
        }
    }
    info!("Alert worker stopped");
}

/// Send one alert, retrying transient failures until the policy runs out
pub async fn deliver_with_retry(
    notifier: &dyn Notifier,
    alert: &Alert,
    policy: &RetryPolicy,
) -> Result<(), AppError> {
    retry(policy.backoff(), || async {
        match notifier.send(alert).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_transient() => {
                warn!(error = %e, "Transient delivery failure, will retry");
                Err(backoff::Error::transient(e))
            }
            Err(e) => Err(backoff::Error::permanent(e)),
        }
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::AppResult;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Fails the first `failures` calls with HTTP `status`, then records alerts
    struct ScriptedNotifier {
        failures: u32,
        status: u16,
        calls: AtomicU32,
        delivered: Mutex<Vec<Alert>>,
    }

    impl ScriptedNotifier {
        fn new(failures: u32, status: u16) -> Self {
            Self {
                failures,
                status,
                calls: AtomicU32::new(0),
                delivered: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Notifier for ScriptedNotifier {
        async fn send(&self, alert: &Alert) -> AppResult<()> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(AppError::NotifyStatus {
                    status: self.status,
                    body: "scripted failure".to_string(),
                });
            }
            self.delivered.lock().unwrap().push(alert.clone());
            Ok(())
        }
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            initial_interval: Duration::from_millis(1),
            max_interval: Duration::from_millis(5),
            max_elapsed_time: Duration::from_secs(2),
        }
    }

    fn alert() -> Alert {
        Alert::failover("blue", "green", Utc::now())
    }

    #[tokio::test]
    async fn should_retry_transient_failures() {
        // Arrange
        let notifier = ScriptedNotifier::new(2, 503);

        // Act
        let result = deliver_with_retry(&notifier, &alert(), &fast_retry()).await;

        // Assert
        assert!(result.is_ok());
        assert_eq!(notifier.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn should_not_retry_permanent_failures() {
        // Arrange
        let notifier = ScriptedNotifier::new(5, 404);

        // Act
        let result = deliver_with_retry(&notifier, &alert(), &fast_retry()).await;

        // Assert
        assert!(result.is_err());
        assert_eq!(notifier.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn should_flush_queued_alerts_on_shutdown() {
        // Arrange
        let notifier = Arc::new(ScriptedNotifier::new(0, 200));
        let mut dispatcher = AlertDispatcher::spawn(notifier.clone(), 8, fast_retry());

        // Act
        assert_eq!(dispatcher.dispatch(alert()), DispatchOutcome::Queued);
        assert_eq!(dispatcher.dispatch(alert()), DispatchOutcome::Queued);
        dispatcher.shutdown().await;

        // Assert
        assert_eq!(notifier.delivered.lock().unwrap().len(), 2);
        assert_eq!(dispatcher.dispatch(alert()), DispatchOutcome::Closed);
    }

    #[tokio::test]
    async fn should_keep_delivering_after_a_failed_alert() {
        // Arrange
        let notifier = Arc::new(ScriptedNotifier::new(1, 400));
        let mut dispatcher = AlertDispatcher::spawn(notifier.clone(), 8, RetryPolicy::none());

        // Act
        dispatcher.dispatch(alert());
        dispatcher.dispatch(alert());
        dispatcher.shutdown().await;

        // Assert
        assert_eq!(notifier.calls.load(Ordering::SeqCst), 2);
        assert_eq!(notifier.delivered.lock().unwrap().len(), 1);
    }

    #[test]
    fn should_use_bounded_default_backoff() {
        let backoff = RetryPolicy::default().backoff();
        assert_eq!(backoff.initial_interval, Duration::from_millis(500));
        assert_eq!(backoff.max_elapsed_time, Some(Duration::from_secs(30)));
        assert!((backoff.multiplier - 2.0).abs() < f64::EPSILON);
    }
}
