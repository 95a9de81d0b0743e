//! Access-log monitoring
//!
//! - Line classification (JSON or combined text format)
//! - Sliding error-rate window and failover detection
//! - Cooldown-gated alerting through an asynchronous webhook dispatcher
//! - The monitoring loop that ties them to a followed log file

pub mod classifier;
pub mod dispatcher;
pub mod failover;
pub mod log_source;
pub mod notifier;
pub mod policy;
pub mod processor;
pub mod window;

pub use classifier::{ErrorBand, LineClassifier, LogOutcome, ParseFailure};
pub use dispatcher::{AlertDispatcher, DispatchOutcome, RetryPolicy};
pub use failover::{FailoverDetector, FailoverEvent};
pub use log_source::{FileLogSource, LogSource, StartPosition};
pub use notifier::{Notifier, WebhookFormat, WebhookNotifier};
pub use policy::{should_fire, AlertCooldownState, AlertGate, CooldownScope};
pub use processor::{Monitor, MonitorStats};
pub use window::{RateSnapshot, SlidingWindow, WindowMode};
