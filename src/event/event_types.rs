//! Alert structure and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which detector produced an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// Windowed error rate above threshold
    ErrorRate,
    /// Active pool changed
    Failover,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::ErrorRate => "error_rate",
            AlertKind::Failover => "failover",
        }
    }

    /// Default severity for alerts of this kind
    pub fn severity(&self) -> Severity {
        match self {
            AlertKind::ErrorRate => Severity::Critical,
            AlertKind::Failover => Severity::Warning,
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Alert severity, used for the Discord embed colour
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Critical,
}

/// An alert that passed the cooldown gate
///
/// The message is already formatted; delivery only ever sees this immutable
/// value, never the monitor state it was derived from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub severity: Severity,
    pub title: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl Alert {
    /// Error-rate alert for a windowed rate above `threshold`
    pub fn error_rate(
        rate: f64,
        threshold: f64,
        error_count: usize,
        total_count: usize,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            kind: AlertKind::ErrorRate,
            severity: AlertKind::ErrorRate.severity(),
            title: "High error rate".to_string(),
            message: format!(
                "🚨 High error rate: {:.2}% ({}/{} requests, threshold {:.2}%) at {}",
                rate * 100.0,
                error_count,
                total_count,
                threshold * 100.0,
                timestamp.format("%H:%M:%S")
            ),
            timestamp,
        }
    }

    /// Failover alert for a pool transition
    pub fn failover(from: &str, to: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            kind: AlertKind::Failover,
            severity: AlertKind::Failover.severity(),
            title: "Failover detected".to_string(),
            message: format!(
                "⚠️ Failover detected: {} → {} at {}",
                from,
                to,
                timestamp.format("%H:%M:%S")
            ),
            timestamp,
        }
    }
}
