//! Sliding window of recent request outcomes
//!
//! Counts are maintained incrementally: each push and each eviction adjusts
//! the running totals, so [`SlidingWindow::observe`] never rescans the window.

use super::classifier::{ErrorBand, LogOutcome};
use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;

/// Windowing discipline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowMode {
    /// Keep entries observed within the last `horizon`
    Time { horizon: Duration },
    /// Keep the last `capacity` entries
    Count { capacity: usize },
}

impl WindowMode {
    /// Time window of `seconds`, or `None` when the horizon is not representable
    pub fn time_secs(seconds: u64) -> Option<Self> {
        let seconds = i64::try_from(seconds).ok()?;
        Duration::try_seconds(seconds).map(|horizon| WindowMode::Time { horizon })
    }

    /// A window that can never hold an entry
    pub fn is_degenerate(&self) -> bool {
        match self {
            WindowMode::Time { horizon } => *horizon <= Duration::zero(),
            WindowMode::Count { capacity } => *capacity == 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct WindowEntry {
    timestamp: DateTime<Utc>,
    is_error: bool,
}

/// Counts and rate at one observation point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateSnapshot {
    pub error_count: usize,
    pub total_count: usize,
    /// `error_count / total_count`, or 0.0 for an empty window
    pub rate: f64,
}

impl RateSnapshot {
    fn new(error_count: usize, total_count: usize) -> Self {
        let rate = if total_count == 0 {
            0.0
        } else {
            error_count as f64 / total_count as f64
        };
        Self {
            error_count,
            total_count,
            rate,
        }
    }

    /// Whether this snapshot should raise an error-rate alert
    ///
    /// An empty window, or one with fewer than `min_samples` entries, never does.
    pub fn exceeds(&self, threshold: f64, min_samples: usize) -> bool {
        self.total_count > 0 && self.total_count >= min_samples && self.rate > threshold
    }
}

/// Time- or count-bounded window of outcomes
#[derive(Debug, Clone)]
pub struct SlidingWindow {
    mode: WindowMode,
    band: ErrorBand,
    entries: VecDeque<WindowEntry>,
    error_count: usize,
}

impl SlidingWindow {
    pub fn new(mode: WindowMode, band: ErrorBand) -> Self {
        let entries = match mode {
            WindowMode::Count { capacity } => VecDeque::with_capacity(capacity.min(4096)),
            WindowMode::Time { .. } => VecDeque::new(),
        };
        Self {
            mode,
            band,
            entries,
            error_count: 0,
        }
    }

    /// Record one outcome, evict out-of-horizon entries and report the rate
    pub fn observe(&mut self, outcome: &LogOutcome) -> RateSnapshot {
        let is_error = self.band.is_error(outcome.status_code);

        // Keep timestamps non-decreasing even if the clock steps backwards
        let timestamp = match self.entries.back() {
            Some(last) if last.timestamp > outcome.timestamp => last.timestamp,
            _ => outcome.timestamp,
        };

        self.entries.push_back(WindowEntry {
            timestamp,
            is_error,
        });
        if is_error {
            self.error_count += 1;
        }

        self.evict(timestamp);
        self.snapshot()
    }

    /// Drop entries outside the horizon relative to `now`
    pub fn evict(&mut self, now: DateTime<Utc>) {
        match self.mode {
            WindowMode::Count { capacity } => {
                while self.entries.len() > capacity {
                    self.pop_front();
                }
            }
            WindowMode::Time { horizon } => {
                // A horizon reaching before the representable range evicts nothing
                let Some(cutoff) = now.checked_sub_signed(horizon) else {
                    return;
                };
                while let Some(front) = self.entries.front() {
                    if front.timestamp < cutoff {
                        self.pop_front();
                    } else {
                        break;
                    }
                }
            }
        }
    }

    /// Current counts without observing anything
    pub fn snapshot(&self) -> RateSnapshot {
        RateSnapshot::new(self.error_count, self.entries.len())
    }

    pub fn mode(&self) -> WindowMode {
        self.mode
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Oldest and newest retained timestamps
    pub fn span(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        Some((self.entries.front()?.timestamp, self.entries.back()?.timestamp))
    }

    fn pop_front(&mut self) {
        if let Some(entry) = self.entries.pop_front() {
            if entry.is_error {
                self.error_count -= 1;
            }
        }
    }
}
