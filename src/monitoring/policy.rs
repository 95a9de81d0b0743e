//! Alert cooldown policy
//!
//! [`should_fire`] is the pure decision; [`AlertGate`] pairs it with the
//! cooldown state so callers cannot forget to record an approved alert.

use crate::event::AlertKind;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::str::FromStr;

/// Whether all alert kinds share one cooldown timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CooldownScope {
    /// One timestamp gates error-rate and failover alerts alike
    #[default]
    Shared,
    /// Each alert kind has its own timestamp
    PerKind,
}

impl FromStr for CooldownScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "shared" | "global" => Ok(CooldownScope::Shared),
            "per_kind" | "perkind" => Ok(CooldownScope::PerKind),
            other => Err(format!("unknown cooldown scope: {other}")),
        }
    }
}

/// Time of the last delivered alert
///
/// `None` stands for "never", which always allows the next alert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlertCooldownState {
    pub last_alert_time: Option<DateTime<Utc>>,
}

impl AlertCooldownState {
    pub fn record(&mut self, at: DateTime<Utc>) {
        self.last_alert_time = Some(at);
    }
}

/// Fire only when strictly more than `cooldown` has passed since the last alert
pub fn should_fire(
    candidate_time: DateTime<Utc>,
    state: &AlertCooldownState,
    cooldown: Duration,
) -> bool {
    match state.last_alert_time {
        None => true,
        Some(last) => candidate_time.signed_duration_since(last) > cooldown,
    }
}

/// Cooldown state for every alert kind, under one scope
#[derive(Debug, Clone)]
pub struct AlertGate {
    cooldown: Duration,
    scope: CooldownScope,
    shared: AlertCooldownState,
    per_kind: HashMap<AlertKind, AlertCooldownState>,
}

impl AlertGate {
    pub fn new(cooldown: std::time::Duration, scope: CooldownScope) -> Self {
        let cooldown = Duration::from_std(cooldown).unwrap_or(Duration::MAX);
        Self {
            cooldown,
            scope,
            shared: AlertCooldownState::default(),
            per_kind: HashMap::new(),
        }
    }

    /// Check the cooldown for `kind` and, when it allows firing, record `at`
    pub fn try_acquire(&mut self, kind: AlertKind, at: DateTime<Utc>) -> bool {
        let cooldown = self.cooldown;
        let state = self.state_mut(kind);
        if should_fire(at, state, cooldown) {
            state.record(at);
            true
        } else {
            false
        }
    }

    /// Cooldown state that governs `kind`
    pub fn state(&self, kind: AlertKind) -> AlertCooldownState {
        match self.scope {
            CooldownScope::Shared => self.shared,
            CooldownScope::PerKind => self.per_kind.get(&kind).copied().unwrap_or_default(),
        }
    }

    pub fn scope(&self) -> CooldownScope {
        self.scope
    }

    fn state_mut(&mut self, kind: AlertKind) -> &mut AlertCooldownState {
        match self.scope {
            CooldownScope::Shared => &mut self.shared,
            CooldownScope::PerKind => self.per_kind.entry(kind).or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH + Duration::seconds(secs)
    }

    #[test]
    fn should_fire_when_no_alert_recorded() {
        assert!(should_fire(t(0), &AlertCooldownState::default(), Duration::seconds(60)));
    }

    #[test]
    fn should_not_fire_at_exact_cooldown() {
        // Arrange
        let mut state = AlertCooldownState::default();
        state.record(t(0));

        // Act & Assert
        assert!(!should_fire(t(60), &state, Duration::seconds(60)));
        assert!(should_fire(t(61), &state, Duration::seconds(60)));
    }

    #[test]
    fn should_not_fire_for_candidate_before_last_alert() {
        let mut state = AlertCooldownState::default();
        state.record(t(100));

        assert!(!should_fire(t(50), &state, Duration::seconds(0)));
    }

    #[test]
    fn should_gate_both_kinds_with_shared_cooldown() {
        // Arrange
        let mut gate = AlertGate::new(std::time::Duration::from_secs(60), CooldownScope::Shared);

        // Act
        let first = gate.try_acquire(AlertKind::ErrorRate, t(0));
        let failover_at_60 = gate.try_acquire(AlertKind::Failover, t(60));
        let failover_at_61 = gate.try_acquire(AlertKind::Failover, t(61));
        let rate_at_100 = gate.try_acquire(AlertKind::ErrorRate, t(100));

        // Assert
        assert!(first);
        assert!(!failover_at_60);
        assert!(failover_at_61);
        assert!(!rate_at_100, "the failover at t=61 restarted the shared cooldown");
    }

    #[test]
    fn should_gate_each_kind_separately_with_per_kind_cooldown() {
        // Arrange
        let mut gate = AlertGate::new(std::time::Duration::from_secs(60), CooldownScope::PerKind);

        // Act
        let rate_at_0 = gate.try_acquire(AlertKind::ErrorRate, t(0));
        let failover_at_0 = gate.try_acquire(AlertKind::Failover, t(0));
        let rate_at_60 = gate.try_acquire(AlertKind::ErrorRate, t(60));
        let rate_at_61 = gate.try_acquire(AlertKind::ErrorRate, t(61));
        let failover_at_60 = gate.try_acquire(AlertKind::Failover, t(60));

        // Assert
        assert!(rate_at_0);
        assert!(failover_at_0, "failover has its own cooldown");
        assert!(!rate_at_60);
        assert!(rate_at_61);
        assert!(!failover_at_60);
        assert_eq!(gate.state(AlertKind::ErrorRate).last_alert_time, Some(t(61)));
        assert_eq!(gate.state(AlertKind::Failover).last_alert_time, Some(t(0)));
    }

    #[test]
    fn should_not_record_suppressed_candidates() {
        let mut gate = AlertGate::new(std::time::Duration::from_secs(60), CooldownScope::Shared);
        gate.try_acquire(AlertKind::ErrorRate, t(0));

        gate.try_acquire(AlertKind::ErrorRate, t(30));

        assert_eq!(gate.state(AlertKind::ErrorRate).last_alert_time, Some(t(0)));
    }

    #[test]
    fn should_parse_scope() {
        assert_eq!("shared".parse::<CooldownScope>(), Ok(CooldownScope::Shared));
        assert_eq!("per-kind".parse::<CooldownScope>(), Ok(CooldownScope::PerKind));
        assert_eq!("PER_KIND".parse::<CooldownScope>(), Ok(CooldownScope::PerKind));
        assert!("sometimes".parse::<CooldownScope>().is_err());
    }
}
