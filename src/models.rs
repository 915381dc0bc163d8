use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which liveness signal a check or display belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    Host,
    Service,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Host => f.write_str("host"),
            Signal::Service => f.write_str("service"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HostState {
    #[default]
    Unknown,
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ServiceState {
    #[default]
    Unknown,
    Up,
    Down,
    /// Host unreachable; the service is not probed.
    NotApplicable,
}

impl ServiceState {
    pub fn from_probe(ok: bool) -> Self {
        if ok { ServiceState::Up } else { ServiceState::Down }
    }

    /// `Unknown` and `NotApplicable` carry no observation to transition from.
    pub fn is_observed(self) -> bool {
        matches!(self, ServiceState::Up | ServiceState::Down)
    }
}

/// Externally visible value of a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayValue {
    On,
    Off,
    NotApplicable,
}

impl From<bool> for DisplayValue {
    fn from(ok: bool) -> Self {
        if ok { DisplayValue::On } else { DisplayValue::Off }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertCategory {
    Recovery,
    Alarm,
    ServiceDown,
    ServiceUp,
    RemediationAttempt,
}

impl AlertCategory {
    pub fn headline(self) -> &'static str {
        match self {
            AlertCategory::Recovery => "\u{1F7E2} RECOVERED",
            AlertCategory::Alarm => "\u{1F6A8} ALARM \u{1F6A8}",
            AlertCategory::ServiceDown => "\u{1F534} SERVICE DOWN",
            AlertCategory::ServiceUp => "\u{1F7E2} SERVICE UP",
            AlertCategory::RemediationAttempt => "\u{1F527} RESTART ATTEMPT",
        }
    }
}

/// Debounce bookkeeping for a continuous host-down episode.
#[derive(Debug, Clone, Default)]
pub struct DownTracker {
    pub down_since: Option<DateTime<Utc>>,
    pub alarm_sent: bool,
}

impl DownTracker {
    pub fn clear(&mut self) {
        self.down_since = None;
        self.alarm_sent = false;
    }

    /// Starts the episode if needed and returns how long it has lasted.
    pub fn observe_down(&mut self, now: DateTime<Utc>) -> chrono::Duration {
        let since = *self.down_since.get_or_insert(now);
        now - since
    }
}

/// Read-only view of the monitor, published after every tick.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub enabled: bool,
    pub target: String,
    pub host: HostState,
    pub service: Option<ServiceState>,
    pub down_since: Option<DateTime<Utc>>,
    pub alarm_sent: bool,
    pub restart_attempts: u32,
    pub last_alert: Option<DateTime<Utc>>,
    pub last_tick: Option<DateTime<Utc>>,
    pub next_host_check: Option<DateTime<Utc>>,
}

impl StatusSnapshot {
    pub fn disabled(target: &str) -> Self {
        Self {
            enabled: false,
            target: target.to_string(),
            host: HostState::Unknown,
            service: None,
            down_since: None,
            alarm_sent: false,
            restart_attempts: 0,
            last_alert: None,
            last_tick: None,
            next_host_check: None,
        }
    }
}
