use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Upper bound for every `*_secs` setting (ten years).
pub const MAX_CONFIG_SECS: u64 = 10 * 365 * 24 * 3600;

/// Converts a seconds setting to a chrono duration without panicking.
/// Out-of-range values are rejected by `validate()`; here they saturate.
pub fn seconds(secs: u64) -> chrono::Duration {
    chrono::Duration::seconds(secs.min(MAX_CONFIG_SECS) as i64)
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MonitorConfig {
    #[serde(default)]
    pub target: Target,
    #[serde(default)]
    pub probe: ProbeConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub notify: Option<NotifyConfig>,
    #[serde(default = "default_cooldown")]
    pub notify_cooldown_secs: u64,
    #[serde(default = "default_api_port")]
    pub api_port: u16,
}

/// The watched host. Immutable once loaded.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Target {
    #[serde(default)]
    pub address: String,
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl Default for Target {
    fn default() -> Self {
        Self { address: String::new(), user: default_user(), name: None }
    }
}

impl Target {
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.address)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProbeConfig {
    #[serde(default)]
    pub kind: ProbeKind,
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,
    /// Bound on one whole attempt (connect, auth and remote command).
    /// `timeout_secs` only bounds the connect.
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            kind: ProbeKind::default(),
            retries: default_retries(),
            timeout_secs: default_timeout(),
            retry_delay_secs: default_retry_delay(),
            command_timeout_secs: default_command_timeout(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProbeKind {
    #[default]
    Ssh,
    Tcp {
        port: u16,
    },
    Ping,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ScheduleConfig {
    #[serde(default = "default_heartbeat")]
    pub heartbeat_secs: u64,
    #[serde(default = "default_check_interval")]
    pub host_interval_secs: u64,
    #[serde(default)]
    pub down_alarm_threshold_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            heartbeat_secs: default_heartbeat(),
            host_interval_secs: default_check_interval(),
            down_alarm_threshold_secs: 0,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServiceConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_check_interval")]
    pub interval_secs: u64,
    #[serde(default)]
    pub restart: RestartConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            name: String::new(),
            interval_secs: default_check_interval(),
            restart: RestartConfig::default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RestartConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_restart_interval")]
    pub min_interval_secs: u64,
    #[serde(default = "default_restart_timeout")]
    pub timeout_secs: u64,
}

impl Default for RestartConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: default_max_attempts(),
            min_interval_secs: default_restart_interval(),
            timeout_secs: default_restart_timeout(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotifyConfig {
    Telegram { bot_token: String, chat_id: String },
    Webhook { url: String },
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("no target address configured")]
    MissingAddress,
    #[error("service check enabled but no service name given")]
    MissingServiceName,
    #[error("probe retries must be at least 1")]
    ZeroRetries,
    #[error("{field} = {value} exceeds the maximum of {max} seconds")]
    OutOfRange { field: &'static str, value: u64, max: u64 },
    #[error("probe command_timeout_secs ({command}) must be greater than timeout_secs ({connect})")]
    CommandTimeoutTooShort { command: u64, connect: u64 },
}

impl MonitorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target.address.trim().is_empty() {
            return Err(ConfigError::MissingAddress);
        }
        if self.service.enabled && self.service.name.trim().is_empty() {
            return Err(ConfigError::MissingServiceName);
        }
        if self.probe.retries == 0 {
            return Err(ConfigError::ZeroRetries);
        }
        for (field, value) in self.second_settings() {
            if value > MAX_CONFIG_SECS {
                return Err(ConfigError::OutOfRange { field, value, max: MAX_CONFIG_SECS });
            }
        }
        if self.probe.command_timeout_secs <= self.probe.timeout_secs {
            return Err(ConfigError::CommandTimeoutTooShort {
                command: self.probe.command_timeout_secs,
                connect: self.probe.timeout_secs,
            });
        }
        Ok(())
    }

    fn second_settings(&self) -> [(&'static str, u64); 10] {
        [
            ("probe.timeout_secs", self.probe.timeout_secs),
            ("probe.retry_delay_secs", self.probe.retry_delay_secs),
            ("probe.command_timeout_secs", self.probe.command_timeout_secs),
            ("schedule.heartbeat_secs", self.schedule.heartbeat_secs),
            ("schedule.host_interval_secs", self.schedule.host_interval_secs),
            ("schedule.down_alarm_threshold_secs", self.schedule.down_alarm_threshold_secs),
            ("service.interval_secs", self.service.interval_secs),
            ("service.restart.min_interval_secs", self.service.restart.min_interval_secs),
            ("service.restart.timeout_secs", self.service.restart.timeout_secs),
            ("notify_cooldown_secs", self.notify_cooldown_secs),
        ]
    }

    /// Connect timeout handed to the probe adapters.
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe.timeout_secs)
    }

    /// Outer bound on one probe attempt; only catches a hung check.
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.probe.command_timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.probe.retry_delay_secs)
    }
}

fn default_user() -> String { "pi".into() }
fn default_retries() -> u32 { 3 }
fn default_timeout() -> u64 { 3 }
fn default_retry_delay() -> u64 { 2 }
fn default_command_timeout() -> u64 { 15 }
fn default_heartbeat() -> u64 { 30 }
fn default_check_interval() -> u64 { 300 }
fn default_true() -> bool { true }
fn default_max_attempts() -> u32 { 2 }
fn default_restart_interval() -> u64 { 600 }
fn default_restart_timeout() -> u64 { 30 }
fn default_cooldown() -> u64 { 1800 }
fn default_api_port() -> u16 { 3000 }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_gets_defaults() {
        let config: MonitorConfig =
            serde_json::from_str(r#"{ "target": { "address": "192.168.178.50" } }"#).unwrap();

        assert_eq!(config.target.user, "pi");
        assert_eq!(config.target.label(), "192.168.178.50");
        assert_eq!(config.probe.kind, ProbeKind::Ssh);
        assert_eq!(config.probe.retries, 3);
        assert_eq!(config.schedule.heartbeat_secs, 30);
        assert_eq!(config.schedule.host_interval_secs, 300);
        assert_eq!(config.notify_cooldown_secs, 1800);
        assert!(!config.service.enabled);
        assert!(config.notify.is_none());
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn full_config_parses() {
        let raw = r#"{
            "target": { "address": "garden.lan", "user": "ops", "name": "Garden Pi" },
            "probe": { "kind": { "type": "tcp", "port": 22 }, "retries": 2, "timeout_secs": 5 },
            "schedule": { "down_alarm_threshold_secs": 30 },
            "service": { "enabled": true, "name": "mosquitto", "restart": { "max_attempts": 4 } },
            "notify": { "type": "telegram", "bot_token": "abc", "chat_id": "42" },
            "notify_cooldown_secs": 60
        }"#;
        let config: MonitorConfig = serde_json::from_str(raw).unwrap();

        assert_eq!(config.target.label(), "Garden Pi");
        assert_eq!(config.probe.kind, ProbeKind::Tcp { port: 22 });
        assert_eq!(config.schedule.down_alarm_threshold_secs, 30);
        assert_eq!(config.service.restart.max_attempts, 4);
        assert_eq!(config.service.restart.min_interval_secs, 600);
        assert!(matches!(config.notify, Some(NotifyConfig::Telegram { .. })));
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn missing_address_is_rejected() {
        let config: MonitorConfig =
            serde_json::from_str(r#"{ "target": { "address": "  " } }"#).unwrap();
        assert_eq!(config.validate(), Err(ConfigError::MissingAddress));
    }

    #[test]
    fn absent_target_is_a_validation_error_not_a_parse_error() {
        let config: MonitorConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.validate(), Err(ConfigError::MissingAddress));
    }

    #[test]
    fn out_of_range_interval_is_rejected() {
        let config: MonitorConfig = serde_json::from_str(
            r#"{ "target": { "address": "h" }, "schedule": { "host_interval_secs": 10000000000000000 } }"#,
        )
        .unwrap();
        assert_eq!(
            config.validate(),
            Err(ConfigError::OutOfRange {
                field: "schedule.host_interval_secs",
                value: 10_000_000_000_000_000,
                max: MAX_CONFIG_SECS,
            })
        );
    }

    #[test]
    fn huge_seconds_saturate_instead_of_panicking() {
        assert_eq!(seconds(u64::MAX), seconds(MAX_CONFIG_SECS));
        assert!(seconds(u64::MAX) > chrono::Duration::zero());
    }

    #[test]
    fn attempt_bound_must_exceed_connect_timeout() {
        let config: MonitorConfig = serde_json::from_str(
            r#"{ "target": { "address": "h" }, "probe": { "timeout_secs": 5, "command_timeout_secs": 5 } }"#,
        )
        .unwrap();
        assert_eq!(
            config.validate(),
            Err(ConfigError::CommandTimeoutTooShort { command: 5, connect: 5 })
        );

        let defaults: MonitorConfig = serde_json::from_str(r#"{ "target": { "address": "h" } }"#).unwrap();
        assert!(defaults.attempt_timeout() > defaults.probe_timeout());
    }

    #[test]
    fn service_without_name_is_rejected() {
        let config: MonitorConfig = serde_json::from_str(
            r#"{ "target": { "address": "h" }, "service": { "enabled": true } }"#,
        )
        .unwrap();
        assert_eq!(config.validate(), Err(ConfigError::MissingServiceName));
    }
}
