//! Manager configuration: structs, parsing, and validation.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use domain::accel::entity::AccelLimits;
use domain::common::entity::DscpMarking;
use domain::rule::builder::RuleSettings;
use domain::rule::entity::SAME_CHIP_INTERFACE;

use crate::constants::{DEFAULT_EVENT_CHANNEL_CAPACITY, DEFAULT_METRICS_PORT};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] serde_yaml_ng::Error),

    #[error("invalid configuration: {field}: {message}")]
    Validation { field: String, message: String },
}

// ── Top-level config ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManagerConfig {
    #[serde(default)]
    pub manager: ManagerInfo,

    #[serde(default)]
    pub accel: AccelConfig,
}

impl ManagerConfig {
    /// Load config from a YAML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse config from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("accel.no_action_limit", self.accel.no_action_limit),
            ("accel.driver_fail_limit", self.accel.driver_fail_limit),
            ("accel.nack_limit", self.accel.nack_limit),
        ] {
            if value == 0 {
                return Err(ConfigError::Validation {
                    field: field.to_string(),
                    message: "limit must be at least 1".to_string(),
                });
            }
        }

        if self.manager.event_channel_capacity == 0 {
            return Err(ConfigError::Validation {
                field: "manager.event_channel_capacity".to_string(),
                message: "capacity must be at least 1".to_string(),
            });
        }

        if let Some(ref remark) = self.accel.dscp_remark {
            for (field, value) in [
                ("accel.dscp_remark.flow", remark.flow),
                ("accel.dscp_remark.return", remark.ret),
            ] {
                if value > 63 {
                    return Err(ConfigError::Validation {
                        field: field.to_string(),
                        message: format!("DSCP value {value} out of range (0-63)"),
                    });
                }
            }
        }

        Ok(())
    }

    pub fn accel_limits(&self) -> AccelLimits {
        AccelLimits {
            no_action: self.accel.no_action_limit,
            driver_fail: self.accel.driver_fail_limit,
            nack: self.accel.nack_limit,
        }
    }

    pub fn rule_settings(&self) -> RuleSettings {
        RuleSettings {
            same_chip_interface: self.accel.same_chip_interface,
            tcp_liberal: self.accel.tcp_liberal,
        }
    }

    pub fn dscp_marking(&self) -> Option<DscpMarking> {
        self.accel.dscp_remark.as_ref().map(|r| DscpMarking {
            flow_dscp: r.flow,
            return_dscp: r.ret,
        })
    }
}

// ── Manager info ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManagerInfo {
    #[serde(default = "default_log_level")]
    pub log_level: LogLevel,

    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,

    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl Default for ManagerInfo {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            metrics_port: default_metrics_port(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

// ── Acceleration section ───────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccelConfig {
    #[serde(default = "default_limit")]
    pub no_action_limit: u16,

    #[serde(default = "default_limit")]
    pub driver_fail_limit: u16,

    #[serde(default = "default_limit")]
    pub nack_limit: u16,

    /// Disable TCP sequence-space checking for every offloaded flow.
    #[serde(default)]
    pub tcp_liberal: bool,

    #[serde(default = "default_same_chip_interface")]
    pub same_chip_interface: i32,

    #[serde(default)]
    pub dscp_remark: Option<DscpRemarkConfig>,
}

impl Default for AccelConfig {
    fn default() -> Self {
        Self {
            no_action_limit: default_limit(),
            driver_fail_limit: default_limit(),
            nack_limit: default_limit(),
            tcp_liberal: false,
            same_chip_interface: default_same_chip_interface(),
            dscp_remark: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DscpRemarkConfig {
    pub flow: u8,
    #[serde(rename = "return")]
    pub ret: u8,
}

fn default_limit() -> u16 {
    AccelLimits::default().no_action
}
fn default_same_chip_interface() -> i32 {
    SAME_CHIP_INTERFACE
}
fn default_log_level() -> LogLevel {
    LogLevel::Info
}
fn default_log_format() -> LogFormat {
    LogFormat::Json
}
fn default_metrics_port() -> u16 {
    DEFAULT_METRICS_PORT
}
fn default_event_channel_capacity() -> usize {
    DEFAULT_EVENT_CHANNEL_CAPACITY
}

// ── Log level ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Log format ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Json,
    Text,
}
