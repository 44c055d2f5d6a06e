//! Configuration schema definitions.
//!
//! This module defines the structure of the configuration file using serde.
//! Every section has defaults, so an empty file is a valid configuration.

use super::error::{ConfigError, ConfigResult};
use crate::port::{
    DataBits, FlowControl, OpenOptions, Parity, PortRegistry, StopBits, TimeoutPolicy,
    TransportProvider,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Serial port defaults
    pub serial: SerialConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Reject values that parse but can never work.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.serial.baud_rate == Some(0) {
            return Err(ConfigError::invalid(
                "serial.baud_rate",
                "baud rate must be non-zero",
            ));
        }
        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::invalid("logging.level", "level must not be empty"));
        }
        Ok(())
    }
}

/// Serial port configuration section.
///
/// Unset fields are left to the port's open-time defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    pub baud_rate: Option<u32>,
    pub data_bits: Option<DataBits>,
    pub stop_bits: Option<StopBits>,
    pub parity: Option<Parity>,
    pub flow_control: Option<FlowControl>,
    pub timeout_policy: Option<TimeoutPolicy>,
    /// Friendly names for device paths
    pub port_aliases: HashMap<String, String>,
}

impl SerialConfig {
    /// Open options carrying these defaults.
    pub fn open_options(&self) -> OpenOptions {
        OpenOptions {
            baud_rate: self.baud_rate,
            data_bits: self.data_bits,
            stop_bits: self.stop_bits,
            parity: self.parity,
            flow_control: self.flow_control,
            timeout_policy: self.timeout_policy,
            ..OpenOptions::default()
        }
    }

    /// Registry over `provider` that resolves the configured aliases.
    pub fn registry(&self, provider: Arc<dyn TransportProvider>) -> PortRegistry {
        PortRegistry::new(provider).with_aliases(self.port_aliases.clone())
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive: "trace", "debug", "info", "warn", "error" or a
    /// full `EnvFilter` expression
    pub level: String,
    /// Log format: "json", "pretty", "compact"
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format
    Json,
    /// Pretty format with colors
    #[default]
    Pretty,
    /// Compact format
    Compact,
}
