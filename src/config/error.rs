//! Errors raised while locating, reading or checking configuration.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// An explicitly requested file does not exist.
    #[error("Configuration file {0} does not exist")]
    Missing(PathBuf),

    #[error("Cannot read configuration file {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed configuration in {path}: {source}")]
    Syntax {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// A value parsed but can never be used, e.g. a zero baud rate.
    #[error("Unusable value for {key}: {reason}")]
    Invalid { key: String, reason: String },

    /// A `SERIAL_SESSION_*` override could not be parsed.
    #[error("Bad value in environment variable {var}: {reason}")]
    Env { var: String, reason: String },
}

impl ConfigError {
    pub fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.into(),
            reason: reason.into(),
        }
    }

    pub fn env(var: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Env {
            var: var.into(),
            reason: reason.into(),
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;
