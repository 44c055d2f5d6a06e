//! Unified application error type for the command-line tool.

use crate::config::ConfigError;
use crate::port::PortError;
use thiserror::Error;

/// A specialized `Result` type for the command-line tool.
pub type AppResult<T> = Result<T, AppError>;

/// Everything that can stop a command.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Serial port error: {0}")]
    Port(#[from] PortError),

    #[error("An I/O error occurred: {0}")]
    Io(#[from] std::io::Error),

    #[error("A serialization error occurred: {0}")]
    Serde(#[from] serde_json::Error),
}
