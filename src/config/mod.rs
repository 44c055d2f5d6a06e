//! Configuration module for serial-session.
//!
//! This module provides TOML-based configuration with environment variable overrides.
//! The file is only ever read; nothing here writes configuration back to disk.
//!
//! # Configuration Resolution
//!
//! Configuration is loaded from the following locations (in order of priority):
//!
//! 1. `SERIAL_SESSION_CONFIG` environment variable (explicit path)
//! 2. `./serial-session.toml` (current directory)
//! 3. `~/.config/serial-session/config.toml` (XDG on Linux/macOS)
//! 4. `%APPDATA%\serial-session\config.toml` (Windows)
//! 5. Built-in defaults (no file required)
//!
//! # Environment Overrides
//!
//! The pattern is: `SERIAL_SESSION_<SECTION>_<KEY>`
//!
//! Examples:
//! - `SERIAL_SESSION_SERIAL_BAUD_RATE=115200`
//! - `SERIAL_SESSION_SERIAL_FLOW_CONTROL=rts_cts`
//! - `SERIAL_SESSION_LOGGING_LEVEL=debug`
//!
//! # Example
//!
//! ```rust,no_run
//! use serial_session::config::ConfigLoader;
//!
//! let loader = ConfigLoader::load()?;
//! let options = loader.config().serial.open_options();
//! println!("Default baud: {:?}", options.baud_rate);
//! # Ok::<(), serial_session::config::ConfigError>(())
//! ```

mod error;
mod loader;
mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{get_default_config_path, resolve_config_path, ConfigLoader};
pub use schema::{Config, LogFormat, LoggingConfig, SerialConfig};
