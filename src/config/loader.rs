//! Configuration loader with file resolution and environment override support.

use super::error::{ConfigError, ConfigResult};
use super::schema::{Config, LogFormat};
use crate::port::{DataBits, StopBits};
use serde::de::{value::StrDeserializer, DeserializeOwned, IntoDeserializer};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable prefix for overrides
const ENV_PREFIX: &str = "SERIAL_SESSION";

/// Config file name looked up in the current directory
const LOCAL_CONFIG_FILE_NAME: &str = "serial-session.toml";

/// Config file name inside the per-user config directory
const CONFIG_FILE_NAME: &str = "config.toml";

/// Application directory inside the per-user config directory
const APP_DIR_NAME: &str = "serial-session";

/// Environment variable for explicit config path
const CONFIG_PATH_ENV: &str = "SERIAL_SESSION_CONFIG";

/// Configuration loader with resolution and override logic.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Resolved config file path (if any)
    pub config_path: Option<PathBuf>,
    /// The loaded configuration
    pub config: Config,
}

impl ConfigLoader {
    /// Load configuration using standard resolution order.
    ///
    /// Resolution priority (highest to lowest):
    /// 1. `SERIAL_SESSION_CONFIG` environment variable (explicit path)
    /// 2. `./serial-session.toml` (current directory)
    /// 3. `~/.config/serial-session/config.toml` (XDG on Linux/macOS)
    /// 4. `%APPDATA%\serial-session\config.toml` (Windows)
    /// 5. Built-in defaults (no file required)
    ///
    /// Environment variables override any config file values.
    pub fn load() -> ConfigResult<Self> {
        let config_path = resolve_config_path();

        let mut config = match config_path {
            Some(ref path) => load_from_file(path)?,
            None => Config::default(),
        };

        apply_env_overrides(&mut config)?;
        config.validate()?;

        debug!(path = ?config_path, "configuration loaded");
        Ok(Self { config_path, config })
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(ConfigError::Missing(path));
        }

        let mut config = load_from_file(&path)?;
        apply_env_overrides(&mut config)?;
        config.validate()?;

        Ok(Self {
            config_path: Some(path),
            config,
        })
    }

    /// Create a loader with default configuration (no file).
    ///
    /// Environment overrides that fail to parse are ignored.
    pub fn with_defaults() -> Self {
        let mut config = Config::default();
        if let Err(err) = apply_env_overrides(&mut config) {
            debug!(error = %err, "ignoring invalid environment override");
        }

        Self {
            config_path: None,
            config,
        }
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Consume the loader and return the configuration.
    pub fn into_config(self) -> Config {
        self.config
    }

    /// Reload configuration from file (if path is set).
    pub fn reload(&mut self) -> ConfigResult<()> {
        if let Some(ref path) = self.config_path {
            let mut config = load_from_file(path)?;
            apply_env_overrides(&mut config)?;
            config.validate()?;
            self.config = config;
        }
        Ok(())
    }
}

/// Resolve the configuration file path using standard locations.
pub fn resolve_config_path() -> Option<PathBuf> {
    // 1. Explicit environment variable
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. Current directory
    let cwd_config = PathBuf::from(LOCAL_CONFIG_FILE_NAME);
    if cwd_config.exists() {
        return Some(cwd_config);
    }

    // 3. XDG config directory (Linux/macOS) or APPDATA (Windows)
    get_default_config_path().filter(|path| path.exists())
}

/// Get the platform-specific config directory.
fn get_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var("APPDATA").ok().map(PathBuf::from)
    }

    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var("HOME")
                    .ok()
                    .map(|h| PathBuf::from(h).join(".config"))
            })
    }
}

/// Get the per-user config file path.
pub fn get_default_config_path() -> Option<PathBuf> {
    get_config_dir().map(|d| d.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Load configuration from a file.
fn load_from_file(path: &Path) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Unreadable {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&content).map_err(|source| ConfigError::Syntax {
        path: path.to_path_buf(),
        source,
    })
}

fn env_var(key: &str) -> (String, Option<String>) {
    let var = format!("{}_{}", ENV_PREFIX, key);
    let value = std::env::var(&var).ok();
    (var, value)
}

/// Parse a snake_case enum value such as `even` or `rts_cts`.
fn parse_named<T: DeserializeOwned>(var: &str, value: &str) -> ConfigResult<T> {
    let deserializer: StrDeserializer<'_, serde::de::value::Error> =
        value.trim().into_deserializer();
    T::deserialize(deserializer).map_err(|e| ConfigError::env(var, e.to_string()))
}

fn parse_number<T, R>(var: &str, value: &str) -> ConfigResult<T>
where
    R: std::str::FromStr,
    T: TryFrom<R>,
    T::Error: std::fmt::Display,
{
    let raw: R = value
        .trim()
        .parse()
        .map_err(|_| ConfigError::env(var, "not a number"))?;
    T::try_from(raw).map_err(|e| ConfigError::env(var, e.to_string()))
}

/// Apply environment variable overrides to the configuration.
///
/// Environment variables follow the pattern: `SERIAL_SESSION_<SECTION>_<KEY>`
/// For example:
/// - `SERIAL_SESSION_SERIAL_BAUD_RATE=115200`
/// - `SERIAL_SESSION_SERIAL_PARITY=even`
/// - `SERIAL_SESSION_LOGGING_FORMAT=json`
fn apply_env_overrides(config: &mut Config) -> ConfigResult<()> {
    // Serial overrides
    if let (var, Some(val)) = env_var("SERIAL_BAUD_RATE") {
        let baud: u32 = val
            .trim()
            .parse()
            .map_err(|_| ConfigError::env(&var, "Invalid baud rate"))?;
        if baud == 0 {
            return Err(ConfigError::env(var, "baud rate must be non-zero"));
        }
        config.serial.baud_rate = Some(baud);
    }
    if let (var, Some(val)) = env_var("SERIAL_DATA_BITS") {
        config.serial.data_bits = Some(parse_number::<DataBits, i32>(&var, &val)?);
    }
    if let (var, Some(val)) = env_var("SERIAL_STOP_BITS") {
        config.serial.stop_bits = Some(parse_number::<StopBits, i32>(&var, &val)?);
    }
    if let (var, Some(val)) = env_var("SERIAL_PARITY") {
        config.serial.parity = Some(parse_named(&var, &val)?);
    }
    if let (var, Some(val)) = env_var("SERIAL_FLOW_CONTROL") {
        config.serial.flow_control = Some(parse_named(&var, &val)?);
    }
    if let (var, Some(val)) = env_var("SERIAL_TIMEOUT_POLICY") {
        config.serial.timeout_policy = Some(parse_named(&var, &val)?);
    }

    // Logging overrides
    if let (_, Some(val)) = env_var("LOGGING_LEVEL") {
        config.logging.level = val;
    }
    if let (var, Some(val)) = env_var("LOGGING_FORMAT") {
        config.logging.format = parse_named::<LogFormat>(&var, &val.to_lowercase())?;
    }

    Ok(())
}
