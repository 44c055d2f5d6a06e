//! Tracing subscriber setup for the command-line tool.
//!
//! The library only emits events; installing a subscriber is left to the
//! binary so embedding applications keep control of their own output.

use crate::config::{LogFormat, LoggingConfig};
use tracing_subscriber::EnvFilter;

/// Install a global fmt subscriber writing to stderr.
///
/// `RUST_LOG` takes precedence over `config.level`. `verbosity` raises the
/// configured level by one step per count (`-v` debug, `-vv` trace). Calling
/// this twice is harmless; the second subscriber is simply not installed.
pub fn init(config: &LoggingConfig, verbosity: u8) {
    let level = match verbosity {
        0 => config.level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);

    let result = match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
    };
    if let Err(err) = result {
        tracing::debug!(error = %err, "tracing subscriber already installed");
    }
}
