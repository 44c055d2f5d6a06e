//! Serial Session Library
//!
//! A session abstraction over one serial device: discovery, two-phase
//! configuration, deadline-driven I/O and exactly-once release of the OS
//! handle.
//!
//! # Modules
//!
//! - `port`: Port registry, session, configuration store and providers
//! - `config`: Configuration management with TOML support
//! - `error`: Application-level error type used by the command-line tool
//! - `logging`: Tracing subscriber setup for the command-line tool
//!
//! # Example
//!
//! ```rust,no_run
//! use serial_session::{OpenOptions, PortRegistry};
//! use std::time::{Duration, Instant};
//!
//! let registry = PortRegistry::system();
//! let port = registry.open("/dev/ttyUSB0", &OpenOptions::new().baud_rate(115200))?;
//!
//! port.write(b"AT\r\n")?;
//! port.set_read_deadline(Some(Instant::now() + Duration::from_millis(500)))?;
//! let mut buffer = [0u8; 64];
//! let count = port.read(&mut buffer)?;
//! println!("{:?}", &buffer[..count]);
//! # Ok::<(), serial_session::PortError>(())
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod port;

// Re-export commonly used types for convenience
pub use error::{AppError, AppResult};
pub use port::{
    DataBits, DeviceInfo, FlowControl, LifecycleState, OpenMode, OpenOptions, Parity, Port,
    PortError, PortRegistry, PortResult, StopBits, TimeoutPolicy, TransportKind,
};

// Re-export config types
pub use config::{Config, ConfigError, ConfigLoader, ConfigResult};
