//! Port-specific error types.
//!
//! Every failure the session core can report is one of the variants below.
//! Provider status codes reach this type through [`super::status::map_status`];
//! lifecycle violations and lookups are raised by the core itself.

use super::lifecycle::LifecycleState;
use super::status::StatusCode;
use std::time::Duration;
use thiserror::Error;

/// Result type for port operations.
pub type PortResult<T> = Result<T, PortError>;

/// Errors that can occur during serial port operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PortError {
    /// An argument was out of range or rejected by the provider.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The operating system or driver reported a failure.
    #[error("System failure (provider status {code})")]
    SystemFailure {
        /// Raw provider status, kept for diagnostics.
        code: StatusCode,
    },

    /// The provider could not allocate the memory it needed.
    #[error("Resource exhausted while executing the operation")]
    ResourceExhausted,

    /// The operation is not supported by this system or device.
    #[error("Operation not supported by this system or device")]
    Unsupported,

    /// The port is not in a state that allows the operation.
    #[error("Cannot {operation} a port in the {state} state")]
    InvalidState {
        operation: &'static str,
        state: LifecycleState,
    },

    /// The specified serial port was not found on the system.
    #[error("Serial port not found: {0}")]
    NotFound(String),

    /// A bounded transfer moved no bytes before its deadline.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),
}

/// The bare error taxonomy, without context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidArgument,
    SystemFailure,
    ResourceExhausted,
    Unsupported,
    InvalidState,
    NotFound,
    Timeout,
}

impl PortError {
    /// Create an InvalidArgument error from a message.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Create a NotFound error from a port name.
    pub fn not_found(port_name: impl Into<String>) -> Self {
        Self::NotFound(port_name.into())
    }

    /// Create an InvalidState error for `operation` attempted in `state`.
    pub fn invalid_state(operation: &'static str, state: LifecycleState) -> Self {
        Self::InvalidState { operation, state }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::SystemFailure { .. } => ErrorKind::SystemFailure,
            Self::ResourceExhausted => ErrorKind::ResourceExhausted,
            Self::Unsupported => ErrorKind::Unsupported,
            Self::InvalidState { .. } => ErrorKind::InvalidState,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Timeout(_) => ErrorKind::Timeout,
        }
    }
}

impl From<PortError> for std::io::Error {
    fn from(err: PortError) -> Self {
        use std::io::ErrorKind as Io;

        let kind = match err.kind() {
            ErrorKind::InvalidArgument => Io::InvalidInput,
            ErrorKind::SystemFailure => Io::Other,
            ErrorKind::ResourceExhausted => Io::OutOfMemory,
            ErrorKind::Unsupported => Io::Unsupported,
            ErrorKind::InvalidState => Io::NotConnected,
            ErrorKind::NotFound => Io::NotFound,
            ErrorKind::Timeout => Io::TimedOut,
        };
        std::io::Error::new(kind, err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PortError::not_found("/dev/ttyUSB0");
        assert_eq!(err.to_string(), "Serial port not found: /dev/ttyUSB0");

        let err = PortError::invalid_argument("baud rate must be non-zero");
        assert_eq!(err.to_string(), "Invalid argument: baud rate must be non-zero");

        let err = PortError::invalid_state("read", LifecycleState::Closed);
        assert_eq!(err.to_string(), "Cannot read a port in the closed state");
    }

    #[test]
    fn test_system_failure_keeps_code() {
        let err = PortError::SystemFailure {
            code: StatusCode(-42),
        };
        assert!(err.to_string().contains("-42"));
        assert_eq!(err.kind(), ErrorKind::SystemFailure);
    }

    #[test]
    fn test_timeout_error() {
        let err = PortError::Timeout(Duration::from_millis(500));
        assert!(err.to_string().contains("500ms"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io: std::io::Error = PortError::Timeout(Duration::from_millis(1)).into();
        assert_eq!(io.kind(), std::io::ErrorKind::TimedOut);

        let io: std::io::Error = PortError::invalid_state("write", LifecycleState::Freed).into();
        assert_eq!(io.kind(), std::io::ErrorKind::NotConnected);
    }
}
