//! Unit tests for serial-session public types
//!
//! This module contains tests for:
//! - `port::settings`: line setting enums and `LineConfig`
//! - `port::status`: provider status codes and their mapping
//! - `port::options`: `OpenOptions` parsing and merging
//! - `error`: `AppError` display and conversions
//!
//! Tests follow the Arrange-Act-Assert pattern and cover:
//! - Default values and initialization
//! - JSON/TOML mapping of enums
//! - Error display implementations
//! - Error type conversions (From trait)

use serial_session::error::AppError;
use serial_session::port::{
    map_status, Cts, DataBits, Dsr, Dtr, ErrorKind, FlowControl, LineConfig, OpenOptions,
    Parity, PortError, Rts, StatusCode, StopBits, TimeoutPolicy, XonXoff,
};

// ============================================================================
// LineConfig Tests
// ============================================================================

#[cfg(test)]
mod line_config_tests {
    use super::*;

    #[test]
    fn test_line_config_default_values() {
        // Act
        let config = LineConfig::default();

        // Assert
        assert_eq!(config.baud_rate, 9600, "Default baud rate should be 9600");
        assert_eq!(config.data_bits, DataBits::Eight);
        assert_eq!(config.parity, Parity::None);
        assert_eq!(config.stop_bits, StopBits::One);
        assert_eq!(config.rts, Rts::Off);
        assert_eq!(config.dtr, Dtr::Off);
        assert_eq!(config.flow_control(), Some(FlowControl::None));
    }

    #[test]
    fn test_line_config_json_shape() {
        // Arrange
        let config = LineConfig {
            baud_rate: 115200,
            data_bits: DataBits::Seven,
            parity: Parity::Even,
            stop_bits: StopBits::Two,
            rts: Rts::FlowControl,
            cts: Cts::FlowControl,
            dtr: Dtr::On,
            dsr: Dsr::Ignore,
            xon_xoff: XonXoff::Disabled,
        };

        // Act
        let json = serde_json::to_value(config).expect("Failed to serialize");

        // Assert
        assert_eq!(json["baud_rate"], 115200);
        assert_eq!(json["data_bits"], 7);
        assert_eq!(json["parity"], "even");
        assert_eq!(json["stop_bits"], 2);
        assert_eq!(json["rts"], "flow_control");
    }

    #[test]
    fn test_flow_control_from_pins() {
        let cases = [
            (Rts::FlowControl, Cts::FlowControl, Dtr::On, Dsr::Ignore, XonXoff::Disabled, Some(FlowControl::RtsCts)),
            (Rts::On, Cts::Ignore, Dtr::FlowControl, Dsr::FlowControl, XonXoff::Disabled, Some(FlowControl::DtrDsr)),
            (Rts::On, Cts::Ignore, Dtr::On, Dsr::Ignore, XonXoff::InOut, Some(FlowControl::XonXoff)),
            (Rts::FlowControl, Cts::Ignore, Dtr::On, Dsr::Ignore, XonXoff::Disabled, None),
        ];

        for (rts, cts, dtr, dsr, xon_xoff, expected) in cases {
            let config = LineConfig {
                rts,
                cts,
                dtr,
                dsr,
                xon_xoff,
                ..LineConfig::default()
            };
            assert_eq!(config.flow_control(), expected, "pins {config:?}");
        }
    }
}

// ============================================================================
// Raw enum value Tests
// ============================================================================

#[cfg(test)]
mod raw_value_tests {
    use super::*;

    #[test]
    fn test_data_bits_raw_values() {
        for (raw, expected) in [
            (5, DataBits::Five),
            (6, DataBits::Six),
            (7, DataBits::Seven),
            (8, DataBits::Eight),
        ] {
            assert_eq!(DataBits::try_from(raw).unwrap(), expected);
            assert_eq!(i32::from(expected), raw);
        }
    }

    #[test]
    fn test_out_of_range_values_are_invalid_arguments() {
        // Act & Assert
        assert_eq!(DataBits::try_from(4).unwrap_err().kind(), ErrorKind::InvalidArgument);
        assert_eq!(StopBits::try_from(0).unwrap_err().kind(), ErrorKind::InvalidArgument);
        assert_eq!(Rts::try_from(-1).unwrap_err().kind(), ErrorKind::InvalidArgument);
        assert_eq!(XonXoff::try_from(4).unwrap_err().kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_parity_names_in_json() {
        let parity: Parity = serde_json::from_str(r#""space""#).expect("Failed to deserialize");
        assert_eq!(parity, Parity::Space);
        assert!(serde_json::from_str::<Parity>(r#""bogus""#).is_err());
    }
}

// ============================================================================
// Status mapping Tests
// ============================================================================

#[cfg(test)]
mod status_mapping_tests {
    use super::*;

    #[test]
    fn test_known_codes() {
        assert_eq!(map_status(StatusCode::OK), None);
        assert_eq!(
            map_status(StatusCode::ARG).map(|e| e.kind()),
            Some(ErrorKind::InvalidArgument)
        );
        assert_eq!(
            map_status(StatusCode::FAIL).map(|e| e.kind()),
            Some(ErrorKind::SystemFailure)
        );
        assert_eq!(map_status(StatusCode::MEM), Some(PortError::ResourceExhausted));
        assert_eq!(map_status(StatusCode::SUPP), Some(PortError::Unsupported));
    }

    #[test]
    fn test_unknown_codes() {
        assert_eq!(map_status(StatusCode(12)), None);
        assert_eq!(
            map_status(StatusCode(-1234)),
            Some(PortError::SystemFailure {
                code: StatusCode(-1234)
            })
        );
    }
}

// ============================================================================
// OpenOptions Tests
// ============================================================================

#[cfg(test)]
mod open_options_tests {
    use super::*;

    #[test]
    fn test_open_options_empty_json() {
        // Act
        let options: OpenOptions = serde_json::from_str("{}").expect("Failed to deserialize");

        // Assert
        assert_eq!(options, OpenOptions::default());
        assert_eq!(options.requested_baud_rate(), None);
    }

    #[test]
    fn test_open_options_builder() {
        let options = OpenOptions::new()
            .baud_rate(230400)
            .flow_control(FlowControl::DtrDsr)
            .timeout_policy(TimeoutPolicy::Error);

        assert_eq!(options.requested_baud_rate(), Some(230400));
        assert_eq!(options.flow_control, Some(FlowControl::DtrDsr));
        assert_eq!(options.timeout_policy, Some(TimeoutPolicy::Error));
        assert_eq!(options.parity, None);
    }
}

// ============================================================================
// AppError Tests
// ============================================================================

#[cfg(test)]
mod app_error_tests {
    use super::*;

    #[test]
    fn test_port_error_conversion() {
        // Arrange
        let port_err = PortError::not_found("COM9");

        // Act
        let app_err: AppError = port_err.into();

        // Assert
        assert!(matches!(app_err, AppError::Port(PortError::NotFound(_))));
        assert_eq!(app_err.to_string(), "Serial port error: Serial port not found: COM9");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        let app_err: AppError = io_err.into();
        assert!(app_err.to_string().contains("pipe closed"));
    }

    #[test]
    fn test_port_error_into_io_error() {
        let cases = [
            (PortError::invalid_argument("bad"), std::io::ErrorKind::InvalidInput),
            (PortError::not_found("COM1"), std::io::ErrorKind::NotFound),
            (PortError::Unsupported, std::io::ErrorKind::Unsupported),
            (
                PortError::Timeout(std::time::Duration::from_millis(10)),
                std::io::ErrorKind::TimedOut,
            ),
        ];

        for (port_err, expected) in cases {
            let io_err: std::io::Error = port_err.into();
            assert_eq!(io_err.kind(), expected);
        }
    }
}
