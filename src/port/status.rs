//! Provider status codes and their mapping onto [`PortError`].
//!
//! Providers report failures with the same small set of negative codes the
//! native serial libraries use. The mapping is a constant table so it can be
//! tested without any device.

use super::error::{ErrorKind, PortError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Raw status code reported by a transport provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusCode(pub i32);

impl StatusCode {
    /// Operation completed successfully.
    pub const OK: Self = Self(0);
    /// Invalid arguments were passed to the function.
    pub const ARG: Self = Self(-1);
    /// A system error occurred while executing the operation.
    pub const FAIL: Self = Self(-2);
    /// A memory allocation failed while executing the operation.
    pub const MEM: Self = Self(-3);
    /// The requested operation is not supported by this system or device.
    pub const SUPP: Self = Self(-4);

    pub fn raw(self) -> i32 {
        self.0
    }

    pub fn is_failure(self) -> bool {
        self.0 < 0
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of a provider call.
pub type ProviderResult<T> = Result<T, StatusCode>;

const STATUS_TABLE: [(StatusCode, ErrorKind); 4] = [
    (StatusCode::ARG, ErrorKind::InvalidArgument),
    (StatusCode::FAIL, ErrorKind::SystemFailure),
    (StatusCode::MEM, ErrorKind::ResourceExhausted),
    (StatusCode::SUPP, ErrorKind::Unsupported),
];

/// Map a provider status code to an error.
///
/// `OK` and any non-negative code map to `None`. Unknown negative codes are
/// reported as [`PortError::SystemFailure`] with the raw code retained.
pub fn map_status(code: StatusCode) -> Option<PortError> {
    if !code.is_failure() {
        return None;
    }

    let kind = STATUS_TABLE
        .iter()
        .find(|(known, _)| *known == code)
        .map(|(_, kind)| *kind)
        .unwrap_or(ErrorKind::SystemFailure);

    Some(match kind {
        ErrorKind::InvalidArgument => {
            PortError::invalid_argument(format!("rejected by provider (status {code})"))
        }
        ErrorKind::ResourceExhausted => PortError::ResourceExhausted,
        ErrorKind::Unsupported => PortError::Unsupported,
        _ => PortError::SystemFailure { code },
    })
}

/// Convert the error half of a provider result into a [`PortError`].
///
/// A provider that fails with a non-failure code broke its contract; that is
/// surfaced as a system failure carrying the offending code.
pub(crate) fn provider_error(code: StatusCode) -> PortError {
    map_status(code).unwrap_or(PortError::SystemFailure { code })
}

/// Lift a provider result into a port result.
pub(crate) fn check<T>(result: ProviderResult<T>) -> Result<T, PortError> {
    result.map_err(provider_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_known_codes() {
        assert_eq!(map_status(StatusCode::OK), None);
        assert_eq!(
            map_status(StatusCode::ARG).map(|e| e.kind()),
            Some(ErrorKind::InvalidArgument)
        );
        assert_eq!(
            map_status(StatusCode::FAIL),
            Some(PortError::SystemFailure {
                code: StatusCode::FAIL
            })
        );
        assert_eq!(map_status(StatusCode::MEM), Some(PortError::ResourceExhausted));
        assert_eq!(map_status(StatusCode::SUPP), Some(PortError::Unsupported));
    }

    #[test]
    fn test_unknown_negative_code_keeps_raw_value() {
        assert_eq!(
            map_status(StatusCode(-17)),
            Some(PortError::SystemFailure {
                code: StatusCode(-17)
            })
        );
    }

    #[test]
    fn test_contract_violation_is_system_failure() {
        assert_eq!(
            provider_error(StatusCode(3)),
            PortError::SystemFailure {
                code: StatusCode(3)
            }
        );
    }

    proptest! {
        #[test]
        fn non_negative_codes_map_to_none(code in 0i32..) {
            prop_assert!(map_status(StatusCode(code)).is_none());
        }

        #[test]
        fn negative_codes_always_map_to_an_error(code in i32::MIN..0) {
            prop_assert!(map_status(StatusCode(code)).is_some());
        }
    }
}
