//! Deadline handling for transfers.
//!
//! A direction's deadline is turned into one of three transfer policies
//! before every call. The boundary between `Immediate` and `Bounded` is the
//! whole-millisecond truncation of the remaining interval: a provider
//! timeout of zero would mean "wait forever", so anything under one
//! millisecond is attempted without blocking.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// How a single transfer is issued to the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferPolicy {
    /// No deadline: block until the transfer completes or fails.
    Unbounded,
    /// Deadline reached: transfer only what is possible right now.
    Immediate,
    /// Block for at most the given whole number of milliseconds.
    Bounded(Duration),
}

impl TransferPolicy {
    /// Derive the policy for a transfer starting at `now`.
    pub fn from_deadline(deadline: Option<Instant>, now: Instant) -> Self {
        let Some(deadline) = deadline else {
            return Self::Unbounded;
        };

        let millis = deadline.saturating_duration_since(now).as_millis();
        if millis == 0 {
            Self::Immediate
        } else {
            let millis = u64::try_from(millis).unwrap_or(u64::MAX);
            Self::Bounded(Duration::from_millis(millis))
        }
    }

    /// Provider timeout for blocking calls; `None` for the other policies.
    pub fn timeout(&self) -> Option<Duration> {
        match self {
            Self::Bounded(timeout) => Some(*timeout),
            _ => None,
        }
    }
}

/// Outcome of a bounded transfer that moved no bytes before its deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutPolicy {
    /// Report a successful transfer of zero bytes.
    #[default]
    ZeroCount,
    /// Report [`PortError::Timeout`](super::PortError::Timeout).
    Error,
}

/// Deadline `timeout` from now, for use with the deadline setters.
pub fn deadline_after(timeout: Duration) -> Instant {
    Instant::now() + timeout
}
