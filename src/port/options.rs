//! Options supplied when opening a port.

use super::deadline::TimeoutPolicy;
use super::settings::{DataBits, FlowControl, Parity, StopBits};
use super::traits::OpenMode;
use serde::{Deserialize, Serialize};

/// Serial port options.
///
/// Every field is optional. Unset line settings fall back, at open time, to
/// values set on the port beforehand and then to 9600 baud, 8 data bits,
/// 1 stop bit, no parity and no flow control. A baud rate of `0` counts as
/// unset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenOptions {
    /// Access mode; read/write when unset.
    pub mode: Option<OpenMode>,
    pub baud_rate: Option<u32>,
    pub data_bits: Option<DataBits>,
    pub stop_bits: Option<StopBits>,
    pub parity: Option<Parity>,
    pub flow_control: Option<FlowControl>,
    /// How bounded transfers that move no bytes are reported.
    pub timeout_policy: Option<TimeoutPolicy>,
}

impl OpenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(mut self, mode: OpenMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = Some(baud_rate);
        self
    }

    pub fn data_bits(mut self, data_bits: DataBits) -> Self {
        self.data_bits = Some(data_bits);
        self
    }

    pub fn stop_bits(mut self, stop_bits: StopBits) -> Self {
        self.stop_bits = Some(stop_bits);
        self
    }

    pub fn parity(mut self, parity: Parity) -> Self {
        self.parity = Some(parity);
        self
    }

    pub fn flow_control(mut self, flow_control: FlowControl) -> Self {
        self.flow_control = Some(flow_control);
        self
    }

    pub fn timeout_policy(mut self, policy: TimeoutPolicy) -> Self {
        self.timeout_policy = Some(policy);
        self
    }

    /// Baud rate with `0` treated as unset.
    pub fn requested_baud_rate(&self) -> Option<u32> {
        self.baud_rate.filter(|&baud| baud != 0)
    }

    /// Fill the fields left unset here from `fallback`.
    pub fn or(self, fallback: &OpenOptions) -> Self {
        Self {
            mode: self.mode.or(fallback.mode),
            baud_rate: self.requested_baud_rate().or(fallback.requested_baud_rate()),
            data_bits: self.data_bits.or(fallback.data_bits),
            stop_bits: self.stop_bits.or(fallback.stop_bits),
            parity: self.parity.or(fallback.parity),
            flow_control: self.flow_control.or(fallback.flow_control),
            timeout_policy: self.timeout_policy.or(fallback.timeout_policy),
        }
    }
}
