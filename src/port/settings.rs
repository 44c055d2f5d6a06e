//! Line settings: the value types a port configuration is built from.
//!
//! Numeric values follow the table used by native serial providers, so raw
//! values coming from a provider or a config file convert with `TryFrom<i32>`
//! and out-of-range values are rejected as invalid arguments.

use super::error::PortError;
use serde::{Deserialize, Serialize};

macro_rules! raw_values {
    ($ty:ident { $($variant:ident = $value:literal),+ $(,)? }) => {
        impl TryFrom<i32> for $ty {
            type Error = PortError;

            fn try_from(raw: i32) -> Result<Self, Self::Error> {
                match raw {
                    $($value => Ok(Self::$variant),)+
                    other => Err(PortError::invalid_argument(format!(
                        concat!("invalid ", stringify!($ty), " value {}"),
                        other
                    ))),
                }
            }
        }

        impl From<$ty> for i32 {
            fn from(value: $ty) -> Self {
                match value {
                    $($ty::$variant => $value,)+
                }
            }
        }
    };
}

/// Number of data bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum DataBits {
    Five,
    Six,
    Seven,
    Eight,
}

raw_values!(DataBits { Five = 5, Six = 6, Seven = 7, Eight = 8 });

/// Number of stop bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum StopBits {
    One,
    Two,
}

raw_values!(StopBits { One = 1, Two = 2 });

/// Parity checking modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parity {
    None,
    Odd,
    Even,
    Mark,
    Space,
}

raw_values!(Parity { None = 0, Odd = 1, Even = 2, Mark = 3, Space = 4 });

/// RTS pin behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rts {
    Off,
    On,
    FlowControl,
}

raw_values!(Rts { Off = 0, On = 1, FlowControl = 2 });

/// CTS pin behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cts {
    Ignore,
    FlowControl,
}

raw_values!(Cts { Ignore = 0, FlowControl = 1 });

/// DTR pin behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dtr {
    Off,
    On,
    FlowControl,
}

raw_values!(Dtr { Off = 0, On = 1, FlowControl = 2 });

/// DSR pin behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dsr {
    Ignore,
    FlowControl,
}

raw_values!(Dsr { Ignore = 0, FlowControl = 1 });

/// XON/XOFF software flow control behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum XonXoff {
    Disabled,
    In,
    Out,
    InOut,
}

raw_values!(XonXoff { Disabled = 0, In = 1, Out = 2, InOut = 3 });

/// Standard flow control combinations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowControl {
    None,
    XonXoff,
    RtsCts,
    DtrDsr,
}

raw_values!(FlowControl { None = 0, XonXoff = 1, RtsCts = 2, DtrDsr = 3 });

/// A fully populated line configuration, as the hardware holds it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineConfig {
    /// Baud rate (bits per second).
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
    pub rts: Rts,
    pub cts: Cts,
    pub dtr: Dtr,
    pub dsr: Dsr,
    pub xon_xoff: XonXoff,
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            rts: Rts::Off,
            cts: Cts::Ignore,
            dtr: Dtr::Off,
            dsr: Dsr::Ignore,
            xon_xoff: XonXoff::Disabled,
        }
    }
}

impl LineConfig {
    /// The standard flow control combination these pins form, if any.
    pub fn flow_control(&self) -> Option<FlowControl> {
        let rts_flow = self.rts == Rts::FlowControl;
        let dtr_flow = self.dtr == Dtr::FlowControl;

        match (self.cts, self.dsr, self.xon_xoff) {
            (Cts::FlowControl, Dsr::Ignore, XonXoff::Disabled) if rts_flow && !dtr_flow => {
                Some(FlowControl::RtsCts)
            }
            (Cts::Ignore, Dsr::FlowControl, XonXoff::Disabled) if dtr_flow && !rts_flow => {
                Some(FlowControl::DtrDsr)
            }
            (Cts::Ignore, Dsr::Ignore, XonXoff::InOut) if !rts_flow && !dtr_flow => {
                Some(FlowControl::XonXoff)
            }
            (Cts::Ignore, Dsr::Ignore, XonXoff::Disabled) if !rts_flow && !dtr_flow => {
                Some(FlowControl::None)
            }
            _ => None,
        }
    }
}
