//! Two-phase port configuration.
//!
//! The store holds two snapshots. The *desired* [`PendingConfig`] is replaced
//! by every setter and never reaches hardware on its own. The *applied*
//! [`AppliedConfig`] can only be produced by a successful commit, so getters
//! reading it never observe uncommitted values.

use super::error::PortResult;
use super::options::OpenOptions;
use super::settings::{
    Cts, DataBits, Dsr, Dtr, FlowControl, LineConfig, Parity, Rts, StopBits, XonXoff,
};
use super::status::check;
use super::traits::DeviceHandle;
use serde::Serialize;
use std::ops::Deref;
use tracing::{debug, warn};

/// Baud rate used when neither the open options nor a setter chose one.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Desired configuration. `None` leaves the field as the hardware has it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PendingConfig {
    pub baud_rate: Option<u32>,
    pub data_bits: Option<DataBits>,
    pub parity: Option<Parity>,
    pub stop_bits: Option<StopBits>,
    pub rts: Option<Rts>,
    pub cts: Option<Cts>,
    pub dtr: Option<Dtr>,
    pub dsr: Option<Dsr>,
    pub xon_xoff: Option<XonXoff>,
}

impl PendingConfig {
    pub fn with_baud_rate(self, baud_rate: u32) -> Self {
        Self {
            baud_rate: Some(baud_rate),
            ..self
        }
    }

    pub fn with_data_bits(self, data_bits: DataBits) -> Self {
        Self {
            data_bits: Some(data_bits),
            ..self
        }
    }

    pub fn with_parity(self, parity: Parity) -> Self {
        Self {
            parity: Some(parity),
            ..self
        }
    }

    pub fn with_stop_bits(self, stop_bits: StopBits) -> Self {
        Self {
            stop_bits: Some(stop_bits),
            ..self
        }
    }

    pub fn with_rts(self, rts: Rts) -> Self {
        Self {
            rts: Some(rts),
            ..self
        }
    }

    pub fn with_cts(self, cts: Cts) -> Self {
        Self {
            cts: Some(cts),
            ..self
        }
    }

    pub fn with_dtr(self, dtr: Dtr) -> Self {
        Self {
            dtr: Some(dtr),
            ..self
        }
    }

    pub fn with_dsr(self, dsr: Dsr) -> Self {
        Self {
            dsr: Some(dsr),
            ..self
        }
    }

    pub fn with_xon_xoff(self, xon_xoff: XonXoff) -> Self {
        Self {
            xon_xoff: Some(xon_xoff),
            ..self
        }
    }

    /// Set the pins and XON/XOFF mode for a standard flow control
    /// combination.
    ///
    /// Pins that stop being used for flow control are turned on rather than
    /// left floating. `baseline` supplies the pin modes for fields this
    /// snapshot leaves unset.
    pub fn with_flow_control(self, flow: FlowControl, baseline: Option<&LineConfig>) -> Self {
        let rts_flowing = match self.rts {
            Some(rts) => rts == Rts::FlowControl,
            None => baseline.is_some_and(|b| b.rts == Rts::FlowControl),
        };
        let dtr_flowing = match self.dtr {
            Some(dtr) => dtr == Dtr::FlowControl,
            None => baseline.is_some_and(|b| b.dtr == Dtr::FlowControl),
        };
        let rts_released = if rts_flowing { Some(Rts::On) } else { self.rts };
        let dtr_released = if dtr_flowing { Some(Dtr::On) } else { self.dtr };

        let (xon_xoff, rts, cts, dtr, dsr) = match flow {
            FlowControl::None => (
                XonXoff::Disabled,
                rts_released,
                Cts::Ignore,
                dtr_released,
                Dsr::Ignore,
            ),
            FlowControl::XonXoff => (
                XonXoff::InOut,
                rts_released,
                Cts::Ignore,
                dtr_released,
                Dsr::Ignore,
            ),
            FlowControl::RtsCts => (
                XonXoff::Disabled,
                Some(Rts::FlowControl),
                Cts::FlowControl,
                dtr_released,
                Dsr::Ignore,
            ),
            FlowControl::DtrDsr => (
                XonXoff::Disabled,
                rts_released,
                Cts::Ignore,
                Some(Dtr::FlowControl),
                Dsr::FlowControl,
            ),
        };

        Self {
            rts,
            cts: Some(cts),
            dtr,
            dsr: Some(dsr),
            xon_xoff: Some(xon_xoff),
            ..self
        }
    }

    /// Whether any field that takes part in flow control has been chosen.
    pub fn has_flow_settings(&self) -> bool {
        self.cts.is_some()
            || self.dsr.is_some()
            || self.xon_xoff.is_some()
            || self.rts == Some(Rts::FlowControl)
            || self.dtr == Some(Dtr::FlowControl)
    }

    /// Complete this snapshot with `baseline` for every unset field.
    pub fn resolve(&self, baseline: &LineConfig) -> LineConfig {
        LineConfig {
            baud_rate: self.baud_rate.unwrap_or(baseline.baud_rate),
            data_bits: self.data_bits.unwrap_or(baseline.data_bits),
            parity: self.parity.unwrap_or(baseline.parity),
            stop_bits: self.stop_bits.unwrap_or(baseline.stop_bits),
            rts: self.rts.unwrap_or(baseline.rts),
            cts: self.cts.unwrap_or(baseline.cts),
            dtr: self.dtr.unwrap_or(baseline.dtr),
            dsr: self.dsr.unwrap_or(baseline.dsr),
            xon_xoff: self.xon_xoff.unwrap_or(baseline.xon_xoff),
        }
    }
}

/// Configuration last committed to hardware, as the hardware reported it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AppliedConfig(LineConfig);

impl AppliedConfig {
    pub fn line(&self) -> &LineConfig {
        &self.0
    }
}

impl Deref for AppliedConfig {
    type Target = LineConfig;

    fn deref(&self) -> &LineConfig {
        &self.0
    }
}

/// Desired and applied snapshots of one port.
#[derive(Debug, Default)]
pub struct ConfigStore {
    desired: PendingConfig,
    applied: Option<AppliedConfig>,
}

impl ConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn desired(&self) -> PendingConfig {
        self.desired
    }

    pub fn applied(&self) -> Option<AppliedConfig> {
        self.applied
    }

    /// Replace the desired snapshot with `f(desired)`.
    pub fn update(&mut self, f: impl FnOnce(PendingConfig) -> PendingConfig) {
        self.desired = f(self.desired);
    }

    /// Replace the desired pins with a standard flow control combination.
    pub fn update_flow_control(&mut self, flow: FlowControl) {
        let baseline = self.applied.map(|applied| applied.0);
        self.desired = self.desired.with_flow_control(flow, baseline.as_ref());
    }

    /// The snapshot an open with `options` would commit: options first, then
    /// earlier setters, then the open-time defaults. The store itself is left
    /// alone until that snapshot has been committed.
    pub fn prepare_open(&self, options: &OpenOptions, hardware: &LineConfig) -> PendingConfig {
        let pending = self.desired;
        let next = PendingConfig {
            baud_rate: options
                .requested_baud_rate()
                .or(pending.baud_rate)
                .or(Some(DEFAULT_BAUD_RATE)),
            data_bits: options
                .data_bits
                .or(pending.data_bits)
                .or(Some(DataBits::Eight)),
            stop_bits: options
                .stop_bits
                .or(pending.stop_bits)
                .or(Some(StopBits::One)),
            parity: options.parity.or(pending.parity).or(Some(Parity::None)),
            rts: pending.rts.or(Some(Rts::Off)),
            dtr: pending.dtr.or(Some(Dtr::Off)),
            ..pending
        };

        match options.flow_control {
            Some(flow) => next.with_flow_control(flow, Some(hardware)),
            None if !pending.has_flow_settings() => {
                next.with_flow_control(FlowControl::None, Some(hardware))
            }
            None => next,
        }
    }

    /// Commit the desired snapshot, completed from `baseline`, in one
    /// provider call and record what the hardware reports back.
    ///
    /// On failure the applied snapshot is left as it was. The hardware may
    /// still have taken part of the new configuration.
    pub fn commit(
        &mut self,
        handle: &dyn DeviceHandle,
        baseline: &LineConfig,
    ) -> PortResult<AppliedConfig> {
        self.commit_with(handle, self.desired, baseline)
    }

    /// Commit `desired`, completed from `baseline`. It becomes the desired
    /// snapshot only once the provider has accepted it.
    pub fn commit_with(
        &mut self,
        handle: &dyn DeviceHandle,
        desired: PendingConfig,
        baseline: &LineConfig,
    ) -> PortResult<AppliedConfig> {
        let requested = desired.resolve(baseline);
        check(handle.set_config(&requested))?;
        self.desired = desired;

        let effective = match handle.get_config() {
            Ok(effective) => effective,
            Err(code) => {
                warn!(%code, "configuration readback failed, recording requested values");
                requested
            }
        };
        if effective.baud_rate != requested.baud_rate {
            debug!(
                requested = requested.baud_rate,
                effective = effective.baud_rate,
                "hardware adjusted baud rate"
            );
        }

        let applied = AppliedConfig(effective);
        self.applied = Some(applied);
        Ok(applied)
    }

    /// Drop both snapshots.
    pub fn release(&mut self) {
        self.desired = PendingConfig::default();
        self.applied = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::mock::MockDevice;
    use crate::port::status::StatusCode;
    use crate::port::traits::{DeviceInfo, OpenMode};
    use crate::port::PortError;
    use pretty_assertions::assert_eq;

    fn mock_handle() -> (MockDevice, Box<dyn DeviceHandle>) {
        let device = MockDevice::new(DeviceInfo::native("MOCK0", "mock"));
        let handle = device.open_handle(OpenMode::ReadWrite);
        (device, handle)
    }

    #[test]
    fn test_open_defaults_fill_unset_fields() {
        let mut store = ConfigStore::new();
        let hardware = LineConfig {
            baud_rate: 19200,
            parity: Parity::Odd,
            rts: Rts::FlowControl,
            cts: Cts::FlowControl,
            ..LineConfig::default()
        };

        let resolved = store
            .prepare_open(&OpenOptions::new(), &hardware)
            .resolve(&hardware);

        assert_eq!(resolved.baud_rate, 9600);
        assert_eq!(resolved.data_bits, DataBits::Eight);
        assert_eq!(resolved.stop_bits, StopBits::One);
        assert_eq!(resolved.parity, Parity::None);
        assert_eq!(resolved.flow_control(), Some(FlowControl::None));
        assert_eq!(resolved.rts, Rts::Off);
        assert_eq!(resolved.dtr, Dtr::Off);
    }

    #[test]
    fn test_open_options_win_over_setters() {
        let mut store = ConfigStore::new();
        store.update(|c| c.with_baud_rate(57600).with_data_bits(DataBits::Seven));

        let desired = store.prepare_open(
            &OpenOptions::new().baud_rate(115200),
            &LineConfig::default(),
        );
        assert_eq!(desired.baud_rate, Some(115200));
        assert_eq!(desired.data_bits, Some(DataBits::Seven));
    }

    #[test]
    fn test_flow_control_none_releases_flow_pins() {
        let baseline = LineConfig {
            rts: Rts::FlowControl,
            cts: Cts::FlowControl,
            ..LineConfig::default()
        };
        let pending = PendingConfig::default().with_flow_control(FlowControl::None, Some(&baseline));

        assert_eq!(pending.rts, Some(Rts::On));
        assert_eq!(pending.cts, Some(Cts::Ignore));
        assert_eq!(pending.dtr, None);
        assert_eq!(pending.xon_xoff, Some(XonXoff::Disabled));
    }

    #[test]
    fn test_flow_control_dtr_dsr() {
        let pending = PendingConfig::default()
            .with_rts(Rts::Off)
            .with_flow_control(FlowControl::DtrDsr, None);
        let line = pending.resolve(&LineConfig::default());

        assert_eq!(line.rts, Rts::Off);
        assert_eq!(line.dtr, Dtr::FlowControl);
        assert_eq!(line.dsr, Dsr::FlowControl);
        assert_eq!(line.flow_control(), Some(FlowControl::DtrDsr));
    }

    #[test]
    fn test_commit_records_effective_values() {
        let (device, handle) = mock_handle();
        device.set_uart_clock(Some(3_000_000));

        let mut store = ConfigStore::new();
        store.update(|c| c.with_baud_rate(115200));
        let applied = store.commit(handle.as_ref(), &LineConfig::default()).unwrap();

        assert_eq!(applied.baud_rate, 115384);
        assert_eq!(store.desired().baud_rate, Some(115200));
        assert_eq!(device.set_config_calls(), 1);
    }

    #[test]
    fn test_failed_commit_leaves_applied_untouched() {
        let (device, handle) = mock_handle();
        let mut store = ConfigStore::new();
        let first = store.commit(handle.as_ref(), &LineConfig::default()).unwrap();

        device.fail_set_config(Some(StatusCode::SUPP));
        store.update(|c| c.with_parity(Parity::Mark));
        let err = store.commit(handle.as_ref(), first.line()).unwrap_err();

        assert_eq!(err, PortError::Unsupported);
        assert_eq!(store.applied(), Some(first));
    }

    #[test]
    fn test_readback_failure_records_request() {
        let (device, handle) = mock_handle();
        device.fail_get_config(Some(StatusCode::FAIL));

        let mut store = ConfigStore::new();
        store.update(|c| c.with_stop_bits(StopBits::Two));
        let applied = store.commit(handle.as_ref(), &LineConfig::default()).unwrap();

        assert_eq!(applied.stop_bits, StopBits::Two);
    }

    #[test]
    fn test_rejected_open_snapshot_is_not_kept() {
        let (device, handle) = mock_handle();
        let hardware = LineConfig::default();
        let mut store = ConfigStore::new();

        device.fail_set_config(Some(StatusCode::FAIL));
        let attempt = store.prepare_open(
            &OpenOptions::new()
                .baud_rate(115200)
                .flow_control(FlowControl::RtsCts),
            &hardware,
        );
        assert!(store.commit_with(handle.as_ref(), attempt, &hardware).is_err());
        assert_eq!(store.desired(), PendingConfig::default());

        device.fail_set_config(None);
        let retry = store.prepare_open(&OpenOptions::new(), &hardware);
        let applied = store.commit_with(handle.as_ref(), retry, &hardware).unwrap();
        assert_eq!(applied.baud_rate, 9600);
        assert_eq!(applied.flow_control(), Some(FlowControl::None));
        assert_eq!(store.desired(), retry);
    }

    #[test]
    fn test_release_clears_snapshots() {
        let (_device, handle) = mock_handle();
        let mut store = ConfigStore::new();
        store.update(|c| c.with_baud_rate(4800));
        store.commit(handle.as_ref(), &LineConfig::default()).unwrap();

        store.release();
        assert_eq!(store.desired(), PendingConfig::default());
        assert_eq!(store.applied(), None);
    }
}
