//! The serial port session.
//!
//! A [`Port`] is produced unopened by the [`PortRegistry`](super::PortRegistry)
//! and owns everything that belongs to one device: the provider record, the
//! lifecycle slot with the OS handle, the configuration store and one
//! deadline per direction. Dropping a `Port` frees it.

use super::config_store::{AppliedConfig, ConfigStore, PendingConfig};
use super::deadline::{TimeoutPolicy, TransferPolicy};
use super::error::{PortError, PortResult};
use super::lifecycle::{Lifecycle, LifecycleState};
use super::options::OpenOptions;
use super::settings::{
    Cts, DataBits, Dsr, Dtr, FlowControl, LineConfig, Parity, Rts, StopBits, XonXoff,
};
use super::status::{check, ProviderResult};
use super::traits::{
    DeviceHandle, DeviceInfo, FlushSelector, RawHandle, TransportKind, TransportProvider,
};
use parking_lot::Mutex;
use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace, warn};

/// Address of a port, its device name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PortAddr {
    name: String,
}

impl PortAddr {
    /// Network-style family name of the address.
    pub fn network(&self) -> &str {
        "serial"
    }
}

impl fmt::Display for PortAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    Read,
    Write,
}

impl Direction {
    fn operation(self) -> &'static str {
        match self {
            Self::Read => "read from",
            Self::Write => "write to",
        }
    }
}

/// Serial port session.
///
/// `Port` is `Send + Sync`: one thread may own the read path
/// ([`set_read_deadline`](Self::set_read_deadline) and [`read`](Self::read))
/// while another owns the write path. Configuration changes and
/// `close`/`free` from several threads at once need external ordering to be
/// meaningful, though they never corrupt the port or release the handle
/// twice.
pub struct Port {
    provider: Arc<dyn TransportProvider>,
    device: DeviceInfo,
    lifecycle: Lifecycle,
    config: Mutex<ConfigStore>,
    read_deadline: Mutex<Option<Instant>>,
    write_deadline: Mutex<Option<Instant>>,
    timeout_policy: Mutex<TimeoutPolicy>,
}

impl Port {
    pub(crate) fn new(provider: Arc<dyn TransportProvider>, device: DeviceInfo) -> Self {
        Self {
            lifecycle: Lifecycle::new(device.name.clone()),
            provider,
            device,
            config: Mutex::new(ConfigStore::new()),
            read_deadline: Mutex::new(None),
            write_deadline: Mutex::new(None),
            timeout_policy: Mutex::new(TimeoutPolicy::default()),
        }
    }

    // ========== Lifecycle ==========

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    /// Open the port and negotiate its configuration.
    ///
    /// Only a freshly created port can be opened. If anything fails after
    /// the device itself was opened, the handle is closed again before the
    /// error is returned.
    pub fn open(&self, options: &OpenOptions) -> PortResult<()> {
        let mode = options.mode.unwrap_or_default();

        self.lifecycle.open_with(|| {
            let handle: Arc<dyn DeviceHandle> =
                Arc::from(check(self.provider.open(&self.device, mode))?);

            match self.negotiate(handle.as_ref(), options) {
                Ok(applied) => {
                    debug!(port = %self.device.name, ?mode, config = ?applied.line(), "negotiated configuration");
                    if let Some(policy) = options.timeout_policy {
                        *self.timeout_policy.lock() = policy;
                    }
                    Ok(handle)
                }
                Err(err) => {
                    if let Err(code) = handle.close() {
                        warn!(port = %self.device.name, %code, "close after failed open also failed");
                    }
                    Err(err)
                }
            }
        })
    }

    fn negotiate(
        &self,
        handle: &dyn DeviceHandle,
        options: &OpenOptions,
    ) -> PortResult<AppliedConfig> {
        let hardware = check(handle.get_config())?;
        let mut store = self.config.lock();
        let desired = store.prepare_open(options, &hardware);
        store.commit_with(handle, desired, &hardware)
    }

    /// Close the port. Closing a port that is not open is a no-op.
    pub fn close(&self) -> PortResult<()> {
        self.lifecycle.close()
    }

    /// Release the handle (closing it first if needed) and the configuration
    /// snapshots. Idempotent; also run on drop.
    pub fn free(&self) -> PortResult<()> {
        let result = self.lifecycle.free();
        self.config.lock().release();
        result
    }

    // ========== Metadata ==========

    fn device(&self, operation: &'static str) -> PortResult<&DeviceInfo> {
        self.lifecycle.ensure_live(operation)?;
        Ok(&self.device)
    }

    /// Device path or name.
    pub fn name(&self) -> PortResult<&str> {
        Ok(&self.device("get the name of")?.name)
    }

    /// Description to present to an end user.
    pub fn description(&self) -> PortResult<&str> {
        Ok(&self.device("describe")?.description)
    }

    pub fn transport(&self) -> PortResult<TransportKind> {
        Ok(self.device("get the transport of")?.transport)
    }

    /// Copy of the provider's device record.
    pub fn info(&self) -> PortResult<DeviceInfo> {
        Ok(self.device("inspect")?.clone())
    }

    /// USB bus number and address; zero when not a USB port.
    pub fn usb_bus_address(&self) -> PortResult<(u8, u8)> {
        let usb = self.device("query USB metadata of")?.usb_or_default();
        Ok((usb.bus, usb.address))
    }

    /// USB vendor and product IDs; zero when not a USB port.
    pub fn usb_vid_pid(&self) -> PortResult<(u16, u16)> {
        let usb = self.device("query USB metadata of")?.usb_or_default();
        Ok((usb.vid, usb.pid))
    }

    pub fn usb_manufacturer(&self) -> PortResult<String> {
        Ok(self.device("query USB metadata of")?.usb_or_default().manufacturer)
    }

    pub fn usb_product(&self) -> PortResult<String> {
        Ok(self.device("query USB metadata of")?.usb_or_default().product)
    }

    pub fn usb_serial_number(&self) -> PortResult<String> {
        Ok(self.device("query USB metadata of")?.usb_or_default().serial_number)
    }

    /// MAC address of a Bluetooth adapter; empty when not a Bluetooth port.
    pub fn bluetooth_address(&self) -> PortResult<String> {
        Ok(self
            .device("query Bluetooth metadata of")?
            .bluetooth_address_or_default())
    }

    pub fn addr(&self) -> PortResult<PortAddr> {
        Ok(PortAddr {
            name: self.device("get the address of")?.name.clone(),
        })
    }

    /// Platform handle of the open device.
    pub fn raw_handle(&self) -> PortResult<RawHandle> {
        check(self.lifecycle.handle("get the handle of")?.raw_handle())
    }

    // ========== Configuration: desired snapshot ==========

    fn update(
        &self,
        operation: &'static str,
        f: impl FnOnce(PendingConfig) -> PendingConfig,
    ) -> PortResult<()> {
        self.lifecycle.ensure_live(operation)?;
        self.config.lock().update(f);
        Ok(())
    }

    /// Set the baud rate. Takes effect on the next [`apply_config`](Self::apply_config).
    pub fn set_baud_rate(&self, baud_rate: u32) -> PortResult<()> {
        if baud_rate == 0 {
            return Err(PortError::invalid_argument("baud rate must be non-zero"));
        }
        self.update("set the baud rate of", |c| c.with_baud_rate(baud_rate))
    }

    pub fn set_data_bits(&self, data_bits: DataBits) -> PortResult<()> {
        self.update("set the data bits of", |c| c.with_data_bits(data_bits))
    }

    pub fn set_parity(&self, parity: Parity) -> PortResult<()> {
        self.update("set the parity of", |c| c.with_parity(parity))
    }

    pub fn set_stop_bits(&self, stop_bits: StopBits) -> PortResult<()> {
        self.update("set the stop bits of", |c| c.with_stop_bits(stop_bits))
    }

    pub fn set_rts(&self, rts: Rts) -> PortResult<()> {
        self.update("set RTS on", |c| c.with_rts(rts))
    }

    pub fn set_cts(&self, cts: Cts) -> PortResult<()> {
        self.update("set CTS on", |c| c.with_cts(cts))
    }

    pub fn set_dtr(&self, dtr: Dtr) -> PortResult<()> {
        self.update("set DTR on", |c| c.with_dtr(dtr))
    }

    pub fn set_dsr(&self, dsr: Dsr) -> PortResult<()> {
        self.update("set DSR on", |c| c.with_dsr(dsr))
    }

    pub fn set_xon_xoff(&self, xon_xoff: XonXoff) -> PortResult<()> {
        self.update("set XON/XOFF on", |c| c.with_xon_xoff(xon_xoff))
    }

    /// Set the pins and XON/XOFF mode for a standard flow control combination.
    pub fn set_flow_control(&self, flow: FlowControl) -> PortResult<()> {
        self.lifecycle.ensure_live("set the flow control of")?;
        self.config.lock().update_flow_control(flow);
        Ok(())
    }

    /// The desired snapshot, including values not yet applied.
    pub fn pending_config(&self) -> PortResult<PendingConfig> {
        self.lifecycle.ensure_live("inspect the configuration of")?;
        Ok(self.config.lock().desired())
    }

    /// Commit the desired configuration to hardware in one provider call.
    ///
    /// On success the applied snapshot holds the values read back from the
    /// hardware, which may differ from the request (baud rates are rounded
    /// by most UARTs). On failure the applied snapshot is unchanged.
    pub fn apply_config(&self) -> PortResult<AppliedConfig> {
        let handle = self.lifecycle.handle("configure")?;
        let mut store = self.config.lock();
        let baseline = match store.applied() {
            Some(applied) => *applied.line(),
            None => check(handle.get_config())?,
        };
        let applied = store.commit(handle.as_ref(), &baseline)?;
        debug!(port = %self.device.name, config = ?applied.line(), "configuration applied");
        Ok(applied)
    }

    /// Apply 8 data bits, no parity, 1 stop bit and no flow control.
    ///
    /// Baud rate is kept. RTS and DTR keep their levels unless they were
    /// being used for flow control, in which case they are turned on.
    pub fn apply_raw_config(&self) -> PortResult<AppliedConfig> {
        self.lifecycle.ensure_open("configure")?;
        {
            let mut store = self.config.lock();
            store.update(|c| {
                c.with_data_bits(DataBits::Eight)
                    .with_parity(Parity::None)
                    .with_stop_bits(StopBits::One)
            });
            store.update_flow_control(FlowControl::None);
        }
        self.apply_config()
    }

    // ========== Configuration: applied snapshot ==========

    fn applied(&self, operation: &'static str) -> PortResult<LineConfig> {
        self.lifecycle.ensure_open(operation)?;
        self.config
            .lock()
            .applied()
            .map(|applied| *applied.line())
            .ok_or(PortError::invalid_state(operation, LifecycleState::Created))
    }

    /// The configuration last applied to hardware.
    pub fn config(&self) -> PortResult<LineConfig> {
        self.applied("read the configuration of")
    }

    /// Effective baud rate, as last reported by the hardware.
    pub fn baud_rate(&self) -> PortResult<u32> {
        Ok(self.applied("read the baud rate of")?.baud_rate)
    }

    pub fn data_bits(&self) -> PortResult<DataBits> {
        Ok(self.applied("read the data bits of")?.data_bits)
    }

    pub fn parity(&self) -> PortResult<Parity> {
        Ok(self.applied("read the parity of")?.parity)
    }

    pub fn stop_bits(&self) -> PortResult<StopBits> {
        Ok(self.applied("read the stop bits of")?.stop_bits)
    }

    pub fn rts(&self) -> PortResult<Rts> {
        Ok(self.applied("read RTS of")?.rts)
    }

    pub fn cts(&self) -> PortResult<Cts> {
        Ok(self.applied("read CTS of")?.cts)
    }

    pub fn dtr(&self) -> PortResult<Dtr> {
        Ok(self.applied("read DTR of")?.dtr)
    }

    pub fn dsr(&self) -> PortResult<Dsr> {
        Ok(self.applied("read DSR of")?.dsr)
    }

    pub fn xon_xoff(&self) -> PortResult<XonXoff> {
        Ok(self.applied("read XON/XOFF of")?.xon_xoff)
    }

    /// The standard flow control combination the applied pins form, or
    /// `None` for a custom combination.
    pub fn flow_control(&self) -> PortResult<Option<FlowControl>> {
        Ok(self.applied("read the flow control of")?.flow_control())
    }

    // ========== Deadlines ==========

    /// Set the read deadline; `None` blocks indefinitely. Affects only reads
    /// issued after this call.
    pub fn set_read_deadline(&self, deadline: Option<Instant>) -> PortResult<()> {
        self.lifecycle.ensure_live("set the read deadline of")?;
        *self.read_deadline.lock() = deadline;
        Ok(())
    }

    /// Set the write deadline; `None` blocks indefinitely.
    pub fn set_write_deadline(&self, deadline: Option<Instant>) -> PortResult<()> {
        self.lifecycle.ensure_live("set the write deadline of")?;
        *self.write_deadline.lock() = deadline;
        Ok(())
    }

    /// Set both deadlines.
    pub fn set_deadline(&self, deadline: Option<Instant>) -> PortResult<()> {
        self.set_read_deadline(deadline)?;
        self.set_write_deadline(deadline)
    }

    pub fn read_deadline(&self) -> Option<Instant> {
        *self.read_deadline.lock()
    }

    pub fn write_deadline(&self) -> Option<Instant> {
        *self.write_deadline.lock()
    }

    pub fn timeout_policy(&self) -> TimeoutPolicy {
        *self.timeout_policy.lock()
    }

    /// Choose how bounded transfers that move no bytes are reported.
    pub fn set_timeout_policy(&self, policy: TimeoutPolicy) {
        *self.timeout_policy.lock() = policy;
    }

    // ========== I/O ==========

    /// Read into `buffer`, governed by the read deadline.
    ///
    /// Returns the number of bytes read, which may be less than the buffer
    /// length. Callers needing an exact length must loop.
    pub fn read(&self, buffer: &mut [u8]) -> PortResult<usize> {
        let handle = self.lifecycle.handle(Direction::Read.operation())?;
        if buffer.is_empty() {
            return Ok(0);
        }

        let policy = TransferPolicy::from_deadline(self.read_deadline(), Instant::now());
        let result = match policy {
            TransferPolicy::Unbounded => handle.blocking_read(buffer, None),
            TransferPolicy::Immediate => handle.nonblocking_read(buffer),
            TransferPolicy::Bounded(timeout) => handle.blocking_read(buffer, Some(timeout)),
        };
        self.finish(Direction::Read, policy, result)
    }

    /// Write from `data`, governed by the write deadline.
    ///
    /// Returns the number of bytes written, which may be less than
    /// `data.len()` when a deadline is set.
    pub fn write(&self, data: &[u8]) -> PortResult<usize> {
        let handle = self.lifecycle.handle(Direction::Write.operation())?;
        if data.is_empty() {
            return Ok(0);
        }

        let policy = TransferPolicy::from_deadline(self.write_deadline(), Instant::now());
        let result = match policy {
            TransferPolicy::Unbounded => handle.blocking_write(data, None),
            TransferPolicy::Immediate => handle.nonblocking_write(data),
            TransferPolicy::Bounded(timeout) => handle.blocking_write(data, Some(timeout)),
        };
        self.finish(Direction::Write, policy, result)
    }

    /// Write the bytes of `s`.
    pub fn write_str(&self, s: &str) -> PortResult<usize> {
        self.write(s.as_bytes())
    }

    fn finish(
        &self,
        direction: Direction,
        policy: TransferPolicy,
        result: ProviderResult<usize>,
    ) -> PortResult<usize> {
        let count = check(result)?;
        trace!(port = %self.device.name, ?direction, ?policy, count, "transfer complete");

        match (policy, count, self.timeout_policy()) {
            (TransferPolicy::Bounded(timeout), 0, TimeoutPolicy::Error) => {
                Err(PortError::Timeout(timeout))
            }
            _ => Ok(count),
        }
    }

    /// Bytes waiting in the input buffer.
    pub fn input_waiting(&self) -> PortResult<usize> {
        check(self.lifecycle.handle("query")?.input_waiting())
    }

    /// Bytes waiting in the output buffer.
    pub fn output_waiting(&self) -> PortResult<usize> {
        check(self.lifecycle.handle("query")?.output_waiting())
    }

    /// Discard both input and output buffers.
    pub fn flush(&self) -> PortResult<()> {
        self.flush_buffers(FlushSelector::Both)
    }

    /// Discard received data not yet read.
    pub fn flush_input(&self) -> PortResult<()> {
        self.flush_buffers(FlushSelector::Input)
    }

    /// Discard written data not yet transmitted.
    pub fn flush_output(&self) -> PortResult<()> {
        self.flush_buffers(FlushSelector::Output)
    }

    /// Alias for [`flush`](Self::flush).
    pub fn sync(&self) -> PortResult<()> {
        self.flush()
    }

    fn flush_buffers(&self, selector: FlushSelector) -> PortResult<()> {
        check(self.lifecycle.handle("flush")?.flush(selector))
    }

    /// Block until all written data has been transmitted.
    pub fn drain(&self) -> PortResult<()> {
        check(self.lifecycle.handle("drain")?.drain())
    }
}

impl Drop for Port {
    fn drop(&mut self) {
        if let Err(err) = self.free() {
            warn!(port = %self.device.name, error = %err, "error releasing port on drop");
        }
    }
}

impl fmt::Debug for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Port")
            .field("name", &self.device.name)
            .field("transport", &self.device.transport)
            .field("state", &self.state())
            .finish()
    }
}

impl io::Read for Port {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Port::read(self, buf).map_err(io::Error::from)
    }
}

impl io::Read for &Port {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Port::read(self, buf).map_err(io::Error::from)
    }
}

/// `io::Write::flush` drains the output; it does not discard anything.
impl io::Write for Port {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Port::write(self, buf).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.drain().map_err(io::Error::from)
    }
}

impl io::Write for &Port {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Port::write(self, buf).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.drain().map_err(io::Error::from)
    }
}
