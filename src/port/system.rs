//! Operating system transport provider.
//!
//! Wraps the `serialport` crate. The reading and writing halves of a device
//! are separate clones of the same OS handle, so a blocked reader never
//! holds up a writer. `serialport` cannot read modem control pins back, so
//! the pin modes last written are cached alongside the handle.

use super::config_store::DEFAULT_BAUD_RATE;
use super::settings::{
    Cts, DataBits, Dsr, Dtr, LineConfig, Parity, Rts, StopBits, XonXoff,
};
use super::status::{ProviderResult, StatusCode};
use super::traits::{
    DeviceHandle, DeviceInfo, FlushSelector, OpenMode, RawHandle, TransportProvider, UsbInfo,
};
use parking_lot::Mutex;
use serialport::{ClearBuffer, SerialPort, SerialPortType};
use std::io::{self, Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;

/// How long an unbounded transfer waits before checking for a close.
const POLL_SLICE: Duration = Duration::from_millis(100);

/// Transport provider for the serial ports of this machine.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProvider;

impl SystemProvider {
    pub fn new() -> Self {
        Self
    }
}

impl TransportProvider for SystemProvider {
    fn enumerate_ports(&self) -> ProviderResult<Vec<DeviceInfo>> {
        let ports = serialport::available_ports().map_err(|e| serial_status(&e))?;
        Ok(ports.into_iter().map(device_info).collect())
    }

    fn resolve_port(&self, name: &str) -> ProviderResult<Option<DeviceInfo>> {
        let listed = self.enumerate_ports();
        if let Ok(devices) = &listed {
            if let Some(device) = devices.iter().find(|device| device.name == name) {
                return Ok(Some(device.clone()));
            }
        }
        fallback_device(name, listed.map(|_| ()))
    }

    fn open(&self, device: &DeviceInfo, mode: OpenMode) -> ProviderResult<Box<dyn DeviceHandle>> {
        let builder = serialport::new(&device.name, DEFAULT_BAUD_RATE);
        let (reader, raw) = open_native(builder).map_err(|e| {
            debug!(port = %device.name, error = %e, "open failed");
            serial_status(&e)
        })?;
        let writer = reader.try_clone().map_err(|e| serial_status(&e))?;
        let pins = PinCache::from_port(reader.as_ref());

        Ok(Box::new(SystemHandle {
            name: device.name.clone(),
            mode,
            raw,
            closed: AtomicBool::new(false),
            reader: Mutex::new(Some(reader)),
            writer: Mutex::new(Some(writer)),
            pins: Mutex::new(pins),
        }))
    }
}

/// Pseudo-terminals and some virtual ports are never enumerated but can
/// still be opened by path. An enumeration failure is only reported when the
/// path does not exist either.
fn fallback_device(name: &str, listed: ProviderResult<()>) -> ProviderResult<Option<DeviceInfo>> {
    if cfg!(windows) || Path::new(name).exists() {
        return Ok(Some(DeviceInfo::native(name, "Serial port")));
    }
    listed.map(|()| None)
}

#[cfg(unix)]
fn open_native(
    builder: serialport::SerialPortBuilder,
) -> serialport::Result<(Box<dyn SerialPort>, RawHandle)> {
    use std::os::unix::io::AsRawFd;

    let port = builder.open_native()?;
    let raw = port.as_raw_fd() as RawHandle;
    Ok((Box::new(port), raw))
}

#[cfg(windows)]
fn open_native(
    builder: serialport::SerialPortBuilder,
) -> serialport::Result<(Box<dyn SerialPort>, RawHandle)> {
    use std::os::windows::io::AsRawHandle;

    let port = builder.open_native()?;
    let raw = port.as_raw_handle() as RawHandle;
    Ok((Box::new(port), raw))
}

fn device_info(port: serialport::SerialPortInfo) -> DeviceInfo {
    match port.port_type {
        SerialPortType::UsbPort(usb) => {
            let description = usb
                .product
                .clone()
                .unwrap_or_else(|| "USB serial port".to_string());
            DeviceInfo::usb(
                port.port_name,
                description,
                UsbInfo {
                    vid: usb.vid,
                    pid: usb.pid,
                    manufacturer: usb.manufacturer.unwrap_or_default(),
                    product: usb.product.unwrap_or_default(),
                    serial_number: usb.serial_number.unwrap_or_default(),
                    ..UsbInfo::default()
                },
            )
        }
        SerialPortType::BluetoothPort => {
            DeviceInfo::bluetooth(port.port_name, "Bluetooth serial port", "")
        }
        SerialPortType::PciPort => DeviceInfo::native(port.port_name, "PCI serial port"),
        SerialPortType::Unknown => DeviceInfo::native(port.port_name, "Serial port"),
    }
}

fn serial_status(err: &serialport::Error) -> StatusCode {
    match err.kind() {
        serialport::ErrorKind::InvalidInput => StatusCode::ARG,
        serialport::ErrorKind::Io(kind) => io_kind_status(kind),
        _ => StatusCode::FAIL,
    }
}

fn io_status(err: &io::Error) -> StatusCode {
    io_kind_status(err.kind())
}

fn io_kind_status(kind: io::ErrorKind) -> StatusCode {
    match kind {
        io::ErrorKind::InvalidInput => StatusCode::ARG,
        io::ErrorKind::OutOfMemory => StatusCode::MEM,
        io::ErrorKind::Unsupported => StatusCode::SUPP,
        _ => StatusCode::FAIL,
    }
}

fn is_timeout(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

/// Pin modes last written to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PinCache {
    rts: Rts,
    cts: Cts,
    dtr: Dtr,
    dsr: Dsr,
    xon_xoff: XonXoff,
}

impl PinCache {
    fn from_port(port: &dyn SerialPort) -> Self {
        let flow = port.flow_control().unwrap_or(serialport::FlowControl::None);
        let hardware = flow == serialport::FlowControl::Hardware;
        Self {
            rts: if hardware { Rts::FlowControl } else { Rts::On },
            cts: if hardware { Cts::FlowControl } else { Cts::Ignore },
            dtr: Dtr::On,
            dsr: Dsr::Ignore,
            xon_xoff: if flow == serialport::FlowControl::Software {
                XonXoff::InOut
            } else {
                XonXoff::Disabled
            },
        }
    }
}

/// Translate a pin combination into the flow control modes `serialport`
/// can express.
fn serial_flow_control(config: &LineConfig) -> ProviderResult<serialport::FlowControl> {
    let rts_flow = config.rts == Rts::FlowControl;
    let cts_flow = config.cts == Cts::FlowControl;
    let dtr_flow = config.dtr == Dtr::FlowControl || config.dsr == Dsr::FlowControl;

    match (rts_flow, cts_flow, dtr_flow, config.xon_xoff) {
        (false, false, false, XonXoff::Disabled) => Ok(serialport::FlowControl::None),
        (false, false, false, XonXoff::InOut) => Ok(serialport::FlowControl::Software),
        (true, true, false, XonXoff::Disabled) => Ok(serialport::FlowControl::Hardware),
        _ => Err(StatusCode::SUPP),
    }
}

fn serial_parity(parity: Parity) -> ProviderResult<serialport::Parity> {
    match parity {
        Parity::None => Ok(serialport::Parity::None),
        Parity::Odd => Ok(serialport::Parity::Odd),
        Parity::Even => Ok(serialport::Parity::Even),
        Parity::Mark | Parity::Space => Err(StatusCode::SUPP),
    }
}

fn serial_data_bits(data_bits: DataBits) -> serialport::DataBits {
    match data_bits {
        DataBits::Five => serialport::DataBits::Five,
        DataBits::Six => serialport::DataBits::Six,
        DataBits::Seven => serialport::DataBits::Seven,
        DataBits::Eight => serialport::DataBits::Eight,
    }
}

fn serial_stop_bits(stop_bits: StopBits) -> serialport::StopBits {
    match stop_bits {
        StopBits::One => serialport::StopBits::One,
        StopBits::Two => serialport::StopBits::Two,
    }
}

/// Open device backed by `serialport`.
struct SystemHandle {
    name: String,
    mode: OpenMode,
    raw: RawHandle,
    closed: AtomicBool,
    reader: Mutex<Option<Box<dyn SerialPort>>>,
    writer: Mutex<Option<Box<dyn SerialPort>>>,
    pins: Mutex<PinCache>,
}

impl SystemHandle {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn with_reader<T>(
        &self,
        f: impl FnOnce(&mut dyn SerialPort) -> ProviderResult<T>,
    ) -> ProviderResult<T> {
        if !self.mode.can_read() {
            return Err(StatusCode::ARG);
        }
        match self.reader.lock().as_deref_mut() {
            Some(port) => f(port),
            None => Err(StatusCode::FAIL),
        }
    }

    /// The writing half, also used for configuration and queue queries.
    fn with_port<T>(
        &self,
        f: impl FnOnce(&mut dyn SerialPort) -> ProviderResult<T>,
    ) -> ProviderResult<T> {
        match self.writer.lock().as_deref_mut() {
            Some(port) => f(port),
            None => Err(StatusCode::FAIL),
        }
    }

    fn with_writer<T>(
        &self,
        f: impl FnOnce(&mut dyn SerialPort) -> ProviderResult<T>,
    ) -> ProviderResult<T> {
        if !self.mode.can_write() {
            return Err(StatusCode::ARG);
        }
        self.with_port(f)
    }

    /// One read attempt with `timeout`; a timeout reads zero bytes.
    fn read_once(&self, buffer: &mut [u8], timeout: Duration) -> ProviderResult<usize> {
        self.with_reader(|port| {
            port.set_timeout(timeout).map_err(|e| serial_status(&e))?;
            match port.read(buffer) {
                Ok(count) => Ok(count),
                Err(e) if is_timeout(&e) => Ok(0),
                Err(e) => Err(io_status(&e)),
            }
        })
    }

    /// One write attempt with `timeout`; a timeout writes zero bytes.
    fn write_once(&self, data: &[u8], timeout: Duration) -> ProviderResult<usize> {
        self.with_writer(|port| {
            port.set_timeout(timeout).map_err(|e| serial_status(&e))?;
            match port.write(data) {
                Ok(count) => Ok(count),
                Err(e) if is_timeout(&e) => Ok(0),
                Err(e) => Err(io_status(&e)),
            }
        })
    }
}

impl DeviceHandle for SystemHandle {
    fn close(&self) -> ProviderResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(StatusCode::FAIL);
        }
        let writer = self.writer.lock().take();
        let reader = self.reader.lock().take();
        drop(writer);
        drop(reader);
        debug!(port = %self.name, "device handle released");
        Ok(())
    }

    fn get_config(&self) -> ProviderResult<LineConfig> {
        let pins = *self.pins.lock();
        self.with_port(|port| {
            let status = |e: serialport::Error| serial_status(&e);
            let data_bits = match port.data_bits().map_err(status)? {
                serialport::DataBits::Five => DataBits::Five,
                serialport::DataBits::Six => DataBits::Six,
                serialport::DataBits::Seven => DataBits::Seven,
                serialport::DataBits::Eight => DataBits::Eight,
            };
            let parity = match port.parity().map_err(status)? {
                serialport::Parity::None => Parity::None,
                serialport::Parity::Odd => Parity::Odd,
                serialport::Parity::Even => Parity::Even,
            };
            let stop_bits = match port.stop_bits().map_err(status)? {
                serialport::StopBits::One => StopBits::One,
                serialport::StopBits::Two => StopBits::Two,
            };

            Ok(LineConfig {
                baud_rate: port.baud_rate().map_err(status)?,
                data_bits,
                parity,
                stop_bits,
                rts: pins.rts,
                cts: pins.cts,
                dtr: pins.dtr,
                dsr: pins.dsr,
                xon_xoff: pins.xon_xoff,
            })
        })
    }

    fn set_config(&self, config: &LineConfig) -> ProviderResult<()> {
        let flow = serial_flow_control(config)?;
        let parity = serial_parity(config.parity)?;

        self.with_port(|port| {
            let status = |e: serialport::Error| serial_status(&e);
            port.set_baud_rate(config.baud_rate).map_err(status)?;
            port.set_data_bits(serial_data_bits(config.data_bits))
                .map_err(status)?;
            port.set_parity(parity).map_err(status)?;
            port.set_stop_bits(serial_stop_bits(config.stop_bits))
                .map_err(status)?;
            port.set_flow_control(flow).map_err(status)?;

            match config.rts {
                Rts::Off => port.write_request_to_send(false).map_err(status)?,
                Rts::On => port.write_request_to_send(true).map_err(status)?,
                Rts::FlowControl => {}
            }
            match config.dtr {
                Dtr::Off => port.write_data_terminal_ready(false).map_err(status)?,
                Dtr::On => port.write_data_terminal_ready(true).map_err(status)?,
                Dtr::FlowControl => {}
            }
            Ok(())
        })?;

        *self.pins.lock() = PinCache {
            rts: config.rts,
            cts: config.cts,
            dtr: config.dtr,
            dsr: config.dsr,
            xon_xoff: config.xon_xoff,
        };
        Ok(())
    }

    fn blocking_read(&self, buffer: &mut [u8], timeout: Option<Duration>) -> ProviderResult<usize> {
        let Some(timeout) = timeout else {
            // Release the reader between slices so a close can get through.
            loop {
                if self.is_closed() {
                    return Err(StatusCode::FAIL);
                }
                let count = self.read_once(buffer, POLL_SLICE)?;
                if count > 0 {
                    return Ok(count);
                }
            }
        };

        let deadline = Instant::now() + timeout;
        let mut count = 0;
        while count < buffer.len() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            let n = self.read_once(&mut buffer[count..], remaining)?;
            if n == 0 {
                break;
            }
            count += n;
        }
        Ok(count)
    }

    fn nonblocking_read(&self, buffer: &mut [u8]) -> ProviderResult<usize> {
        self.read_once(buffer, Duration::ZERO)
    }

    fn blocking_write(&self, data: &[u8], timeout: Option<Duration>) -> ProviderResult<usize> {
        let deadline = timeout.map(|timeout| Instant::now() + timeout);
        let mut count = 0;
        while count < data.len() {
            if self.is_closed() {
                return Err(StatusCode::FAIL);
            }
            let slice = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        break;
                    }
                    remaining
                }
                None => POLL_SLICE,
            };
            let n = self.write_once(&data[count..], slice)?;
            if n == 0 && deadline.is_some() {
                break;
            }
            count += n;
        }
        Ok(count)
    }

    fn nonblocking_write(&self, data: &[u8]) -> ProviderResult<usize> {
        self.write_once(data, Duration::ZERO)
    }

    fn input_waiting(&self) -> ProviderResult<usize> {
        self.with_port(|port| {
            port.bytes_to_read()
                .map(|n| n as usize)
                .map_err(|e| serial_status(&e))
        })
    }

    fn output_waiting(&self) -> ProviderResult<usize> {
        self.with_port(|port| {
            port.bytes_to_write()
                .map(|n| n as usize)
                .map_err(|e| serial_status(&e))
        })
    }

    fn flush(&self, selector: FlushSelector) -> ProviderResult<()> {
        let buffer = match selector {
            FlushSelector::Input => ClearBuffer::Input,
            FlushSelector::Output => ClearBuffer::Output,
            FlushSelector::Both => ClearBuffer::All,
        };
        self.with_port(|port| port.clear(buffer).map_err(|e| serial_status(&e)))
    }

    fn drain(&self) -> ProviderResult<()> {
        self.with_writer(|port| port.flush().map_err(|e| io_status(&e)))
    }

    fn raw_handle(&self) -> ProviderResult<RawHandle> {
        if self.is_closed() {
            return Err(StatusCode::FAIL);
        }
        Ok(self.raw)
    }
}

impl std::fmt::Debug for SystemHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemHandle")
            .field("name", &self.name)
            .field("mode", &self.mode)
            .field("closed", &self.is_closed())
            .finish()
    }
}
