//! Transport provider contract.
//!
//! The session core never talks to an operating system directly. It consumes
//! a [`TransportProvider`] for discovery and opening, and the
//! [`DeviceHandle`] it hands back for everything done on an open device.
//! Real hardware ([`super::SystemProvider`]) and the in-memory mock
//! ([`super::MockProvider`]) implement the same pair of traits.

use super::settings::LineConfig;
use super::status::ProviderResult;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Platform handle of an open device (a file descriptor on Unix, a `HANDLE`
/// on Windows).
pub type RawHandle = i64;

/// Kind of transport a serial port sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// Native platform serial port.
    #[default]
    Native,
    /// USB serial port adapter.
    Usb,
    /// Bluetooth serial port adapter.
    Bluetooth,
}

/// USB adapter metadata.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UsbInfo {
    pub bus: u8,
    pub address: u8,
    pub vid: u16,
    pub pid: u16,
    pub manufacturer: String,
    pub product: String,
    pub serial_number: String,
}

/// Provider-level record describing one device.
///
/// Cloning produces an independent copy; two records naming the same
/// physical device never alias.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Device path or name, the port's identity.
    pub name: String,
    /// Free-form description to present to an end user.
    pub description: String,
    pub transport: TransportKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usb: Option<UsbInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bluetooth_address: Option<String>,
}

impl DeviceInfo {
    pub fn native(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            ..Self::default()
        }
    }

    pub fn usb(name: impl Into<String>, description: impl Into<String>, usb: UsbInfo) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            transport: TransportKind::Usb,
            usb: Some(usb),
            bluetooth_address: None,
        }
    }

    pub fn bluetooth(
        name: impl Into<String>,
        description: impl Into<String>,
        address: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            transport: TransportKind::Bluetooth,
            usb: None,
            bluetooth_address: Some(address.into()),
        }
    }

    /// USB metadata, or an all-empty record when the port is not on USB.
    pub fn usb_or_default(&self) -> UsbInfo {
        match (&self.transport, &self.usb) {
            (TransportKind::Usb, Some(usb)) => usb.clone(),
            _ => UsbInfo::default(),
        }
    }

    /// Bluetooth address, or an empty string when the port is not Bluetooth.
    pub fn bluetooth_address_or_default(&self) -> String {
        match (&self.transport, &self.bluetooth_address) {
            (TransportKind::Bluetooth, Some(address)) => address.clone(),
            _ => String::new(),
        }
    }
}

/// Access mode a port is opened with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpenMode {
    Read,
    Write,
    #[default]
    ReadWrite,
}

impl OpenMode {
    pub fn can_read(self) -> bool {
        matches!(self, Self::Read | Self::ReadWrite)
    }

    pub fn can_write(self) -> bool {
        matches!(self, Self::Write | Self::ReadWrite)
    }
}

/// Buffer selection for [`DeviceHandle::flush`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlushSelector {
    Input,
    Output,
    Both,
}

/// Discovery and opening of devices.
pub trait TransportProvider: Send + Sync + std::fmt::Debug {
    /// List every device the system reports, in provider order.
    fn enumerate_ports(&self) -> ProviderResult<Vec<DeviceInfo>>;

    /// Look up a single device by name. `Ok(None)` when it does not exist.
    fn resolve_port(&self, name: &str) -> ProviderResult<Option<DeviceInfo>>;

    /// Open the device and return the handle that owns it.
    fn open(&self, device: &DeviceInfo, mode: OpenMode) -> ProviderResult<Box<dyn DeviceHandle>>;
}

/// Operations on an open device.
///
/// Handles are shared between a reading and a writing thread, so every
/// method takes `&self`. `close` must be safe to call while a transfer is in
/// flight on another thread.
pub trait DeviceHandle: Send + Sync + std::fmt::Debug {
    /// Release the OS handle.
    fn close(&self) -> ProviderResult<()>;

    /// Read the configuration the hardware currently holds.
    fn get_config(&self) -> ProviderResult<LineConfig>;

    /// Commit a complete configuration in one call.
    fn set_config(&self, config: &LineConfig) -> ProviderResult<()>;

    /// Read, blocking until the buffer is filled or `timeout` elapses.
    ///
    /// With `timeout == None` the call blocks until at least one byte
    /// arrives or the device fails.
    fn blocking_read(&self, buffer: &mut [u8], timeout: Option<Duration>) -> ProviderResult<usize>;

    /// Read whatever is available right now.
    fn nonblocking_read(&self, buffer: &mut [u8]) -> ProviderResult<usize>;

    /// Write, blocking until everything is queued or `timeout` elapses.
    ///
    /// With `timeout == None` the call blocks until the whole buffer is
    /// accepted or the device fails.
    fn blocking_write(&self, data: &[u8], timeout: Option<Duration>) -> ProviderResult<usize>;

    /// Write as much as the device accepts right now.
    fn nonblocking_write(&self, data: &[u8]) -> ProviderResult<usize>;

    /// Bytes waiting in the input buffer.
    fn input_waiting(&self) -> ProviderResult<usize>;

    /// Bytes waiting in the output buffer.
    fn output_waiting(&self) -> ProviderResult<usize>;

    /// Discard buffered data.
    fn flush(&self, selector: FlushSelector) -> ProviderResult<()>;

    /// Block until all queued output has been transmitted.
    fn drain(&self) -> ProviderResult<()>;

    /// Platform handle of the open device.
    fn raw_handle(&self) -> ProviderResult<RawHandle>;
}
