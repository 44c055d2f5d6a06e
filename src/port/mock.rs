//! Mock transport provider for testing.
//!
//! Provides a `MockProvider` that simulates a set of serial devices without
//! requiring actual hardware. Each [`MockDevice`] is a cheap clone over shared
//! state, so a test can keep one to feed input and inspect what the session
//! core did to the "hardware" while the port owns the open handle.

use super::deadline::deadline_after;
use super::registry::PortRegistry;
use super::settings::LineConfig;
use super::status::{ProviderResult, StatusCode};
use super::traits::{
    DeviceHandle, DeviceInfo, FlushSelector, OpenMode, RawHandle, TransportProvider,
};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// A provider primitive invoked by the session core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferCall {
    BlockingRead(Option<Duration>),
    NonblockingRead,
    BlockingWrite(Option<Duration>),
    NonblockingWrite,
}

#[derive(Debug, Default)]
struct DeviceState {
    /// Configuration the simulated hardware holds.
    hardware: LineConfig,
    /// Bytes waiting to be read.
    rx: VecDeque<u8>,
    /// Everything written, in order.
    tx: Vec<u8>,
    /// Bytes accepted per write; `None` accepts everything.
    write_capacity: Option<usize>,
    output_waiting: usize,
    /// UART reference clock used to round baud rates.
    uart_clock: Option<u32>,
    fail_set_config: Option<StatusCode>,
    fail_get_config: Option<StatusCode>,
    fail_next_transfer: Option<StatusCode>,
    open: bool,
    open_count: usize,
    close_count: usize,
    double_close: bool,
    set_config_calls: usize,
    transfers: Vec<TransferCall>,
    flushes: Vec<FlushSelector>,
    drains: usize,
}

#[derive(Debug, Default)]
struct DeviceShared {
    state: Mutex<DeviceState>,
    changed: Condvar,
}

/// A simulated serial device.
///
/// # Example
/// ```
/// use serial_session::port::{MockProvider, OpenOptions};
///
/// let provider = MockProvider::with_devices(&["MOCK0"]);
/// let device = provider.device("MOCK0").unwrap();
/// device.enqueue_read(b"OK\r\n");
///
/// let port = provider.registry().open("MOCK0", &OpenOptions::new()).unwrap();
/// let mut buffer = [0u8; 4];
/// assert_eq!(port.read(&mut buffer).unwrap(), 4);
/// assert_eq!(&buffer, b"OK\r\n");
/// ```
#[derive(Clone, Debug)]
pub struct MockDevice {
    info: DeviceInfo,
    shared: Arc<DeviceShared>,
}

impl MockDevice {
    pub fn new(info: DeviceInfo) -> Self {
        Self {
            info,
            shared: Arc::new(DeviceShared::default()),
        }
    }

    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    /// Open the device directly, bypassing a provider.
    pub fn open_handle(&self, mode: OpenMode) -> Box<dyn DeviceHandle> {
        let mut state = self.shared.state.lock();
        state.open = true;
        state.open_count += 1;
        Box::new(MockHandle {
            device: self.clone(),
            mode,
        })
    }

    /// Enqueue bytes to be returned by subsequent reads and wake blocked
    /// readers.
    pub fn enqueue_read(&self, data: &[u8]) {
        self.shared.state.lock().rx.extend(data);
        self.shared.changed.notify_all();
    }

    /// Get a copy of all data written to the device.
    pub fn written(&self) -> Vec<u8> {
        self.shared.state.lock().tx.clone()
    }

    pub fn hardware_config(&self) -> LineConfig {
        self.shared.state.lock().hardware
    }

    pub fn set_hardware_config(&self, config: LineConfig) {
        self.shared.state.lock().hardware = config;
    }

    /// Round requested baud rates to what a UART with this clock can hit.
    pub fn set_uart_clock(&self, clock: Option<u32>) {
        self.shared.state.lock().uart_clock = clock;
    }

    pub fn fail_set_config(&self, code: Option<StatusCode>) {
        self.shared.state.lock().fail_set_config = code;
    }

    pub fn fail_get_config(&self, code: Option<StatusCode>) {
        self.shared.state.lock().fail_get_config = code;
    }

    /// Make the next read or write fail with `code`, waking blocked callers.
    pub fn fail_next_transfer(&self, code: StatusCode) {
        self.shared.state.lock().fail_next_transfer = Some(code);
        self.shared.changed.notify_all();
    }

    /// Limit how many bytes a single write accepts.
    pub fn set_write_capacity(&self, capacity: Option<usize>) {
        self.shared.state.lock().write_capacity = capacity;
    }

    pub fn set_output_waiting(&self, count: usize) {
        self.shared.state.lock().output_waiting = count;
    }

    pub fn is_open(&self) -> bool {
        self.shared.state.lock().open
    }

    pub fn open_count(&self) -> usize {
        self.shared.state.lock().open_count
    }

    pub fn close_count(&self) -> usize {
        self.shared.state.lock().close_count
    }

    /// Whether a handle was ever closed while the device was not open.
    pub fn double_close_detected(&self) -> bool {
        self.shared.state.lock().double_close
    }

    pub fn set_config_calls(&self) -> usize {
        self.shared.state.lock().set_config_calls
    }

    /// Every transfer primitive invoked, in order.
    pub fn transfers(&self) -> Vec<TransferCall> {
        self.shared.state.lock().transfers.clone()
    }

    pub fn flushes(&self) -> Vec<FlushSelector> {
        self.shared.state.lock().flushes.clone()
    }

    pub fn drain_count(&self) -> usize {
        self.shared.state.lock().drains
    }
}

#[derive(Debug)]
struct MockHandle {
    device: MockDevice,
    mode: OpenMode,
}

impl MockHandle {
    fn shared(&self) -> &DeviceShared {
        &self.device.shared
    }

    /// Lock the device state, failing if it has been closed.
    fn live(&self) -> ProviderResult<parking_lot::MutexGuard<'_, DeviceState>> {
        let state = self.shared().state.lock();
        if state.open {
            Ok(state)
        } else {
            Err(StatusCode::FAIL)
        }
    }

    fn take_failure(state: &mut DeviceState) -> ProviderResult<()> {
        match state.fail_next_transfer.take() {
            Some(code) => Err(code),
            None => Ok(()),
        }
    }

    fn pop_into(state: &mut DeviceState, buffer: &mut [u8]) -> usize {
        let count = state.rx.len().min(buffer.len());
        for (slot, byte) in buffer.iter_mut().zip(state.rx.drain(..count)) {
            *slot = byte;
        }
        count
    }

    fn push_from(state: &mut DeviceState, data: &[u8]) -> usize {
        let count = state.write_capacity.map_or(data.len(), |cap| cap.min(data.len()));
        state.tx.extend_from_slice(&data[..count]);
        count
    }
}

impl DeviceHandle for MockHandle {
    fn close(&self) -> ProviderResult<()> {
        let mut state = self.shared().state.lock();
        state.close_count += 1;
        if !state.open {
            state.double_close = true;
            return Err(StatusCode::FAIL);
        }
        state.open = false;
        drop(state);
        self.shared().changed.notify_all();
        Ok(())
    }

    fn get_config(&self) -> ProviderResult<LineConfig> {
        let state = self.live()?;
        match state.fail_get_config {
            Some(code) => Err(code),
            None => Ok(state.hardware),
        }
    }

    fn set_config(&self, config: &LineConfig) -> ProviderResult<()> {
        let mut state = self.live()?;
        state.set_config_calls += 1;
        if let Some(code) = state.fail_set_config {
            return Err(code);
        }

        let mut effective = *config;
        if let Some(clock) = state.uart_clock {
            let divisor = (clock / config.baud_rate.max(1)).max(1);
            effective.baud_rate = clock / divisor;
        }
        state.hardware = effective;
        Ok(())
    }

    fn blocking_read(&self, buffer: &mut [u8], timeout: Option<Duration>) -> ProviderResult<usize> {
        if !self.mode.can_read() {
            return Err(StatusCode::ARG);
        }
        let mut state = self.live()?;
        state.transfers.push(TransferCall::BlockingRead(timeout));

        match timeout {
            None => loop {
                Self::take_failure(&mut state)?;
                if !state.open {
                    return Err(StatusCode::FAIL);
                }
                if !state.rx.is_empty() {
                    return Ok(Self::pop_into(&mut state, buffer));
                }
                self.shared().changed.wait(&mut state);
            },
            Some(timeout) => {
                let deadline = deadline_after(timeout);
                let mut count = 0;
                loop {
                    Self::take_failure(&mut state)?;
                    if !state.open {
                        return Err(StatusCode::FAIL);
                    }
                    count += Self::pop_into(&mut state, &mut buffer[count..]);
                    if count == buffer.len() {
                        return Ok(count);
                    }
                    if self
                        .shared()
                        .changed
                        .wait_until(&mut state, deadline)
                        .timed_out()
                    {
                        count += Self::pop_into(&mut state, &mut buffer[count..]);
                        return Ok(count);
                    }
                }
            }
        }
    }

    fn nonblocking_read(&self, buffer: &mut [u8]) -> ProviderResult<usize> {
        if !self.mode.can_read() {
            return Err(StatusCode::ARG);
        }
        let mut state = self.live()?;
        state.transfers.push(TransferCall::NonblockingRead);
        Self::take_failure(&mut state)?;
        Ok(Self::pop_into(&mut state, buffer))
    }

    fn blocking_write(&self, data: &[u8], timeout: Option<Duration>) -> ProviderResult<usize> {
        if !self.mode.can_write() {
            return Err(StatusCode::ARG);
        }
        let mut state = self.live()?;
        state.transfers.push(TransferCall::BlockingWrite(timeout));
        Self::take_failure(&mut state)?;
        Ok(Self::push_from(&mut state, data))
    }

    fn nonblocking_write(&self, data: &[u8]) -> ProviderResult<usize> {
        if !self.mode.can_write() {
            return Err(StatusCode::ARG);
        }
        let mut state = self.live()?;
        state.transfers.push(TransferCall::NonblockingWrite);
        Self::take_failure(&mut state)?;
        Ok(Self::push_from(&mut state, data))
    }

    fn input_waiting(&self) -> ProviderResult<usize> {
        Ok(self.live()?.rx.len())
    }

    fn output_waiting(&self) -> ProviderResult<usize> {
        Ok(self.live()?.output_waiting)
    }

    fn flush(&self, selector: FlushSelector) -> ProviderResult<()> {
        let mut state = self.live()?;
        if matches!(selector, FlushSelector::Input | FlushSelector::Both) {
            state.rx.clear();
        }
        if matches!(selector, FlushSelector::Output | FlushSelector::Both) {
            state.output_waiting = 0;
        }
        state.flushes.push(selector);
        Ok(())
    }

    fn drain(&self) -> ProviderResult<()> {
        let mut state = self.live()?;
        state.output_waiting = 0;
        state.drains += 1;
        Ok(())
    }

    fn raw_handle(&self) -> ProviderResult<RawHandle> {
        let state = self.live()?;
        Ok(3 + state.open_count as RawHandle)
    }
}

#[derive(Debug, Default)]
struct ProviderState {
    devices: Vec<MockDevice>,
    fail_enumeration: Option<StatusCode>,
    fail_open: Option<StatusCode>,
}

/// A transport provider over a fixed list of [`MockDevice`]s.
#[derive(Clone, Debug, Default)]
pub struct MockProvider {
    state: Arc<Mutex<ProviderState>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// A provider with one native device per name, in order.
    pub fn with_devices(names: &[&str]) -> Self {
        let provider = Self::new();
        for name in names {
            provider.add_device(DeviceInfo::native(*name, format!("Mock device {name}")));
        }
        provider
    }

    pub fn add_device(&self, info: DeviceInfo) -> MockDevice {
        let device = MockDevice::new(info);
        self.state.lock().devices.push(device.clone());
        device
    }

    pub fn device(&self, name: &str) -> Option<MockDevice> {
        self.state
            .lock()
            .devices
            .iter()
            .find(|device| device.info.name == name)
            .cloned()
    }

    pub fn fail_enumeration(&self, code: Option<StatusCode>) {
        self.state.lock().fail_enumeration = code;
    }

    pub fn fail_open(&self, code: Option<StatusCode>) {
        self.state.lock().fail_open = code;
    }

    /// A registry backed by this provider.
    pub fn registry(&self) -> PortRegistry {
        PortRegistry::new(Arc::new(self.clone()))
    }
}

impl TransportProvider for MockProvider {
    fn enumerate_ports(&self) -> ProviderResult<Vec<DeviceInfo>> {
        let state = self.state.lock();
        if let Some(code) = state.fail_enumeration {
            return Err(code);
        }
        Ok(state.devices.iter().map(|device| device.info.clone()).collect())
    }

    fn resolve_port(&self, name: &str) -> ProviderResult<Option<DeviceInfo>> {
        Ok(self.device(name).map(|device| device.info))
    }

    fn open(&self, device: &DeviceInfo, mode: OpenMode) -> ProviderResult<Box<dyn DeviceHandle>> {
        if let Some(code) = self.state.lock().fail_open {
            return Err(code);
        }
        let device = self.device(&device.name).ok_or(StatusCode::FAIL)?;
        Ok(device.open_handle(mode))
    }
}
