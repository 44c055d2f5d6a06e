//! Shared test utilities for serial-session tests.
//!
//! This module provides common test infrastructure including:
//! - Mock providers with named devices
//! - Opened ports paired with the mock device behind them
//! - Timing assertions for deadline behaviour

#![allow(dead_code)]

use serial_session::port::{DeviceInfo, MockDevice, MockProvider, OpenOptions, Port, UsbInfo};
use std::time::{Duration, Instant};

/// An opened port and the mock device it talks to.
pub struct MockPort {
    pub provider: MockProvider,
    pub device: MockDevice,
    pub port: Port,
}

/// Create a provider with one native device per name, in order.
///
/// # Example
/// ```ignore
/// let provider = mock_provider(&["MOCK0", "MOCK1"]);
/// let ports = provider.registry().enumerate()?;
/// ```
pub fn mock_provider(names: &[&str]) -> MockProvider {
    MockProvider::with_devices(names)
}

/// Open `MOCK0` on a fresh provider with the given options.
pub fn open_mock(options: &OpenOptions) -> MockPort {
    let provider = mock_provider(&["MOCK0"]);
    let device = provider.device("MOCK0").expect("mock device registered");
    let port = provider
        .registry()
        .open("MOCK0", options)
        .expect("mock port opens");
    MockPort {
        provider,
        device,
        port,
    }
}

/// Resolve `MOCK0` on a fresh provider without opening it.
pub fn created_mock() -> MockPort {
    let provider = mock_provider(&["MOCK0"]);
    let device = provider.device("MOCK0").expect("mock device registered");
    let port = provider.registry().resolve("MOCK0").expect("mock port resolves");
    MockPort {
        provider,
        device,
        port,
    }
}

/// A USB device record with typical FTDI metadata.
pub fn ftdi_device(name: &str) -> DeviceInfo {
    DeviceInfo::usb(
        name,
        "FT232R USB UART",
        UsbInfo {
            bus: 1,
            address: 4,
            vid: 0x0403,
            pid: 0x6001,
            manufacturer: "FTDI".to_string(),
            product: "FT232R USB UART".to_string(),
            serial_number: "A50285BI".to_string(),
        },
    )
}

/// Run `f` and return its result with the elapsed wall time.
pub fn timed<T>(f: impl FnOnce() -> T) -> (T, Duration) {
    let start = Instant::now();
    let result = f();
    (result, start.elapsed())
}

/// Assert an operation finished within `limit`.
pub fn assert_within(elapsed: Duration, limit: Duration) {
    assert!(
        elapsed < limit,
        "expected completion within {:?}, took {:?}",
        limit,
        elapsed
    );
}
