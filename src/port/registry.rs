//! Port discovery.

use super::error::{PortError, PortResult};
use super::options::OpenOptions;
use super::session::Port;
use super::status::check;
use super::system::SystemProvider;
use super::traits::{DeviceInfo, TransportProvider};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Produces unopened [`Port`] values from a transport provider.
///
/// Every port gets its own copy of the provider's device record, so ports
/// created from the same registry never share metadata.
#[derive(Debug, Clone)]
pub struct PortRegistry {
    provider: Arc<dyn TransportProvider>,
    aliases: HashMap<String, String>,
}

impl PortRegistry {
    pub fn new(provider: Arc<dyn TransportProvider>) -> Self {
        Self {
            provider,
            aliases: HashMap::new(),
        }
    }

    /// Registry backed by the operating system's serial ports.
    pub fn system() -> Self {
        Self::new(Arc::new(SystemProvider::new()))
    }

    /// Friendly names that [`resolve`](Self::resolve) maps to device paths.
    pub fn with_aliases(mut self, aliases: HashMap<String, String>) -> Self {
        self.aliases = aliases;
        self
    }

    /// Device name for `name`, following an alias if one is configured.
    pub fn device_name<'a>(&'a self, name: &'a str) -> &'a str {
        self.aliases.get(name).map(String::as_str).unwrap_or(name)
    }

    /// Every device the provider reports, as unopened ports in provider
    /// order.
    pub fn enumerate(&self) -> PortResult<Vec<Port>> {
        let devices = check(self.provider.enumerate_ports())?;
        debug!(count = devices.len(), "enumerated serial ports");
        Ok(devices.into_iter().map(|device| self.port(device)).collect())
    }

    /// Look up one port by name or alias.
    pub fn resolve(&self, name: &str) -> PortResult<Port> {
        let device_name = self.device_name(name);
        match check(self.provider.resolve_port(device_name))? {
            Some(device) => Ok(self.port(device)),
            None => Err(PortError::not_found(device_name)),
        }
    }

    /// Resolve `name` and open it with `options`.
    pub fn open(&self, name: &str, options: &OpenOptions) -> PortResult<Port> {
        let port = self.resolve(name)?;
        port.open(options)?;
        Ok(port)
    }

    fn port(&self, device: DeviceInfo) -> Port {
        Port::new(Arc::clone(&self.provider), device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::mock::MockProvider;
    use crate::port::LifecycleState;

    #[test]
    fn test_enumerate_in_provider_order() {
        let provider = MockProvider::with_devices(&["MOCK0", "MOCK1", "MOCK2"]);
        let ports = provider.registry().enumerate().unwrap();

        let names: Vec<_> = ports.iter().map(|p| p.name().unwrap().to_string()).collect();
        assert_eq!(names, ["MOCK0", "MOCK1", "MOCK2"]);
        assert!(ports.iter().all(|p| p.state() == LifecycleState::Created));
    }

    #[test]
    fn test_resolve_unknown_name() {
        let provider = MockProvider::with_devices(&["MOCK0"]);
        let err = provider.registry().resolve("nonexistent-device").unwrap_err();
        assert_eq!(err, PortError::not_found("nonexistent-device"));
    }

    #[test]
    fn test_resolve_follows_alias() {
        let provider = MockProvider::with_devices(&["/dev/ttyUSB3"]);
        let registry = provider
            .registry()
            .with_aliases(HashMap::from([("gps".to_string(), "/dev/ttyUSB3".to_string())]));

        let port = registry.resolve("gps").unwrap();
        assert_eq!(port.name().unwrap(), "/dev/ttyUSB3");
        assert_eq!(registry.device_name("other"), "other");
    }

    #[test]
    fn test_ports_own_independent_records() {
        let provider = MockProvider::with_devices(&["MOCK0"]);
        let registry = provider.registry();
        let first = registry.resolve("MOCK0").unwrap();
        let second = registry.resolve("MOCK0").unwrap();

        first.free().unwrap();
        assert_eq!(second.name().unwrap(), "MOCK0");
    }
}
