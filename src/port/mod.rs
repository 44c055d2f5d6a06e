//! Serial port session core.
//!
//! [`PortRegistry`] discovers devices and hands out unopened [`Port`]s. A
//! port negotiates its configuration on [`Port::open`], transfers bytes under
//! per-direction deadlines and releases its OS handle exactly once, however
//! many times it is closed or freed. The OS side is behind the
//! [`TransportProvider`] and [`DeviceHandle`] traits.

pub mod config_store;
pub mod deadline;
pub mod error;
pub mod lifecycle;
pub mod mock;
pub mod options;
pub mod registry;
pub mod session;
pub mod settings;
pub mod status;
pub mod system;
pub mod traits;

pub use config_store::{AppliedConfig, ConfigStore, PendingConfig, DEFAULT_BAUD_RATE};
pub use deadline::{deadline_after, TimeoutPolicy, TransferPolicy};
pub use error::{ErrorKind, PortError, PortResult};
pub use lifecycle::LifecycleState;
pub use mock::{MockDevice, MockProvider, TransferCall};
pub use options::OpenOptions;
pub use registry::PortRegistry;
pub use session::{Port, PortAddr};
pub use settings::*;
pub use status::{map_status, ProviderResult, StatusCode};
pub use system::SystemProvider;
pub use traits::*;
