//! Ownership of the OS handle.
//!
//! The handle lives in a single slot behind a mutex. Closing detaches it from
//! the slot before the provider is called, so however many threads race to
//! close or free a port, exactly one of them releases the handle. Transfers
//! clone the `Arc` out of the slot and run without holding the lock.

use super::error::{PortError, PortResult};
use super::status::check;
use super::traits::DeviceHandle;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Lifecycle state of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Created,
    Opened,
    Closed,
    Freed,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Opened => "opened",
            Self::Closed => "closed",
            Self::Freed => "freed",
        };
        f.write_str(name)
    }
}

enum Slot {
    Created,
    Opened(Arc<dyn DeviceHandle>),
    Closed,
    Freed,
}

impl Slot {
    fn state(&self) -> LifecycleState {
        match self {
            Self::Created => LifecycleState::Created,
            Self::Opened(_) => LifecycleState::Opened,
            Self::Closed => LifecycleState::Closed,
            Self::Freed => LifecycleState::Freed,
        }
    }
}

/// Lifecycle manager for one port's OS handle.
pub struct Lifecycle {
    name: String,
    slot: Mutex<Slot>,
}

impl Lifecycle {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slot: Mutex::new(Slot::Created),
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.slot.lock().state()
    }

    /// Open from the `Created` state.
    ///
    /// `open` runs with the slot locked and returns the negotiated handle;
    /// it is responsible for closing the handle itself if negotiation fails
    /// after the device was opened.
    pub fn open_with<F>(&self, open: F) -> PortResult<()>
    where
        F: FnOnce() -> PortResult<Arc<dyn DeviceHandle>>,
    {
        let mut slot = self.slot.lock();
        if !matches!(*slot, Slot::Created) {
            return Err(PortError::invalid_state("open", slot.state()));
        }

        let handle = open()?;
        *slot = Slot::Opened(handle);
        debug!(port = %self.name, "port opened");
        Ok(())
    }

    /// The open handle, or `InvalidState` naming `operation`.
    pub fn handle(&self, operation: &'static str) -> PortResult<Arc<dyn DeviceHandle>> {
        match &*self.slot.lock() {
            Slot::Opened(handle) => Ok(Arc::clone(handle)),
            other => Err(PortError::invalid_state(operation, other.state())),
        }
    }

    /// Fail with `InvalidState` once the port has been freed.
    pub fn ensure_live(&self, operation: &'static str) -> PortResult<()> {
        match self.state() {
            LifecycleState::Freed => Err(PortError::invalid_state(operation, LifecycleState::Freed)),
            _ => Ok(()),
        }
    }

    /// Fail with `InvalidState` unless the port is open.
    pub fn ensure_open(&self, operation: &'static str) -> PortResult<()> {
        match self.state() {
            LifecycleState::Opened => Ok(()),
            other => Err(PortError::invalid_state(operation, other)),
        }
    }

    /// Close the handle if open. Closing a port that is not open succeeds
    /// without doing anything.
    pub fn close(&self) -> PortResult<()> {
        let handle = {
            let mut slot = self.slot.lock();
            match std::mem::replace(&mut *slot, Slot::Closed) {
                Slot::Opened(handle) => handle,
                other => {
                    *slot = other;
                    return Ok(());
                }
            }
        };

        debug!(port = %self.name, "closing port");
        check(handle.close())
    }

    /// Move to `Freed`, closing the handle first if it is still open.
    pub fn free(&self) -> PortResult<()> {
        let previous = std::mem::replace(&mut *self.slot.lock(), Slot::Freed);
        match previous {
            Slot::Opened(handle) => {
                debug!(port = %self.name, "closing port before free");
                check(handle.close())
            }
            Slot::Freed => Ok(()),
            _ => {
                debug!(port = %self.name, "port freed");
                Ok(())
            }
        }
    }
}

impl fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifecycle")
            .field("name", &self.name)
            .field("state", &self.state())
            .finish()
    }
}
