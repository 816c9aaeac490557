//! Active-device tracking with support for nested device contexts.
//!
//! Opening a plotting device while another one is open pushes the old one
//! onto a stack; closing it restores the parent.

use std::fmt;
use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use tracing::debug;

/// Opaque, monotonically increasing device identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct DeviceId(u64);

impl DeviceId {
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    current: Option<DeviceId>,
    previous: Vec<DeviceId>,
    counter: u64,
}

/// Registry of the currently active device.
///
/// All mutation goes through one lock, so concurrent callers always observe
/// a consistent current/stack pair.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    state: Mutex<RegistryState>,
}

impl DeviceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a new id and make it current, stacking the previous one.
    pub fn register_new_device(&self) -> DeviceId {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(current) = state.current {
            state.previous.push(current);
        }
        let id = DeviceId(state.counter);
        state.counter += 1;
        state.current = Some(id);
        debug!(device = %id, depth = %state.previous.len(), "Registered graphics device");
        id
    }

    /// Leave the innermost device context and restore its parent.
    pub fn unregister_last_device(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let left = state.current;
        state.current = state.previous.pop();
        debug!(left = ?left, current = ?state.current, "Unregistered graphics device");
    }

    #[must_use]
    pub fn current_device_id(&self) -> Option<DeviceId> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .current
    }

    /// True if `id` is the active device.
    ///
    /// Asynchronous work tagged with a device id must check this before
    /// applying side effects.
    #[must_use]
    pub fn is_current(&self, id: DeviceId) -> bool {
        self.current_device_id() == Some(id)
    }

    /// Number of stacked parent devices.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .previous
            .len()
    }
}
