//! Registry of live graphics devices with a single active one.
//!
//! UI code subscribes here once and receives the normal-snapshot file list of
//! whichever device is active, including when the active device changes.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use crate::device::{Configuration, DeviceId, GraphicsDevice, RescaleHandle};
use crate::listeners::{ListenerId, ListenerList};

/// Forwarding subscription on the active device.
struct Subscription {
    device: Arc<GraphicsDevice>,
    listener: Option<ListenerId>,
    generation: u64,
}

#[derive(Default)]
struct RepositoryState {
    /// Live devices in insertion order.
    devices: Vec<Arc<GraphicsDevice>>,
    current: Option<Subscription>,
}

/// State shared with forwarding callbacks.
#[derive(Default)]
struct Shared {
    listeners: ListenerList<[PathBuf]>,
    last_files: Mutex<Vec<PathBuf>>,
    /// Bumped on every switch; callbacks of older subscriptions stay silent.
    generation: AtomicU64,
}

impl Shared {
    fn forward(&self, generation: u64, files: Vec<PathBuf>) {
        if self.generation.load(Ordering::SeqCst) != generation {
            return;
        }
        *self.last_files.lock().unwrap_or_else(PoisonError::into_inner) = files.clone();
        self.listeners.notify(&files);
    }
}

/// Process-wide set of graphics devices.
#[derive(Default)]
pub struct GraphicsRepository {
    state: Mutex<RepositoryState>,
    shared: Arc<Shared>,
}

impl GraphicsRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `device` and make it the active one.
    ///
    /// Repository listeners immediately receive its current file list.
    pub fn set_active_device(&self, device: Arc<GraphicsDevice>) {
        {
            let mut state = self.lock_state();
            if !state.devices.iter().any(|d| Arc::ptr_eq(d, &device)) {
                state.devices.push(Arc::clone(&device));
            }
            if state
                .current
                .as_ref()
                .is_some_and(|sub| Arc::ptr_eq(&sub.device, &device))
            {
                return;
            }
        }
        info!(device = %device.id(), "Switching active graphics device");
        self.switch_to(Some(device));
    }

    /// Stop tracking a device.
    ///
    /// If it was active, the most recently added remaining device takes
    /// over; with none left, listeners receive an empty list.
    pub fn remove_device(&self, id: DeviceId) -> Option<Arc<GraphicsDevice>> {
        let (removed, next) = {
            let mut state = self.lock_state();
            let index = state.devices.iter().position(|d| d.id() == id)?;
            let removed = state.devices.remove(index);
            let was_current = state
                .current
                .as_ref()
                .is_some_and(|sub| sub.device.id() == id);
            let next = was_current.then(|| state.devices.last().cloned());
            (removed, next)
        };

        debug!(device = %id, "Removed graphics device");
        if let Some(next) = next {
            self.switch_to(next);
        }
        Some(removed)
    }

    #[must_use]
    pub fn active_device(&self) -> Option<Arc<GraphicsDevice>> {
        self.lock_state()
            .current
            .as_ref()
            .map(|sub| Arc::clone(&sub.device))
    }

    /// Every tracked device, oldest first.
    #[must_use]
    pub fn devices(&self) -> Vec<Arc<GraphicsDevice>> {
        self.lock_state().devices.clone()
    }

    /// Subscribe to the active device's normal-snapshot files.
    ///
    /// The callback is called right away with the latest list.
    pub fn add_snapshot_listener<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(&[PathBuf]) + Send + Sync + 'static,
    {
        let id = self.shared.listeners.add(Arc::new(callback));
        let files = self
            .shared
            .last_files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        self.shared.listeners.notify_one(id, &files);
        id
    }

    /// Unsubscribe. Unknown ids are ignored.
    pub fn remove_snapshot_listener(&self, id: ListenerId) {
        self.shared.listeners.remove(id);
    }

    // === Forwarders to the active device ===

    #[must_use]
    pub fn configuration(&self) -> Option<Configuration> {
        self.active_device().map(|device| device.configuration())
    }

    pub fn set_configuration(&self, configuration: Configuration) -> Option<RescaleHandle> {
        self.active_device()?.set_configuration(configuration)
    }

    pub fn update(&self) -> Option<RescaleHandle> {
        self.active_device().map(|device| device.update())
    }

    pub fn clear_snapshot(&self, number: u32) {
        if let Some(device) = self.active_device() {
            device.clear_snapshot(number);
        }
    }

    pub fn clear_all_snapshots(&self) {
        if let Some(device) = self.active_device() {
            device.clear_all_snapshots();
        }
    }

    /// Move the forwarding subscription to `next`.
    ///
    /// Device callbacks run outside the repository lock, so a repository
    /// listener may call back into the repository.
    fn switch_to(&self, next: Option<Arc<GraphicsDevice>>) {
        let (previous, generation) = {
            let mut state = self.lock_state();
            let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
            let subscription = next.as_ref().map(|device| Subscription {
                device: Arc::clone(device),
                listener: None,
                generation,
            });
            (std::mem::replace(&mut state.current, subscription), generation)
        };

        if let Some(Subscription {
            device,
            listener: Some(id),
            ..
        }) = previous
        {
            device.remove_listener(id);
        }

        let Some(device) = next else {
            self.shared.forward(generation, Vec::new());
            return;
        };

        let shared = Arc::clone(&self.shared);
        let id = device.add_listener(move |update| shared.forward(generation, update.normal_files()));

        let mut state = self.lock_state();
        match state.current.as_mut() {
            Some(sub) if sub.generation == generation => sub.listener = Some(id),
            _ => {
                // Superseded by a concurrent switch
                drop(state);
                device.remove_listener(id);
            }
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, RepositoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
