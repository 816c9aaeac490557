//! Graphics device state for one interpreter plotting session.
//!
//! A [`GraphicsDevice`] tracks a traced directory, asks the interpreter to
//! redraw through its [`RescaleQueue`], rescans the directory after every
//! redraw and publishes the reduced snapshot set to listeners.

mod info;
mod queue;
mod registry;

pub use info::{Configuration, DeviceStatus, Dimension, InitProperties, ScreenParameters};
pub use queue::{boxed_work, RescaleHandle, RescaleQueue, RescaleResult, RescaleWork};
pub use registry::{DeviceId, DeviceRegistry};

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::runtime::Handle;
use tracing::{debug, error, info, instrument, trace};

use crate::error::{GraphicsError, Result, ResultExt};
use crate::interpreter::SharedInterpreter;
use crate::listeners::{Callback, ListenerId, ListenerList};
use crate::snapshot::{scan, DirectoryStore, SnapshotStore, SnapshotsUpdate};

/// Collaborators shared by every device of one session.
#[derive(Clone)]
pub struct DeviceContext {
    pub interpreter: SharedInterpreter,
    pub registry: Arc<DeviceRegistry>,
    /// Runtime that drives rescale queues and directory scans.
    pub runtime: Handle,
    /// Initialize devices at twice the pixels and resolution.
    pub hidpi: bool,
}

impl DeviceContext {
    #[must_use]
    pub fn new(interpreter: SharedInterpreter, registry: Arc<DeviceRegistry>, runtime: Handle) -> Self {
        Self {
            interpreter,
            registry,
            runtime,
            hidpi: false,
        }
    }

    #[must_use]
    pub fn with_hidpi(mut self, hidpi: bool) -> Self {
        self.hidpi = hidpi;
        self
    }
}

impl fmt::Debug for DeviceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceContext")
            .field("registry", &self.registry)
            .field("hidpi", &self.hidpi)
            .finish_non_exhaustive()
    }
}

/// One update bound to the callbacks registered when it was posted.
struct Delivery {
    callbacks: Vec<Callback<SnapshotsUpdate>>,
    update: SnapshotsUpdate,
}

/// Mutable part of a device, guarded by one lock.
struct DeviceState {
    status: DeviceStatus,
    configuration: Configuration,
    last_update: SnapshotsUpdate,
    /// Screen parameters each plot slot was last rendered at.
    numbers_to_parameters: HashMap<u32, ScreenParameters>,
    /// Updates waiting for listeners, in the order they were posted.
    outbox: VecDeque<Delivery>,
    delivering: bool,
}

impl DeviceState {
    /// Queue a delivery. Returns true if the caller must drain the outbox.
    fn post(&mut self, callbacks: Vec<Callback<SnapshotsUpdate>>, update: SnapshotsUpdate) -> bool {
        self.outbox.push_back(Delivery { callbacks, update });
        !std::mem::replace(&mut self.delivering, true)
    }
}

/// One logical plotting session over a traced directory.
pub struct GraphicsDevice {
    id: DeviceId,
    context: DeviceContext,
    store: Arc<dyn SnapshotStore>,
    initial_parameters: ScreenParameters,
    queue: RescaleQueue,
    state: Mutex<DeviceState>,
    listeners: ListenerList<SnapshotsUpdate>,
    this: Weak<GraphicsDevice>,
}

impl GraphicsDevice {
    /// Create a device over a real traced directory and initialize it.
    ///
    /// The new device becomes the registry's current device.
    pub fn new(
        context: DeviceContext,
        traced_directory: impl Into<PathBuf>,
        initial_parameters: ScreenParameters,
    ) -> Arc<Self> {
        Self::with_store(
            context,
            Arc::new(DirectoryStore::new(traced_directory)),
            initial_parameters,
        )
    }

    /// Create a device over any [`SnapshotStore`] and initialize it.
    pub fn with_store(
        context: DeviceContext,
        store: Arc<dyn SnapshotStore>,
        initial_parameters: ScreenParameters,
    ) -> Arc<Self> {
        let id = context.registry.register_new_device();
        let queue = RescaleQueue::new(id, Arc::clone(&context.registry), context.runtime.clone());

        let device = Arc::new_cyclic(|this| Self {
            id,
            context,
            store,
            initial_parameters,
            queue,
            state: Mutex::new(DeviceState {
                status: DeviceStatus::Uninitialized,
                configuration: Configuration::new(initial_parameters, None),
                last_update: SnapshotsUpdate::empty(),
                numbers_to_parameters: HashMap::new(),
                outbox: VecDeque::new(),
                delivering: false,
            }),
            listeners: ListenerList::new(),
            this: this.clone(),
        });

        info!(
            device = %id,
            dir = %device.traced_directory().display(),
            size = %initial_parameters.dimension,
            "Created graphics device"
        );
        device.reset();
        device
    }

    // === Accessors ===

    #[must_use]
    pub const fn id(&self) -> DeviceId {
        self.id
    }

    #[must_use]
    pub fn traced_directory(&self) -> &Path {
        self.store.location()
    }

    #[must_use]
    pub fn status(&self) -> DeviceStatus {
        self.lock_state().status
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.status() == DeviceStatus::Loaded
    }

    #[must_use]
    pub fn configuration(&self) -> Configuration {
        self.lock_state().configuration
    }

    /// The last published snapshot set.
    #[must_use]
    pub fn last_update(&self) -> SnapshotsUpdate {
        self.lock_state().last_update.clone()
    }

    /// Requests waiting in this device's rescale queue.
    #[must_use]
    pub fn pending_rescales(&self) -> usize {
        self.queue.pending_len()
    }

    // === Lifecycle ===

    /// Initialize the interpreter-side device with the initial size and the
    /// current resolution.
    ///
    /// Any failure leaves the device in [`DeviceStatus::Failed`], where
    /// rescale requests are accepted and ignored.
    pub fn reset(&self) -> DeviceStatus {
        let resolution = {
            let state = self.lock_state();
            if state.status == DeviceStatus::Disposed {
                return DeviceStatus::Disposed;
            }
            state.configuration.screen_parameters.resolution
        };

        let properties = InitProperties::new(
            self.traced_directory(),
            self.initial_parameters.dimension,
            resolution,
            self.context.hidpi,
        );

        let status = match self.context.interpreter.init_device(&properties) {
            Ok(result) if result.is_success() => {
                debug!(device = %self.id, ?resolution, "Graphics device initialized");
                DeviceStatus::Loaded
            }
            Ok(result) => {
                let e = GraphicsError::DeviceInit {
                    stderr: result.stderr.trim().to_string(),
                };
                error!(device = %self.id, error = %e, "Failed to initialize graphics device");
                DeviceStatus::Failed
            }
            Err(e) => {
                error!(device = %self.id, error = %e, "Failed to initialize graphics device");
                DeviceStatus::Failed
            }
        };

        let mut state = self.lock_state();
        if state.status != DeviceStatus::Disposed {
            state.status = status;
        }
        state.status
    }

    /// Leave the device context and drop all listeners.
    ///
    /// Snapshot files stay on disk. Calling this twice is harmless.
    pub fn dispose(&self) {
        {
            let mut state = self.lock_state();
            if state.status == DeviceStatus::Disposed {
                return;
            }
            state.status = DeviceStatus::Disposed;
        }
        self.context.registry.unregister_last_device();
        self.listeners.clear();
        info!(device = %self.id, "Disposed graphics device");
    }

    // === Rescaling ===

    /// Redraw every plot at the current size, then rescan.
    pub fn update(&self) -> RescaleHandle {
        let dimension = self.configuration().screen_parameters.dimension;
        self.rescale(None, dimension)
    }

    /// Replace the configuration.
    ///
    /// A resolution change re-initializes the device. If the configuration
    /// names a known plot slot that was last rendered at another size, or
    /// whose size was never recorded, that slot alone is redrawn and the
    /// returned handle tracks it.
    pub fn set_configuration(&self, configuration: Configuration) -> Option<RescaleHandle> {
        let (resolution_changed, rendered) = {
            let mut state = self.lock_state();
            if state.status == DeviceStatus::Disposed {
                return None;
            }
            let previous = std::mem::replace(&mut state.configuration, configuration);
            // None: unknown slot. Some(None): known slot, size not recorded.
            let rendered = configuration.snapshot_number.and_then(|number| {
                match state.numbers_to_parameters.get(&number) {
                    Some(parameters) => Some(Some(parameters.dimension)),
                    None => state.last_update.find(number).map(|_| None),
                }
            });
            (
                previous.screen_parameters.resolution != configuration.screen_parameters.resolution,
                rendered,
            )
        };

        if resolution_changed {
            info!(
                device = %self.id,
                resolution = ?configuration.screen_parameters.resolution,
                "Resolution changed, resetting device"
            );
            self.reset();
        }

        let number = configuration.snapshot_number?;
        let dimension = configuration.screen_parameters.dimension;
        match rendered {
            Some(Some(from)) if from == dimension => None,
            Some(from) => {
                debug!(device = %self.id, number, ?from, to = %dimension, "Rescaling plot");
                Some(self.rescale(Some(number), dimension))
            }
            None => None,
        }
    }

    fn rescale(&self, snapshot_number: Option<u32>, dimension: Dimension) -> RescaleHandle {
        let parameters = {
            let state = self.lock_state();
            if state.status != DeviceStatus::Loaded {
                debug!(device = %self.id, status = ?state.status, "Ignoring rescale for unloaded device");
                return RescaleHandle::ready();
            }
            state.configuration.screen_parameters.with_dimension(dimension)
        };

        let interpreter = Arc::clone(&self.context.interpreter);
        let registry = Arc::clone(&self.context.registry);
        let id = self.id;
        let device = self.this.clone();

        self.queue.submit(
            snapshot_number,
            Some(parameters),
            boxed_work(move || async move {
                interpreter.rescale(snapshot_number, dimension).await?;
                if !registry.is_current(id) {
                    debug!(device = %id, "Device lost focus during rescale, skipping scan");
                    return Ok(());
                }
                match device.upgrade() {
                    Some(device) => device.look_for_new_snapshots(snapshot_number, parameters).await,
                    None => Ok(()),
                }
            }),
        )
    }

    /// Rescan the traced directory and publish the result if it changed.
    ///
    /// `parameters` are the ones the preceding redraw ran with.
    #[instrument(skip_all, fields(device = %self.id))]
    async fn look_for_new_snapshots(&self, traced: Option<u32>, parameters: ScreenParameters) -> Result<()> {
        let store = Arc::clone(&self.store);
        let previous = self.last_update();
        let outcome = tokio::task::spawn_blocking(move || scan(store.as_ref(), &previous))
            .await
            .with_context(|| "snapshot scan task failed")??;

        if outcome.changed {
            self.publish_scan(outcome.update, traced, parameters);
        }
        Ok(())
    }

    fn publish_scan(&self, update: SnapshotsUpdate, traced: Option<u32>, parameters: ScreenParameters) {
        let drain = {
            let mut state = self.lock_state();
            if state.status == DeviceStatus::Disposed {
                return;
            }
            // A concurrent scan may have published the same set already
            if update.same_identities(&state.last_update) {
                trace!(device = %self.id, "Scan result already published");
                return;
            }
            if let Some(number) = traced.or_else(|| update.last_number()) {
                state.numbers_to_parameters.insert(number, parameters);
            }
            state.configuration.snapshot_number = traced;
            state.last_update = update.clone();
            state.post(self.listeners.callbacks(), update)
        };
        if drain {
            self.drain_outbox();
        }
    }

    /// Deliver posted updates in order.
    ///
    /// One caller drains at a time. Updates posted meanwhile, including from
    /// inside a callback, wait their turn.
    fn drain_outbox(&self) {
        loop {
            let delivery = {
                let mut state = self.lock_state();
                match state.outbox.pop_front() {
                    Some(delivery) => delivery,
                    None => {
                        state.delivering = false;
                        return;
                    }
                }
            };
            for callback in &delivery.callbacks {
                callback(&delivery.update);
            }
        }
    }

    // === Clearing ===

    /// Forget one plot slot and delete its files.
    ///
    /// A missing or undeletable file is not an error; the entry is dropped
    /// either way and listeners are notified.
    pub fn clear_snapshot(&self, number: u32) {
        let (files, drain) = {
            let mut state = self.lock_state();
            let files: Vec<PathBuf> = state
                .last_update
                .normal
                .iter()
                .chain(&state.last_update.zoomed)
                .filter(|s| s.number() == number)
                .map(|s| s.file.clone())
                .collect();
            state.last_update.normal.retain(|s| s.number() != number);
            state.last_update.zoomed.retain(|s| s.number() != number);
            state.numbers_to_parameters.remove(&number);
            let update = state.last_update.clone();
            (files, state.post(self.listeners.callbacks(), update))
        };

        self.delete_files(&files);
        debug!(device = %self.id, number, files = %files.len(), "Cleared snapshot");
        if drain {
            self.drain_outbox();
        }
    }

    /// Delete every known snapshot file and reset tracking state.
    pub fn clear_all_snapshots(&self) {
        let (files, drain) = {
            let mut state = self.lock_state();
            let files = state.last_update.files();
            state.last_update = SnapshotsUpdate::empty();
            state.numbers_to_parameters.clear();
            (files, state.post(self.listeners.callbacks(), SnapshotsUpdate::empty()))
        };

        self.delete_files(&files);
        info!(device = %self.id, files = %files.len(), "Cleared all snapshots");
        if drain {
            self.drain_outbox();
        }
    }

    fn delete_files(&self, files: &[PathBuf]) {
        for file in files {
            if let Err(e) = self.store.delete(file) {
                debug!(file = %file.display(), error = %e, "Failed to delete snapshot");
            }
        }
    }

    // === Listeners ===

    /// Subscribe to snapshot updates.
    ///
    /// The callback is called right away with the current update, unless
    /// another delivery is running; then it gets it after the ones before.
    pub fn add_listener<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(&SnapshotsUpdate) + Send + Sync + 'static,
    {
        let callback: Callback<SnapshotsUpdate> = Arc::new(callback);
        let (id, drain) = {
            let mut state = self.lock_state();
            let id = self.listeners.add(Arc::clone(&callback));
            let current = state.last_update.clone();
            (id, state.post(vec![callback], current))
        };
        if drain {
            self.drain_outbox();
        }
        id
    }

    /// Unsubscribe. Unknown ids are ignored.
    pub fn remove_listener(&self, id: ListenerId) {
        self.listeners.remove(id);
    }

    fn lock_state(&self) -> MutexGuard<'_, DeviceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for GraphicsDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphicsDevice")
            .field("id", &self.id)
            .field("dir", &self.traced_directory())
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}
