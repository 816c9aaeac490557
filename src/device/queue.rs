//! Per-device serialized, coalescing queue for rescale requests.
//!
//! Window resizes can ask for redraws much faster than the interpreter can
//! serve them. The queue keeps at most one request in flight per device,
//! merges equivalent pending requests and drops work for devices that are
//! no longer active.

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

use futures::future::{self, BoxFuture, FutureExt, Shared};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

use super::info::ScreenParameters;
use super::registry::{DeviceId, DeviceRegistry};
use crate::error::{GraphicsError, Result};

/// Deferred interpreter call. Invoked at most once.
pub type RescaleWork = Box<dyn FnOnce() -> BoxFuture<'static, Result<()>> + Send>;

/// Outcome shared by every handle of one queued request.
pub type RescaleResult = std::result::Result<(), Arc<GraphicsError>>;

/// Wrap an async closure as [`RescaleWork`].
pub fn boxed_work<F, Fut>(work: F) -> RescaleWork
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Box::new(move || work().boxed())
}

/// Completion handle for a submitted request.
///
/// Cloneable; coalesced requests return clones of the same handle. Dropping
/// it does not cancel anything.
#[derive(Clone)]
pub struct RescaleHandle {
    inner: Shared<BoxFuture<'static, RescaleResult>>,
}

impl RescaleHandle {
    fn pending(receiver: oneshot::Receiver<RescaleResult>) -> Self {
        let inner = async move {
            receiver
                .await
                .unwrap_or_else(|_| Err(Arc::new(GraphicsError::TaskAborted)))
        }
        .boxed()
        .shared();
        Self { inner }
    }

    /// A handle that has already completed successfully.
    #[must_use]
    pub fn ready() -> Self {
        Self {
            inner: future::ready(Ok(())).boxed().shared(),
        }
    }

    /// True if both handles belong to the same queued request.
    ///
    /// Only meaningful before the request completes.
    #[must_use]
    pub fn same_task(&self, other: &Self) -> bool {
        self.inner.ptr_eq(&other.inner)
    }
}

impl Future for RescaleHandle {
    type Output = RescaleResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.inner).poll(cx)
    }
}

impl fmt::Debug for RescaleHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RescaleHandle")
            .field("completed", &self.inner.peek().is_some())
            .finish()
    }
}

/// Requests with equal keys are interchangeable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TaskKey {
    snapshot_number: Option<u32>,
    parameters: Option<ScreenParameters>,
}

struct TaskWrapper {
    key: TaskKey,
    work: RescaleWork,
    sender: oneshot::Sender<RescaleResult>,
    handle: RescaleHandle,
}

impl TaskWrapper {
    fn new(key: TaskKey, work: RescaleWork) -> Self {
        let (sender, receiver) = oneshot::channel();
        Self {
            key,
            work,
            sender,
            handle: RescaleHandle::pending(receiver),
        }
    }
}

#[derive(Default)]
struct QueueState {
    is_task_running: bool,
    queue: VecDeque<TaskWrapper>,
}

struct QueueInner {
    device_id: DeviceId,
    registry: Arc<DeviceRegistry>,
    runtime: Handle,
    state: Mutex<QueueState>,
}

/// Serialized rescale queue owned by one device.
pub struct RescaleQueue {
    inner: Arc<QueueInner>,
}

impl RescaleQueue {
    /// Create a queue for `device_id`.
    ///
    /// `runtime` drives the drain loop, so `submit` may be called from
    /// threads outside the runtime.
    #[must_use]
    pub fn new(device_id: DeviceId, registry: Arc<DeviceRegistry>, runtime: Handle) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                device_id,
                registry,
                runtime,
                state: Mutex::new(QueueState::default()),
            }),
        }
    }

    #[must_use]
    pub fn device_id(&self) -> DeviceId {
        self.inner.device_id
    }

    /// Submit a rescale request.
    ///
    /// While a request is in flight, an equal `(snapshot_number, parameters)`
    /// pending request absorbs this one and its handle is returned; otherwise
    /// the request goes to the back of the queue. With nothing in flight the
    /// request starts right away.
    pub fn submit(
        &self,
        snapshot_number: Option<u32>,
        parameters: Option<ScreenParameters>,
        work: RescaleWork,
    ) -> RescaleHandle {
        let key = TaskKey {
            snapshot_number,
            parameters,
        };

        let mut state = self.inner.lock_state();
        if state.is_task_running {
            if let Some(existing) = state.queue.iter().find(|task| task.key == key) {
                trace!(device = %self.inner.device_id, ?key, "Coalesced rescale request");
                return existing.handle.clone();
            }
            let task = TaskWrapper::new(key, work);
            let handle = task.handle.clone();
            state.queue.push_back(task);
            trace!(device = %self.inner.device_id, ?key, pending = %state.queue.len(), "Queued rescale request");
            return handle;
        }

        state.is_task_running = true;
        drop(state);

        let task = TaskWrapper::new(key, work);
        let handle = task.handle.clone();
        let inner = Arc::clone(&self.inner);
        self.inner.runtime.spawn(inner.drain(task));
        handle
    }

    /// Number of requests waiting behind the one in flight.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.inner.lock_state().queue.len()
    }

    /// True while a request is in flight.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.lock_state().is_task_running
    }
}

impl QueueInner {
    fn lock_state(&self) -> std::sync::MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `first`, then keep popping until the queue is empty.
    ///
    /// The lock is only held to pop; never across `work`.
    async fn drain(self: Arc<Self>, first: TaskWrapper) {
        let mut next = Some(first);
        while let Some(task) = next {
            self.execute(task).await;

            let mut state = self.lock_state();
            next = state.queue.pop_front();
            if next.is_none() {
                state.is_task_running = false;
            }
        }
        trace!(device = %self.device_id, "Rescale queue idle");
    }

    async fn execute(&self, task: TaskWrapper) {
        let TaskWrapper {
            key, work, sender, ..
        } = task;

        let result = if self.registry.is_current(self.device_id) {
            work().await.map_err(Arc::new)
        } else {
            debug!(device = %self.device_id, ?key, "Skipping rescale for inactive device");
            Ok(())
        };

        if let Err(e) = &result {
            warn!(device = %self.device_id, ?key, error = %e, "Rescale request failed");
        }

        // Nobody listening is fine.
        let _ = sender.send(result);
    }
}
