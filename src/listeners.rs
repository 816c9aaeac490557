//! Observer lists with explicit subscription ids.
//!
//! Callbacks are invoked outside the list's lock, so a callback may add or
//! remove listeners (including itself) without deadlocking.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Handle returned by `add`; pass it back to remove the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// Callback stored in a [`ListenerList`].
pub type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Thread-safe list of callbacks for values of type `T`.
pub struct ListenerList<T: ?Sized> {
    next_id: AtomicU64,
    entries: Mutex<Vec<(ListenerId, Callback<T>)>>,
}

impl<T: ?Sized> Default for ListenerList<T> {
    fn default() -> Self {
        Self {
            next_id: AtomicU64::new(0),
            entries: Mutex::new(Vec::new()),
        }
    }
}

impl<T: ?Sized> ListenerList<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, callback: Callback<T>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, callback));
        id
    }

    /// Remove a listener. Returns false if it was already gone.
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|(entry, _)| *entry != id);
        entries.len() != before
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Call `id`'s callback alone, if it is still registered.
    pub fn notify_one(&self, id: ListenerId, value: &T) {
        let callback = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|(entry, _)| *entry == id)
            .map(|(_, callback)| Arc::clone(callback));
        if let Some(callback) = callback {
            callback(value);
        }
    }

    /// The registered callbacks, in registration order.
    #[must_use]
    pub fn callbacks(&self) -> Vec<Callback<T>> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect()
    }

    /// Call every registered callback with `value`, in registration order.
    pub fn notify(&self, value: &T) {
        for callback in self.callbacks() {
            callback(value);
        }
    }
}

impl<T: ?Sized> fmt::Debug for ListenerList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerList")
            .field("len", &self.len())
            .finish()
    }
}
