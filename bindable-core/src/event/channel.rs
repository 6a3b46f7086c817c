//! Event Channel
//!
//! A small multicast channel: observers are registered, unregistered by
//! [`ObserverId`], invoked in registration order, and cleared in bulk.
//!
//! # Thread Safety
//!
//! The observer table sits behind a mutex, but the lock is only held long
//! enough to copy out the current observers. Callbacks run without it, so an
//! observer may register, unregister, or mutate the bindable that fired it.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;

use super::ObserverId;

type Observer<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// A multicast event channel carrying payloads of type `E`.
pub struct Event<E> {
    observers: Mutex<IndexMap<ObserverId, Observer<E>>>,
}

impl<E> Event<E> {
    /// Create a channel with no observers.
    pub fn new() -> Self {
        Self {
            observers: Mutex::new(IndexMap::new()),
        }
    }

    /// Register an observer, returning the handle used to unregister it.
    pub fn register<F>(&self, observer: F) -> ObserverId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = ObserverId::new();
        self.observers.lock().insert(id, Arc::new(observer));
        id
    }

    /// Remove an observer. Returns `false` if it was not registered.
    pub fn unregister(&self, id: ObserverId) -> bool {
        // shift_remove keeps the remaining observers in registration order
        self.observers.lock().shift_remove(&id).is_some()
    }

    /// Invoke every registered observer, in registration order.
    pub fn invoke(&self, payload: &E) {
        let observers: Vec<Observer<E>> = self.observers.lock().values().cloned().collect();
        for observer in observers {
            observer(payload);
        }
    }

    /// Remove all observers.
    pub fn clear(&self) {
        self.observers.lock().clear();
    }

    /// Number of registered observers.
    pub fn len(&self) -> usize {
        self.observers.lock().len()
    }

    /// Whether no observers are registered.
    pub fn is_empty(&self) -> bool {
        self.observers.lock().is_empty()
    }
}

impl<E> Default for Event<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for Event<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("observer_count", &self.len())
            .finish()
    }
}
