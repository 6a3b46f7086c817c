//! Link Set
//!
//! A bindable's links to its peers. Entries are [`Weak`] handles: a bindable
//! never keeps a peer alive, so a fully connected group of bindables can
//! still be dropped one member at a time. Dead entries are purged lazily,
//! whenever the set is traversed or measured.
//!
//! # Locking
//!
//! Every operation takes the set's own lock and releases it before
//! returning. Traversal hands the caller a snapshot of strong handles, so the
//! caller can visit peers (and take their locks) without holding this one.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use smallvec::SmallVec;

/// Most bindables have only a handful of links.
type Entries<N> = SmallVec<[Weak<N>; 4]>;

/// A set of weak links to peer nodes.
pub(crate) struct WeakList<N> {
    entries: Mutex<Entries<N>>,
}

fn points_to<N>(entry: &Weak<N>, target: &Arc<N>) -> bool {
    std::ptr::eq(entry.as_ptr(), Arc::as_ptr(target))
}

impl<N> WeakList<N> {
    pub(crate) fn new() -> Self {
        Self {
            entries: Mutex::new(SmallVec::new()),
        }
    }

    /// Add a link to `node`. Does nothing if a link to it is already present.
    /// Purges dead entries.
    pub(crate) fn add(&self, node: &Arc<N>) -> bool {
        let mut entries = self.entries.lock();
        entries.retain(|entry| entry.strong_count() > 0);
        if entries.iter().any(|entry| points_to(entry, node)) {
            return false;
        }
        entries.push(Arc::downgrade(node));
        true
    }

    /// Remove the link to `node`. Returns `false` if there was none.
    pub(crate) fn remove(&self, node: &Arc<N>) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|entry| !points_to(entry, node));
        entries.len() != before
    }

    /// Whether some live entry resolves to `node`.
    pub(crate) fn contains(&self, node: &Arc<N>) -> bool {
        self.entries
            .lock()
            .iter()
            .any(|entry| entry.strong_count() > 0 && points_to(entry, node))
    }

    /// Number of live entries. Purges dead ones.
    pub(crate) fn len(&self) -> usize {
        let mut entries = self.entries.lock();
        entries.retain(|entry| entry.strong_count() > 0);
        entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Strong handles to every live entry, in insertion order. Purges dead
    /// entries encountered along the way.
    pub(crate) fn live(&self) -> Vec<Arc<N>> {
        let mut entries = self.entries.lock();
        let mut live = Vec::with_capacity(entries.len());
        entries.retain(|entry| match entry.upgrade() {
            Some(node) => {
                live.push(node);
                true
            }
            None => false,
        });
        live
    }

    /// Run `action` on every live entry except `exclude`.
    ///
    /// The lock is released before the first call to `action`.
    pub(crate) fn for_each_live<F>(&self, exclude: Option<&Arc<N>>, mut action: F)
    where
        F: FnMut(&Arc<N>),
    {
        for node in self.live() {
            if exclude.is_some_and(|excluded| Arc::ptr_eq(excluded, &node)) {
                continue;
            }
            action(&node);
        }
    }
}

impl<N> Default for WeakList<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N> fmt::Debug for WeakList<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakList")
            .field("entries", &self.entries.lock().len())
            .finish()
    }
}
