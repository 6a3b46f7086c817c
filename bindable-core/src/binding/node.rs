//! Bindable Internals
//!
//! [`Node`] is the shared state behind every bindable handle: the value and
//! disabled flag, the two change channels, the link set, and the lease slot.
//! All graph algorithms operate on `Arc<Node<T>>` so that peers reached
//! through weak links behave exactly like the handle a caller holds.
//!
//! # Propagation
//!
//! A mutation updates local state, then pushes the same change to every live
//! peer except the one it came from. Each peer either already holds the new
//! value (and stops) or repeats the process excluding its own sender, so the
//! wave terminates on cyclic graphs without a visited set.
//!
//! Once the wave returns, the local channel fires if the local state is
//! still what this call wrote. A concurrent writer that changed it in the
//! meantime will fire its own notification for the final value.
//!
//! # Locking
//!
//! Each node has independent locks for its state, links and lease slot.
//! At most one of them is held at a time, and none is held while visiting a
//! peer or invoking an observer.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use super::lease::{LeaseState, LeaseTicket};
use super::weak_list::WeakList;
use crate::error::{BindableError, Result};
use crate::event::{Event, ValueChangedEvent};

/// Unique identifier for a bindable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindableId(u64);

impl BindableId {
    /// Generate a new unique bindable ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for BindableId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BindableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bindable#{}", self.0)
    }
}

/// The concrete variant of a bindable.
///
/// Bound copies always share the variant of their source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindableKind {
    /// An ordinary bindable. Direct writes respect the disabled flag.
    Plain,

    /// A lease holder, or a bound copy of one. Writes bypass the disabled
    /// flag of the leased component.
    Leased,
}

#[derive(Debug)]
struct State<T> {
    value: T,
    disabled: bool,
}

pub(crate) struct Node<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    id: BindableId,
    kind: BindableKind,
    state: Mutex<State<T>>,
    pub(crate) value_changed: Event<ValueChangedEvent<T>>,
    pub(crate) disabled_changed: Event<bool>,
    pub(super) bindings: WeakList<Node<T>>,

    /// Present while this bindable is the source of an active lease.
    pub(super) lease: Mutex<Option<Arc<LeaseState<T>>>>,

    /// Present on a lease holder created by `begin_lease`. Bound copies of a
    /// holder are `Leased` but carry no ticket.
    pub(super) ticket: Option<LeaseTicket<T>>,
}

impl<T> Node<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    pub(crate) fn new(
        kind: BindableKind,
        value: T,
        disabled: bool,
        ticket: Option<LeaseTicket<T>>,
    ) -> Self {
        Self {
            id: BindableId::new(),
            kind,
            state: Mutex::new(State { value, disabled }),
            value_changed: Event::new(),
            disabled_changed: Event::new(),
            bindings: WeakList::new(),
            lease: Mutex::new(None),
            ticket,
        }
    }

    pub(crate) fn id(&self) -> BindableId {
        self.id
    }

    pub(crate) fn kind(&self) -> BindableKind {
        self.kind
    }

    pub(crate) fn value(&self) -> T {
        self.state.lock().value.clone()
    }

    pub(crate) fn disabled(&self) -> bool {
        self.state.lock().disabled
    }

    pub(crate) fn binding_count(&self) -> usize {
        self.bindings.len()
    }

    /// The per-variant factory used by `get_bound_copy`.
    pub(crate) fn create_instance(&self) -> Arc<Self> {
        let state = self.state.lock();
        Arc::new(Self::new(
            self.kind,
            state.value.clone(),
            state.disabled,
            None,
        ))
    }

    // ------------------------------------------------------------------------
    // Guarded writes
    // ------------------------------------------------------------------------

    /// Direct value write from the embedding code.
    pub(crate) fn set_value(self: &Arc<Self>, value: T) -> Result<()> {
        match self.kind {
            BindableKind::Leased => self.ensure_not_returned()?,
            BindableKind::Plain => {
                if self.disabled() {
                    return Err(BindableError::Disabled { id: self.id });
                }
                // the holder may have re-enabled the component
                if self.component_leased() {
                    return Err(BindableError::LeaseActive);
                }
            }
        }

        self.apply_value(value, None);
        Ok(())
    }

    /// Direct disabled write from the embedding code.
    pub(crate) fn set_disabled(self: &Arc<Self>, disabled: bool) -> Result<()> {
        match self.kind {
            BindableKind::Leased => self.ensure_not_returned()?,
            BindableKind::Plain => {
                if self.component_leased() {
                    return Err(BindableError::LeaseActive);
                }
            }
        }

        self.apply_disabled(disabled, None);
        Ok(())
    }

    fn ensure_not_returned(&self) -> Result<()> {
        match &self.ticket {
            Some(ticket) if ticket.state.is_returned() => Err(BindableError::LeaseReturned),
            _ => Ok(()),
        }
    }

    // ------------------------------------------------------------------------
    // Propagation
    // ------------------------------------------------------------------------

    /// Write `value` locally and push it through the graph.
    ///
    /// Never guarded: a disabled peer still receives changes that originate
    /// elsewhere in its component.
    pub(crate) fn apply_value(self: &Arc<Self>, value: T, source: Option<&Arc<Self>>) {
        let old = {
            let mut state = self.state.lock();
            if state.value == value {
                return;
            }
            std::mem::replace(&mut state.value, value.clone())
        };

        trace!(bindable = %self.id, source = ?source.map(|s| s.id), "value changed");
        self.propagate_value(old, value, source);
    }

    fn propagate_value(self: &Arc<Self>, old: T, value: T, source: Option<&Arc<Self>>) {
        self.bindings.for_each_live(source, |peer| {
            peer.apply_value(value.clone(), Some(self));
        });

        if self.state.lock().value == value {
            self.value_changed
                .invoke(&ValueChangedEvent::new(old, value));
        } else {
            trace!(bindable = %self.id, "value overwritten during propagation, event suppressed");
        }
    }

    pub(crate) fn apply_disabled(self: &Arc<Self>, disabled: bool, source: Option<&Arc<Self>>) {
        {
            let mut state = self.state.lock();
            if state.disabled == disabled {
                return;
            }
            state.disabled = disabled;
        }

        trace!(bindable = %self.id, disabled, "disabled changed");
        self.propagate_disabled(disabled, source);
    }

    fn propagate_disabled(self: &Arc<Self>, disabled: bool, source: Option<&Arc<Self>>) {
        self.bindings.for_each_live(source, |peer| {
            peer.apply_disabled(disabled, Some(self));
        });

        if self.state.lock().disabled == disabled {
            self.disabled_changed.invoke(&disabled);
        } else {
            trace!(bindable = %self.id, "disabled overwritten during propagation, event suppressed");
        }
    }

    // ------------------------------------------------------------------------
    // Links
    // ------------------------------------------------------------------------

    /// Link `self` and `peer`, adopting the peer's value and disabled flag.
    pub(crate) fn bind_to(self: &Arc<Self>, peer: &Arc<Self>) -> Result<()> {
        if Arc::ptr_eq(self, peer) {
            return Err(BindableError::SelfBind);
        }
        if self.bindings.contains(peer) {
            return Err(BindableError::AlreadyBound);
        }
        if self.component_leased() {
            // adopting the peer's state would write past the lease
            if self.kind == BindableKind::Plain {
                return Err(BindableError::LeaseActive);
            }
            if peer.component_leased() {
                return Err(BindableError::AlreadyLeased);
            }
        }

        let (value, disabled) = {
            let state = peer.state.lock();
            (state.value.clone(), state.disabled)
        };
        self.apply_value(value, None);
        self.apply_disabled(disabled, None);

        self.bindings.add(peer);
        peer.bindings.add(self);

        debug!(bindable = %self.id, peer = %peer.id, "bound");
        Ok(())
    }

    pub(crate) fn unbind_from(self: &Arc<Self>, peer: &Arc<Self>) -> Result<()> {
        if !self.bindings.remove(peer) {
            return Err(BindableError::NotBound);
        }
        peer.bindings.remove(self);

        debug!(bindable = %self.id, peer = %peer.id, "unbound");
        Ok(())
    }

    /// End any lease this bindable takes part in, then drop every observer
    /// and every link.
    pub(crate) fn unbind_all(self: &Arc<Self>) -> Result<()> {
        if let Some(ticket) = &self.ticket {
            self.finish_lease(ticket)?;
        }

        let active = self.lease.lock().clone();
        if let Some(state) = active {
            match state.holder() {
                Some(holder) => {
                    debug!(bindable = %self.id, holder = %holder.id, "implicitly returning lease");
                    holder.return_lease()?;
                }
                None => self.release_orphaned_lease(&state),
            }
        }

        self.value_changed.clear();
        self.disabled_changed.clear();

        if self.bindings.is_empty() {
            return Ok(());
        }
        for peer in self.bindings.live() {
            self.bindings.remove(&peer);
            peer.bindings.remove(self);
            trace!(bindable = %self.id, peer = %peer.id, "unbound");
        }
        Ok(())
    }
}

impl<T> fmt::Debug for Node<T>
where
    T: Clone + PartialEq + Send + Sync + fmt::Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Bindable")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("value", &state.value)
            .field("disabled", &state.disabled)
            .field("binding_count", &self.bindings.len())
            .finish()
    }
}
