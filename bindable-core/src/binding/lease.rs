//! Leasing
//!
//! A lease grants exclusive write access over a bindable and, through its
//! links, over its whole connected component.
//!
//! # State Machine
//!
//! ```text
//! Unleased --begin_lease--> Leased --return_lease / unbind_all--> Unleased
//! ```
//!
//! While leased, the source and every peer are forced disabled and direct
//! disabled writes anywhere in the component are refused. The
//! [`LeasedBindable`] returned by `begin_lease` is bound to the source and
//! keeps writing through the disabled flag until it is returned.
//!
//! The source keeps a weak reference to its holder. Dropping a
//! `LeasedBindable` without returning it leaves the component leased until
//! the source calls `unbind_all`.

use std::collections::HashSet;
use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use tracing::debug;

use super::bindable::Bindable;
use super::node::{BindableKind, Node};
use crate::error::{BindableError, Result};

/// Bookkeeping for one lease, shared by the source's lease slot and the
/// holder's ticket.
pub(crate) struct LeaseState<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    holder: Weak<Node<T>>,
    revert_value_on_return: bool,
    value_before: Option<T>,
    disabled_before: bool,
    returned: AtomicBool,
}

impl<T> LeaseState<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    pub(crate) fn holder(&self) -> Option<Arc<Node<T>>> {
        self.holder.upgrade()
    }

    pub(crate) fn is_returned(&self) -> bool {
        self.returned.load(Ordering::SeqCst)
    }

    fn is_held_by(&self, holder: &Arc<Node<T>>) -> bool {
        std::ptr::eq(self.holder.as_ptr(), Arc::as_ptr(holder))
    }
}

/// Carried by a lease holder: the source it leased and the lease it holds.
pub(crate) struct LeaseTicket<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    pub(crate) source: Arc<Node<T>>,
    pub(crate) state: Arc<LeaseState<T>>,
}

impl<T> Node<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Whether this bindable or anything reachable from it holds a lease.
    pub(crate) fn component_leased(self: &Arc<Self>) -> bool {
        let mut visited = HashSet::new();
        let mut pending = vec![Arc::clone(self)];

        while let Some(node) = pending.pop() {
            if !visited.insert(node.id()) {
                continue;
            }
            if node.lease.lock().is_some() {
                return true;
            }
            pending.extend(
                node.bindings
                    .live()
                    .into_iter()
                    .filter(|peer| !visited.contains(&peer.id())),
            );
        }
        false
    }

    pub(crate) fn is_leased(&self) -> bool {
        self.lease.lock().is_some()
    }

    pub(crate) fn begin_lease(self: &Arc<Self>, revert_value_on_return: bool) -> Result<Arc<Self>> {
        if self.component_leased() {
            return Err(BindableError::AlreadyLeased);
        }

        let value = self.value();
        let disabled = self.disabled();

        let holder = Arc::new_cyclic(|weak_holder| {
            let state = Arc::new(LeaseState {
                holder: weak_holder.clone(),
                revert_value_on_return,
                value_before: revert_value_on_return.then(|| value.clone()),
                disabled_before: disabled,
                returned: AtomicBool::new(false),
            });
            let ticket = LeaseTicket {
                source: Arc::clone(self),
                state,
            };
            Node::new(BindableKind::Leased, value, disabled, Some(ticket))
        });

        {
            let mut slot = self.lease.lock();
            if slot.is_some() {
                return Err(BindableError::AlreadyLeased);
            }
            if let Some(ticket) = &holder.ticket {
                *slot = Some(Arc::clone(&ticket.state));
            }
        }

        holder.bind_to(self)?;
        holder.apply_disabled(true, None);

        debug!(
            bindable = %self.id(),
            holder = %holder.id(),
            revert_value_on_return,
            "lease started"
        );
        Ok(holder)
    }

    /// Return the lease held by this bindable. `Ok(false)` when it was
    /// already returned.
    pub(crate) fn return_lease(self: &Arc<Self>) -> Result<bool> {
        let Some(ticket) = &self.ticket else {
            return Err(BindableError::ReturnWithoutSource);
        };
        if ticket.state.is_returned() {
            return Ok(false);
        }

        self.unbind_all()?;
        Ok(true)
    }

    /// Restore the pre-lease snapshot through the holder and release the
    /// source. Runs at most once per lease.
    pub(super) fn finish_lease(self: &Arc<Self>, ticket: &LeaseTicket<T>) -> Result<()> {
        let state = &ticket.state;
        if state.returned.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        // the holder may have been unbound from the source, so restore both
        if let Some(value) = state.value_before.clone() {
            self.apply_value(value.clone(), None);
            ticket.source.apply_value(value, None);
        }
        self.apply_disabled(state.disabled_before, None);
        ticket.source.apply_disabled(state.disabled_before, None);

        ticket.source.end_lease(self)?;
        debug!(
            bindable = %ticket.source.id(),
            holder = %self.id(),
            reverted = state.revert_value_on_return,
            "lease returned"
        );
        Ok(())
    }

    /// Source-side bookkeeping: clear the lease slot for `returned`.
    pub(crate) fn end_lease(&self, returned: &Arc<Self>) -> Result<()> {
        let mut slot = self.lease.lock();
        match slot.as_ref() {
            None => Err(BindableError::NoActiveLease),
            Some(state) if !state.is_held_by(returned) => Err(BindableError::LeaseMismatch),
            Some(_) => {
                *slot = None;
                Ok(())
            }
        }
    }

    /// End a lease whose holder was dropped without returning it.
    pub(super) fn release_orphaned_lease(self: &Arc<Self>, state: &Arc<LeaseState<T>>) {
        {
            let mut slot = self.lease.lock();
            match slot.as_ref() {
                Some(current) if Arc::ptr_eq(current, state) => *slot = None,
                _ => return,
            }
        }
        if state.returned.swap(true, Ordering::SeqCst) {
            return;
        }

        if let Some(value) = state.value_before.clone() {
            self.apply_value(value, None);
        }
        self.apply_disabled(state.disabled_before, None);
        debug!(bindable = %self.id(), "orphaned lease released");
    }
}

/// Exclusive write access to a bindable, obtained from
/// [`Bindable::begin_lease`].
///
/// Dereferences to the [`Bindable`] that stands in for the source. Writes
/// through it reach the source and its peers even though they are disabled.
pub struct LeasedBindable<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    inner: Bindable<T>,
}

impl<T> LeasedBindable<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    pub(crate) fn from_node(node: Arc<Node<T>>) -> Self {
        Self {
            inner: Bindable::from_node(node),
        }
    }

    /// End the lease on the source.
    ///
    /// Restores the disabled flag (and the value, if the lease was started
    /// with `revert_value_on_return`) and detaches from the source. Returns
    /// `Ok(false)` if the lease was already returned.
    pub fn return_lease(&self) -> Result<bool> {
        self.inner.node().return_lease()
    }

    /// Whether this lease has been returned.
    ///
    /// Always `false` for a bound copy of a lease holder.
    pub fn is_returned(&self) -> bool {
        self.inner
            .node()
            .ticket
            .as_ref()
            .is_some_and(|ticket| ticket.state.is_returned())
    }

    /// Create a privileged copy bound to this holder.
    ///
    /// The copy writes through the lease like the holder does, but it did
    /// not start the lease: `return_lease` on it fails with
    /// [`BindableError::ReturnWithoutSource`].
    pub fn get_bound_copy(&self) -> Result<LeasedBindable<T>> {
        let copy = self.inner.get_bound_copy()?;
        Ok(Self::from_node(Arc::clone(copy.node())))
    }

    /// The handle standing in for the source.
    pub fn as_bindable(&self) -> &Bindable<T> {
        &self.inner
    }
}

impl<T> Deref for LeasedBindable<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    type Target = Bindable<T>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<T> fmt::Debug for LeasedBindable<T>
where
    T: Clone + PartialEq + Send + Sync + fmt::Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LeasedBindable")
            .field("inner", &self.inner)
            .field("returned", &self.is_returned())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    fn end_lease_without_lease_fails() {
        let bindable = Bindable::new(1);
        let other = Bindable::new(0).begin_lease(true).unwrap();

        assert_eq!(
            bindable.node().end_lease(other.node()),
            Err(BindableError::NoActiveLease)
        );
    }

    #[test]
    fn end_lease_with_foreign_holder_fails() {
        let bindable = Bindable::new(1);
        let bindable2 = Bindable::new(0);
        let foreign = bindable2.begin_lease(true).unwrap();
        let _own = bindable.begin_lease(true).unwrap();

        assert_eq!(
            bindable.node().end_lease(foreign.node()),
            Err(BindableError::LeaseMismatch)
        );
        assert!(bindable.is_leased());
    }

    #[test]
    fn return_without_source_fails() {
        let bindable = Bindable::new(0);
        let leased = bindable.begin_lease(false).unwrap();
        let copy = leased.get_bound_copy().unwrap();

        assert_eq!(copy.return_lease(), Err(BindableError::ReturnWithoutSource));
        assert!(!copy.is_returned());
        assert!(bindable.is_leased());
    }

    #[test]
    fn component_scan_terminates_on_cycles() {
        let a = Bindable::new(0);
        let b = Bindable::new(0);
        let c = Bindable::new(0);
        b.bind_to(&a).unwrap();
        c.bind_to(&b).unwrap();
        a.bind_to(&c).unwrap();

        assert!(!a.node().component_leased());
        let _lease = c.begin_lease(false).unwrap();
        assert!(a.node().component_leased());
    }

    #[test]
    fn orphaned_lease_is_released_by_unbind_all() {
        let bindable = Bindable::new(1);
        {
            let leased = bindable.begin_lease(true).unwrap();
            leased.set_value(4).unwrap();
        }
        assert!(bindable.is_leased());
        assert_eq!(bindable.value(), 4);

        bindable.unbind_all().unwrap();
        assert!(!bindable.is_leased());
        assert_eq!(bindable.value(), 1);
        assert!(!bindable.disabled());
    }

    #[test]
    #[traced_test]
    fn lease_lifecycle_is_logged() {
        let bindable = Bindable::new(1);
        let leased = bindable.begin_lease(true).unwrap();
        leased.return_lease().unwrap();

        assert!(logs_contain("lease started"));
        assert!(logs_contain("lease returned"));
    }
}
