//! Bindable Implementation
//!
//! A [`Bindable`] is a mutable cell holding a value and a disabled flag. It
//! can be bound to other bindables of the same value type so that changes to
//! either flow to the other, and on through everything they are bound to.
//!
//! # How Binding Works
//!
//! 1. `a.bind_to(&b)` makes `b` authoritative: `a` adopts `b`'s value and
//!    disabled flag, then both sides record a weak link to each other.
//!
//! 2. A write on any member updates the whole connected component, firing
//!    each member's change observers once.
//!
//! 3. Links never keep a peer alive. Dropping the last handle to a bindable
//!    removes it from the graph; peers forget it on their next traversal.
//!
//! # Thread Safety
//!
//! `Bindable<T>` is `Send + Sync`. Each bindable guards its own state with
//! its own locks and no lock spans more than one bindable, so a propagation
//! wave is not atomic against a concurrent writer elsewhere in the graph.
//! Observers run without any lock held and may mutate the graph, including
//! the bindable that fired them.

use std::fmt;
use std::sync::Arc;

use super::node::{BindableId, BindableKind, Node};
use super::lease::LeasedBindable;
use crate::error::{BindableError, Result};
use crate::event::{Event, ObserverId, ValueChangedEvent};

/// A bindable value cell.
///
/// Cloning a `Bindable` yields another handle to the same cell. Use
/// [`Bindable::get_bound_copy`] for a separate cell bound to this one.
///
/// # Example
///
/// ```rust
/// use bindable_core::Bindable;
///
/// let volume = Bindable::new(10);
/// let slider = volume.get_bound_copy().unwrap();
///
/// slider.set_value(25).unwrap();
/// assert_eq!(volume.value(), 25);
/// ```
pub struct Bindable<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    node: Arc<Node<T>>,
}

impl<T> Bindable<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create a new, enabled bindable with the given initial value.
    pub fn new(value: T) -> Self {
        Self::with_disabled(value, false)
    }

    /// Create a new bindable with the given initial value and disabled flag.
    pub fn with_disabled(value: T, disabled_by_default: bool) -> Self {
        Self::from_node(Arc::new(Node::new(
            BindableKind::Plain,
            value,
            disabled_by_default,
            None,
        )))
    }

    pub(crate) fn from_node(node: Arc<Node<T>>) -> Self {
        Self { node }
    }

    pub(crate) fn node(&self) -> &Arc<Node<T>> {
        &self.node
    }

    /// Get the bindable's unique ID.
    pub fn id(&self) -> BindableId {
        self.node.id()
    }

    /// The concrete variant of this bindable.
    pub fn kind(&self) -> BindableKind {
        self.node.kind()
    }

    // ------------------------------------------------------------------------
    // Value
    // ------------------------------------------------------------------------

    /// Get the current value.
    pub fn value(&self) -> T {
        self.node.value()
    }

    /// Set a new value and propagate it to every bound peer.
    ///
    /// Fails with [`BindableError::Disabled`] while disabled, and with
    /// [`BindableError::LeaseActive`] while any bindable in the connected
    /// component is leased, unless this is a lease holder. Setting the
    /// current value again is a no-op.
    pub fn set_value(&self, value: T) -> Result<()> {
        self.node.set_value(value)
    }

    /// Update the value using a function of the current one.
    pub fn update<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&T) -> T,
    {
        let next = f(&self.value());
        self.set_value(next)
    }

    /// The channel fired when the value changes.
    pub fn value_changed(&self) -> &Event<ValueChangedEvent<T>> {
        &self.node.value_changed
    }

    /// Observe value changes, optionally running the observer once right
    /// away with the current value as both old and new value.
    pub fn bind_value_changed<F>(&self, on_value_changed: F, run_immediately: bool) -> ObserverId
    where
        F: Fn(&ValueChangedEvent<T>) + Send + Sync + 'static,
    {
        if run_immediately {
            let current = self.value();
            on_value_changed(&ValueChangedEvent::new(current.clone(), current));
        }
        self.node.value_changed.register(on_value_changed)
    }

    // ------------------------------------------------------------------------
    // Disabled
    // ------------------------------------------------------------------------

    /// Whether this bindable is disabled.
    pub fn disabled(&self) -> bool {
        self.node.disabled()
    }

    /// Set the disabled flag and propagate it to every bound peer.
    ///
    /// Fails with [`BindableError::LeaseActive`] while any bindable in the
    /// connected component is leased, unless this is the lease holder.
    pub fn set_disabled(&self, disabled: bool) -> Result<()> {
        self.node.set_disabled(disabled)
    }

    /// The channel fired when the disabled flag changes.
    pub fn disabled_changed(&self) -> &Event<bool> {
        &self.node.disabled_changed
    }

    /// Observe disabled changes, optionally running the observer once
    /// right away with the current flag.
    pub fn bind_disabled_changed<F>(&self, on_disabled_changed: F, run_immediately: bool) -> ObserverId
    where
        F: Fn(&bool) + Send + Sync + 'static,
    {
        if run_immediately {
            on_disabled_changed(&self.disabled());
        }
        self.node.disabled_changed.register(on_disabled_changed)
    }

    // ------------------------------------------------------------------------
    // Binding
    // ------------------------------------------------------------------------

    /// Bind to `them`, adopting their value and disabled flag.
    ///
    /// `them` should be the more permanent side of the binding.
    pub fn bind_to(&self, them: &Bindable<T>) -> Result<()> {
        self.node.bind_to(&them.node)
    }

    /// Bind every bindable in `them` to `self`, so `self` is authoritative.
    ///
    /// Stops at the first failure; bindings made before it are kept.
    pub fn bind_to_many<'a, I>(&self, them: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a Bindable<T>>,
    {
        for other in them {
            other.bind_to(self)?;
        }
        Ok(())
    }

    /// Remove the binding between `self` and `them`.
    ///
    /// The current value and disabled flag are kept on both sides.
    pub fn unbind_from(&self, them: &Bindable<T>) -> Result<()> {
        self.node.unbind_from(&them.node)
    }

    /// Return any lease this bindable is part of, then drop all observers
    /// and all bindings.
    pub fn unbind_all(&self) -> Result<()> {
        self.node.unbind_all()
    }

    /// Whether `them` is directly bound to `self`.
    pub fn is_bound_to(&self, them: &Bindable<T>) -> bool {
        self.node.bindings.contains(&them.node)
    }

    /// Number of live bindings.
    pub fn binding_count(&self) -> usize {
        self.node.binding_count()
    }

    /// Create a new bindable of the same variant, bound to this one.
    ///
    /// The copy is only weakly referenced by `self`: keep the returned
    /// handle alive for as long as it should receive changes.
    pub fn get_bound_copy(&self) -> Result<Bindable<T>> {
        self.bound_copy_with(|source| source.create_instance())
    }

    fn bound_copy_with<F>(&self, factory: F) -> Result<Bindable<T>>
    where
        F: FnOnce(&Node<T>) -> Arc<Node<T>>,
    {
        let copy = factory(self.node.as_ref());
        if copy.kind() != self.node.kind() {
            return Err(BindableError::InstanceTypeMismatch {
                expected: self.node.kind(),
                actual: copy.kind(),
            });
        }

        copy.bind_to(&self.node)?;
        Ok(Bindable::from_node(copy))
    }

    // ------------------------------------------------------------------------
    // Leasing
    // ------------------------------------------------------------------------

    /// Take out an exclusive lease on this bindable.
    ///
    /// The bindable and everything bound to it become disabled until the
    /// lease is returned; writes go through the returned [`LeasedBindable`].
    /// With `revert_value_on_return` the current value is restored when the
    /// lease ends. The disabled flag is always restored.
    pub fn begin_lease(&self, revert_value_on_return: bool) -> Result<LeasedBindable<T>> {
        self.node
            .begin_lease(revert_value_on_return)
            .map(LeasedBindable::from_node)
    }

    /// Whether this bindable is the source of an active lease.
    pub fn is_leased(&self) -> bool {
        self.node.is_leased()
    }
}

impl<T> Clone for Bindable<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            node: Arc::clone(&self.node),
        }
    }
}

/// Handles compare by identity, not by value.
impl<T> PartialEq for Bindable<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.node, &other.node)
    }
}

impl<T> Eq for Bindable<T> where T: Clone + PartialEq + Send + Sync + 'static {}

impl<T> fmt::Debug for Bindable<T>
where
    T: Clone + PartialEq + Send + Sync + fmt::Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.node, f)
    }
}
