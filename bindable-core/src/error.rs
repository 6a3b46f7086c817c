//! Error types for bindable operations.
//!
//! Guard failures (`Disabled`, `LeaseActive`, `AlreadyBound`, ...) are
//! ordinary caller mistakes. `InstanceTypeMismatch`, `NoActiveLease` and
//! `LeaseMismatch` indicate a broken invariant inside the binding graph.

use thiserror::Error;

use crate::binding::{BindableId, BindableKind};

/// Result type used throughout the crate.
pub type Result<T, E = BindableError> = std::result::Result<T, E>;

/// Errors raised by bindable operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindableError {
    /// `bind_to` targeted a peer that is already linked.
    #[error("An already bound bindable cannot be bound again.")]
    AlreadyBound,

    /// `bind_to` targeted the bindable itself.
    #[error("A bindable cannot be bound to itself.")]
    SelfBind,

    /// A direct value write hit a disabled bindable.
    #[error("Can not set value as bindable {id} is disabled.")]
    Disabled { id: BindableId },

    /// A direct write, or a bind that would overwrite state, hit a leased
    /// binding component.
    #[error("Cannot perform this operation on a Bindable that is currently in a leased state.")]
    LeaseActive,

    /// `begin_lease` found an existing lease in the connected component.
    #[error("Attempted to lease a bindable that is already in a leased state.")]
    AlreadyLeased,

    /// `return_lease` was called on a leased bindable that has no source.
    #[error("Must return from original leased source.")]
    ReturnWithoutSource,

    /// A returned leased bindable was mutated.
    #[error("Cannot perform operations on a LeasedBindable that has been returned.")]
    LeaseReturned,

    /// `end_lease` was called on a bindable without a lease.
    #[error("Attempted to end a lease without beginning one.")]
    NoActiveLease,

    /// `end_lease` was handed a different holder than `begin_lease` produced.
    #[error(
        "Attempted to end a lease but returned a different bindable to the one used to start the lease."
    )]
    LeaseMismatch,

    /// The bound-copy factory produced the wrong variant.
    #[error(
        "Attempted to create a copy of {expected:?} bindable, but the returned instance type was {actual:?}."
    )]
    InstanceTypeMismatch {
        expected: BindableKind,
        actual: BindableKind,
    },

    /// `unbind_from` targeted a peer that is not linked.
    #[error("Trying to unbind from a bindable that is not bound.")]
    NotBound,
}

impl BindableError {
    /// Whether this error signals a broken graph invariant rather than a
    /// rejected caller request.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            BindableError::InstanceTypeMismatch { .. }
                | BindableError::NoActiveLease
                | BindableError::LeaseMismatch
        )
    }
}
