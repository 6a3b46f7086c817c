//! Bindable Core
//!
//! This crate provides bindable value cells: mutable cells holding a value
//! and a disabled flag that can be linked to one another so that changes
//! flow in both directions across everything linked together.
//!
//! It implements:
//!
//! - Bidirectional binding with weak, cycle-safe links
//! - Value and disabled change notifications
//! - Bound copies of an existing bindable
//! - Exclusive leases over a connected group of bindables
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `binding`: Bindables, the link graph, and leasing
//! - `event`: Change notification channels and their payloads
//! - `error`: The error type shared by all fallible operations
//!
//! # Example
//!
//! ```rust
//! use bindable_core::Bindable;
//!
//! let source = Bindable::new(1);
//! let copy = source.get_bound_copy().unwrap();
//!
//! source.set_value(5).unwrap();
//! assert_eq!(copy.value(), 5);
//!
//! let lease = source.begin_lease(true).unwrap();
//! lease.set_value(9).unwrap();
//! assert_eq!(copy.value(), 9);
//! assert!(copy.set_value(3).is_err());
//!
//! lease.return_lease().unwrap();
//! assert_eq!(source.value(), 5);
//! assert_eq!(copy.value(), 5);
//! ```

pub mod binding;
pub mod error;
pub mod event;

pub use binding::{Bindable, BindableId, BindableKind, LeasedBindable};
pub use error::{BindableError, Result};
pub use event::{Event, ObserverId, ValueChangedEvent};
