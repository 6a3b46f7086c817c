//! Binding Graph
//!
//! This module implements bindables and the graph of links between them.
//!
//! # Overview
//!
//! The binding graph is an undirected graph where:
//!
//! - Nodes are bindables, each owning its own value and disabled flag
//! - Edges are weak, symmetric links created by `bind_to`
//!
//! A write on any node is pushed along every edge except the one it arrived
//! on, so every node of a connected component ends up holding the same value
//! and disabled flag. The graph may contain cycles.
//!
//! # Design Decisions
//!
//! 1. Links are weak. No bindable owns another, so dropping handles is
//!    enough to free any part of the graph.
//!
//! 2. There is no central registry. Each bindable stores its own links
//!    behind its own lock, and propagation visits one bindable at a time.
//!
//! 3. Leases apply to a whole connected component: leasing any member
//!    disables all of them until the lease is returned.

mod bindable;
mod node;
mod lease;
mod weak_list;

pub use self::bindable::Bindable;
pub use self::node::{BindableId, BindableKind};
pub use self::lease::LeasedBindable;
