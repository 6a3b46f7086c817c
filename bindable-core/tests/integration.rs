//! Integration Tests for Binding
//!
//! These tests verify that bindables, bound copies and leases work together
//! across a whole binding graph.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use bindable_core::{Bindable, BindableError, BindableKind};

fn counter<T>(bindable: &Bindable<T>) -> Arc<AtomicI32>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    let count = Arc::new(AtomicI32::new(0));
    let count_clone = count.clone();
    bindable.bind_value_changed(
        move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        },
        false,
    );
    count
}

/// Binding adopts the peer's value and disabled flag.
#[test]
fn bind_makes_peer_authoritative() {
    let a = Bindable::new(1);
    let b = Bindable::with_disabled(2, true);

    a.bind_to(&b).unwrap();
    assert_eq!(a.value(), 2);
    assert_eq!(a.value(), b.value());
    assert!(a.disabled());
    assert_eq!(a.disabled(), b.disabled());
}

/// Changes flow through chains of bound copies in both directions.
#[test]
fn bound_copies_propagate_along_a_chain() {
    let default_value = String::from("Cellinia Texas");

    let bindable1 = Bindable::new(default_value.clone());
    let bindable2 = bindable1.get_bound_copy().unwrap();
    let bindable3 = bindable2.get_bound_copy().unwrap();

    assert_eq!(bindable2.value(), default_value);
    assert_eq!(bindable3.value(), default_value);

    bindable1.set_value(String::from("Texas")).unwrap();
    assert_eq!(bindable2.value(), "Texas");
    assert_eq!(bindable3.value(), "Texas");

    bindable3.set_value(String::from("Cellinia")).unwrap();
    assert_eq!(bindable1.value(), "Cellinia");
    assert_eq!(bindable2.value(), "Cellinia");
}

/// A write on one side of a mixed chain reaches a copy of the other side.
#[test]
fn binding_is_transitive() {
    let a = Bindable::new(0);
    let b = Bindable::new(0);
    a.bind_to(&b).unwrap();
    let c = b.get_bound_copy().unwrap();

    a.set_value(42).unwrap();
    assert_eq!(b.value(), 42);
    assert_eq!(c.value(), 42);
}

/// Bound copies inherit the disabled flag.
#[test]
fn bound_copies_share_disabled_state() {
    let bindable1 = Bindable::with_disabled("Cellinia Texas", true);
    let bindable2 = bindable1.get_bound_copy().unwrap();
    let bindable3 = bindable2.get_bound_copy().unwrap();

    assert!(bindable2.disabled());
    assert!(bindable3.disabled());
    assert_eq!(bindable3.kind(), BindableKind::Plain);
}

/// Disabled writes fail on every member once the flag propagates.
#[test]
fn disabled_flag_propagates_and_guards_writes() {
    let a = Bindable::new(1);
    let b = a.get_bound_copy().unwrap();

    a.set_disabled(true).unwrap();
    assert!(b.disabled());
    assert!(matches!(b.set_value(2), Err(BindableError::Disabled { .. })));
    assert_eq!(a.value(), 1);

    b.set_disabled(false).unwrap();
    assert!(!a.disabled());
    b.set_value(2).unwrap();
    assert_eq!(a.value(), 2);
}

/// A three-node cycle terminates and notifies each node once.
#[test]
fn cycle_terminates_with_one_event_per_node() {
    let a = Bindable::new(0);
    let b = Bindable::new(0);
    let c = Bindable::new(0);
    b.bind_to(&a).unwrap();
    c.bind_to(&b).unwrap();
    a.bind_to(&c).unwrap();

    let a_count = counter(&a);
    let b_count = counter(&b);
    let c_count = counter(&c);

    a.set_value(7).unwrap();
    assert_eq!(b.value(), 7);
    assert_eq!(c.value(), 7);
    assert_eq!(a_count.load(Ordering::SeqCst), 1);
    assert_eq!(b_count.load(Ordering::SeqCst), 1);
    assert_eq!(c_count.load(Ordering::SeqCst), 1);

    c.set_value(8).unwrap();
    assert_eq!(a.value(), 8);
    assert_eq!(a_count.load(Ordering::SeqCst), 2);
    assert_eq!(b_count.load(Ordering::SeqCst), 2);
    assert_eq!(c_count.load(Ordering::SeqCst), 2);
}

/// Every peer observes the same old and new value.
#[test]
fn peers_receive_old_and_new_value() {
    let a = Bindable::new(1);
    let b = a.get_bound_copy().unwrap();
    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));

    let seen_clone = seen.clone();
    b.bind_value_changed(
        move |event| seen_clone.lock().push((event.old_value, event.new_value)),
        false,
    );

    a.set_value(2).unwrap();
    a.set_value(3).unwrap();
    assert_eq!(*seen.lock(), vec![(1, 2), (2, 3)]);
}

/// Dropping a bound copy removes it from the graph.
#[test]
fn dropped_copy_is_purged() {
    let source = Bindable::new(0);
    let copy = source.get_bound_copy().unwrap();
    assert_eq!(source.binding_count(), 1);

    drop(copy);
    assert_eq!(source.binding_count(), 0);
    source.set_value(1).unwrap();
}

/// A fully connected group frees every member once its handles are gone.
#[test]
fn fully_connected_group_is_freed() {
    let nodes: Vec<_> = (0..4).map(Bindable::new).collect();
    for (i, node) in nodes.iter().enumerate() {
        for other in &nodes[i + 1..] {
            node.bind_to(other).unwrap();
        }
    }
    assert!(nodes.iter().all(|n| n.binding_count() == 3));

    let survivor = nodes[0].clone();
    drop(nodes);
    assert_eq!(survivor.binding_count(), 0);
}

/// An observer may mutate other bindables while a wave is running.
#[test]
fn observer_can_mutate_graph_during_propagation() {
    let a = Bindable::new(0);
    let b = a.get_bound_copy().unwrap();
    let mirror = Bindable::new(0);

    let mirror_clone = mirror.clone();
    b.bind_value_changed(
        move |event| {
            mirror_clone.set_value(event.new_value * 10).unwrap();
        },
        false,
    );

    a.set_value(3).unwrap();
    assert_eq!(mirror.value(), 30);
}

/// An observer may unbind the bindable that fired it.
#[test]
fn observer_can_unbind_during_propagation() {
    let a = Bindable::new(0);
    let b = a.get_bound_copy().unwrap();
    let c = b.get_bound_copy().unwrap();

    let a_clone = a.clone();
    let b_clone = b.clone();
    b.bind_value_changed(
        move |_| {
            let _ = b_clone.unbind_from(&a_clone);
        },
        false,
    );

    a.set_value(1).unwrap();
    assert_eq!(c.value(), 1);
    assert!(!a.is_bound_to(&b));

    a.set_value(2).unwrap();
    assert_eq!(b.value(), 1);
}

/// Concurrent writers never deadlock or corrupt the link sets.
#[test]
fn concurrent_writes_keep_links_intact() {
    let nodes: Vec<_> = (0..6).map(|_| Bindable::new(0i64)).collect();
    for pair in nodes.windows(2) {
        pair[1].bind_to(&pair[0]).unwrap();
    }

    std::thread::scope(|scope| {
        for (i, node) in nodes.iter().enumerate() {
            scope.spawn(move || {
                for round in 0..200 {
                    node.set_value((i as i64) * 1_000 + round).unwrap();
                }
            });
        }
    });

    assert_eq!(nodes[0].binding_count(), 1);
    assert!(nodes[1..5].iter().all(|n| n.binding_count() == 2));
    assert_eq!(nodes[5].binding_count(), 1);

    nodes[0].set_value(-1).unwrap();
    assert!(nodes.iter().all(|n| n.value() == -1));
}

/// bind_to_many binds each peer to the receiver.
#[test]
fn bind_to_many_adopts_receiver_value() {
    let bindable = Bindable::new(0);
    let bindable2 = Bindable::new(1);
    let bindable3 = Bindable::new(2);

    bindable.bind_to_many([&bindable2, &bindable3]).unwrap();
    assert_eq!(bindable.value(), 0);
    assert_eq!(bindable2.value(), 0);
    assert_eq!(bindable3.value(), 0);

    bindable2.set_value(5).unwrap();
    assert_eq!(bindable3.value(), 5);
}
