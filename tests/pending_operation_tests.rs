//! Operation queue and deferred listener change tests.
//!
//! These tests exercise reentrancy: operations queued from inside
//! callbacks, listener registration and removal mid-fan-out, and the
//! queries that look at queued work.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use proptest::prelude::*;

use gameplay_trigger::triggers::{TriggerContext, TriggerHandle, TriggerPhases};
use gameplay_trigger::{ListenerHandle, TagContainer, TriggerDispatcher, TriggerError, TriggerTag};

#[derive(Clone, Debug, Default)]
struct Sequence(usize);

fn tag(name: &str) -> TriggerTag {
    TriggerTag::new(name)
}

const TYPES: [&str; 3] = ["Queue.A", "Queue.B", "Queue.C"];

proptest! {
    /// Operations queued during a fan-out fire in the order they were queued,
    /// all after the fan-out that queued them.
    #[test]
    fn prop_reentrant_operations_fire_in_fifo_order(kinds in prop::collection::vec(0usize..TYPES.len(), 1..24)) {
        let dispatcher = TriggerDispatcher::new();
        let fired = Rc::new(RefCell::new(Vec::new()));

        for name in TYPES {
            let sink = Rc::clone(&fired);
            dispatcher
                .register_listener(tag(name), TriggerPhases::START, move |_, _, context| {
                    let sequence = context.data.get::<Sequence>().map(|s| s.0);
                    sink.borrow_mut().push(sequence);
                })
                .unwrap();
        }

        let plan = kinds.clone();
        let sink = Rc::clone(&fired);
        dispatcher
            .register_listener(tag("Queue.Root"), TriggerPhases::START, move |handle, _, _| {
                let dispatcher = handle.dispatcher().unwrap();
                for (index, kind) in plan.iter().enumerate() {
                    let context = dispatcher.make_trigger_context(tag(TYPES[*kind]), TagContainer::new(), None, None);
                    context.borrow_mut().data.insert(Sequence(index));
                    dispatcher.instantaneous_trigger(context).unwrap();
                }
                // Nothing queued has run yet.
                assert!(sink.borrow().is_empty());
                assert_eq!(dispatcher.pending_operation_count(), plan.len() + 1);
            })
            .unwrap();

        dispatcher
            .instantaneous_trigger_with(tag("Queue.Root"), TagContainer::new(), None, None)
            .unwrap();

        let expected: Vec<Option<usize>> = (0..kinds.len()).map(Some).collect();
        prop_assert_eq!(&*fired.borrow(), &expected);
        prop_assert_eq!(dispatcher.pending_operation_count(), 0);
    }
}

/// A listener added mid-fan-out misses the current firing but hears the next.
#[test]
fn test_listener_added_during_callback_waits_for_next_firing() {
    let dispatcher = TriggerDispatcher::new();
    let late_calls = Rc::new(Cell::new(0));
    let registered = Rc::new(Cell::new(false));

    let counter = Rc::clone(&late_calls);
    let once = Rc::clone(&registered);
    dispatcher
        .register_listener(tag("Hit"), TriggerPhases::START, move |handle, _, _| {
            if once.replace(true) {
                return;
            }
            let counter = Rc::clone(&counter);
            handle
                .dispatcher()
                .unwrap()
                .register_listener(TriggerTag::new("Hit"), TriggerPhases::START, move |_, _, _| {
                    counter.set(counter.get() + 1);
                })
                .unwrap();
        })
        .unwrap();

    dispatcher
        .instantaneous_trigger_with(tag("Hit"), TagContainer::new(), None, None)
        .unwrap();
    assert_eq!(late_calls.get(), 0);

    dispatcher
        .instantaneous_trigger_with(tag("Hit"), TagContainer::new(), None, None)
        .unwrap();
    assert_eq!(late_calls.get(), 1);
}

/// A listener removed mid-fan-out still hears the current firing, not the next.
#[test]
fn test_listener_removed_during_callback_finishes_current_firing() {
    let dispatcher = TriggerDispatcher::new();
    let victim_calls = Rc::new(Cell::new(0));
    let victim: Rc<RefCell<ListenerHandle>> = Rc::new(RefCell::new(ListenerHandle::empty()));

    let target = Rc::clone(&victim);
    dispatcher
        .register_listener(tag("Hit"), TriggerPhases::START, move |handle, _, _| {
            handle.dispatcher().unwrap().remove_listener(&target.borrow());
        })
        .unwrap();

    let counter = Rc::clone(&victim_calls);
    let registration = dispatcher
        .register_listener(tag("Hit"), TriggerPhases::START, move |_, _, _| {
            counter.set(counter.get() + 1);
        })
        .unwrap();
    *victim.borrow_mut() = registration.handle.clone();

    dispatcher
        .instantaneous_trigger_with(tag("Hit"), TagContainer::new(), None, None)
        .unwrap();
    assert_eq!(victim_calls.get(), 1);
    assert!(!registration.handle.is_valid());

    dispatcher
        .instantaneous_trigger_with(tag("Hit"), TagContainer::new(), None, None)
        .unwrap();
    assert_eq!(victim_calls.get(), 1);
    assert!(registration.removed.is_removed());
}

/// A listener may remove itself from its own callback.
#[test]
fn test_listener_removes_itself() {
    let dispatcher = TriggerDispatcher::new();
    let calls = Rc::new(Cell::new(0));
    let own: Rc<RefCell<ListenerHandle>> = Rc::new(RefCell::new(ListenerHandle::empty()));

    let counter = Rc::clone(&calls);
    let me = Rc::clone(&own);
    let registration = dispatcher
        .register_listener(tag("Hit"), TriggerPhases::START, move |handle, _, _| {
            counter.set(counter.get() + 1);
            handle.dispatcher().unwrap().remove_listener(&me.borrow());
        })
        .unwrap();
    *own.borrow_mut() = registration.handle.clone();

    for _ in 0..3 {
        dispatcher
            .instantaneous_trigger_with(tag("Hit"), TagContainer::new(), None, None)
            .unwrap();
    }
    assert_eq!(calls.get(), 1);

    let removed = registration.removed.clone();
    futures::executor::block_on(removed);
}

/// Staging areas are reflected by listener handle validity.
#[test]
fn test_listener_validity_through_staging() {
    let dispatcher = TriggerDispatcher::new();
    let registration = dispatcher
        .register_listener(tag("Hit"), TriggerPhases::START, |_, _, _| {})
        .unwrap();

    // Pending add.
    assert!(dispatcher.is_listener_handle_valid(&registration.handle));
    assert_eq!(dispatcher.listener_count(), 0);

    dispatcher
        .instantaneous_trigger_with(tag("Hit"), TagContainer::new(), None, None)
        .unwrap();
    assert!(dispatcher.is_listener_handle_valid(&registration.handle));
    assert_eq!(dispatcher.listener_count(), 1);

    // Pending remove.
    dispatcher.remove_listener(&registration.handle);
    assert!(!dispatcher.is_listener_handle_valid(&registration.handle));
    assert!(!registration.removed.is_removed());

    // Removing again is a no-op.
    dispatcher.remove_listener(&registration.handle);

    dispatcher
        .instantaneous_trigger_with(tag("Hit"), TagContainer::new(), None, None)
        .unwrap();
    assert_eq!(dispatcher.listener_count(), 0);
    assert!(registration.removed.is_removed());
}

/// While a start is still queued the trigger is pending, not active.
#[test]
fn test_active_or_pending_during_dispatch() {
    let dispatcher = TriggerDispatcher::new();
    let observed = Rc::new(RefCell::new(Vec::new()));

    let sink = Rc::clone(&observed);
    dispatcher
        .register_listener(tag("Root"), TriggerPhases::START, move |handle, _, _| {
            let dispatcher = handle.dispatcher().unwrap();
            let queued = dispatcher
                .start_trigger_with(TriggerTag::new("Buff"), TagContainer::new(), None, None)
                .unwrap();
            sink.borrow_mut().push((queued.is_active(), queued.is_active_or_pending()));

            dispatcher.end_trigger(&queued).unwrap();
            sink.borrow_mut().push((queued.is_active(), queued.is_active_or_pending()));

            // Nothing to update once the newest queued operation ends it.
            assert_eq!(
                dispatcher.get_trigger_context_for_update(&queued).map(|_| ()),
                Err(TriggerError::PendingRemoval(queued.to_string()))
            );
            assert!(dispatcher.end_trigger(&queued).is_err());
            assert!(dispatcher.is_processing());
        })
        .unwrap();

    dispatcher
        .instantaneous_trigger_with(tag("Root"), TagContainer::new(), None, None)
        .unwrap();

    assert_eq!(*observed.borrow(), vec![(false, true), (false, false)]);
    assert_eq!(dispatcher.active_trigger_count(), 0);
}

/// Updating a trigger whose start is still queued works on a copy.
#[test]
fn test_update_before_start_is_processed() {
    let dispatcher = TriggerDispatcher::new();
    let result = Rc::new(RefCell::new(None));

    let sink = Rc::clone(&result);
    dispatcher
        .register_listener(tag("Root"), TriggerPhases::START, move |handle, _, _| {
            let dispatcher = handle.dispatcher().unwrap();
            let original = dispatcher.make_trigger_context(TriggerTag::new("Buff"), TagContainer::new(), None, None);
            let queued = dispatcher.start_trigger(Rc::clone(&original)).unwrap();

            let copy = dispatcher.get_trigger_context_for_update(&queued).unwrap();
            assert!(!Rc::ptr_eq(&copy, &original));
            copy.borrow_mut().data.insert(Sequence(5));
            dispatcher.update_trigger(&queued, copy).unwrap();

            // The queued start still carries the untouched original.
            assert!(original.borrow().data.is_empty());
            *sink.borrow_mut() = Some(queued);
        })
        .unwrap();

    dispatcher
        .instantaneous_trigger_with(tag("Root"), TagContainer::new(), None, None)
        .unwrap();

    let handle = result.borrow_mut().take().unwrap();
    assert!(handle.is_active());
    let live = dispatcher.get_trigger_context_for_update(&handle).unwrap();
    assert_eq!(live.borrow().data.get::<Sequence>().map(|s| s.0), Some(5));
}

/// Each drain records how deep the queue got.
#[test]
fn test_stats_track_queue_depth() {
    let dispatcher = TriggerDispatcher::new();
    dispatcher
        .register_listener(tag("Root"), TriggerPhases::START, |handle: &TriggerHandle, _, _: &TriggerContext| {
            let dispatcher = handle.dispatcher().unwrap();
            for _ in 0..4 {
                dispatcher
                    .instantaneous_trigger_with(TriggerTag::new("Leaf"), TagContainer::new(), None, None)
                    .unwrap();
            }
        })
        .unwrap();

    dispatcher
        .instantaneous_trigger_with(tag("Root"), TagContainer::new(), None, None)
        .unwrap();

    let stats = dispatcher.stats();
    assert_eq!(stats.operations_processed, 5);
    assert_eq!(stats.max_queue_depth, 5);
    assert_eq!(stats.callbacks_invoked, 1);
}
