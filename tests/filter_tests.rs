//! Listener filter integration tests.
//!
//! Predicate filters run after the phase and identity checks. A blocking
//! filter skips the callback for one trigger; a stale filter retires the
//! listener at the next safe point.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use gameplay_trigger::triggers::{DataMatches, ObjectFilter};
use gameplay_trigger::{
    FilterCondition, FilterOutcome, ListenerOptions, ObjectRef, TagContainer, TriggerContext,
    TriggerDispatcher, TriggerFilter, TriggerPhases, TriggerTag,
};

#[derive(Clone, Debug, Default)]
struct Damage(i64);

fn tag(name: &str) -> TriggerTag {
    TriggerTag::new(name)
}

fn counter() -> (Rc<Cell<u32>>, impl FnMut(&gameplay_trigger::TriggerHandle, TriggerPhases, &TriggerContext)) {
    let calls = Rc::new(Cell::new(0));
    let sink = Rc::clone(&calls);
    (calls, move |_: &gameplay_trigger::TriggerHandle, _: TriggerPhases, _: &TriggerContext| {
        sink.set(sink.get() + 1)
    })
}

fn fire_damage(dispatcher: &TriggerDispatcher, amount: Option<i64>) {
    let context = dispatcher.make_trigger_context(tag("Combat.Damage"), TagContainer::new(), None, None);
    if let Some(amount) = amount {
        context.borrow_mut().data.insert(Damage(amount));
    }
    dispatcher.instantaneous_trigger(context).unwrap();
}

/// "Value must be positive" blocks missing and negative payloads; the
/// unfiltered listener hears every trigger.
#[test]
fn test_positive_value_filter() {
    let dispatcher = TriggerDispatcher::new();
    let (filtered, filtered_cb) = counter();
    let (open, open_cb) = counter();

    dispatcher
        .register_listener(
            tag("Combat.Damage"),
            ListenerOptions::new(TriggerPhases::START).with_filter(DataMatches::new(|damage: &Damage| damage.0 > 0)),
            filtered_cb,
        )
        .unwrap();
    dispatcher
        .register_listener(tag("Combat.Damage"), TriggerPhases::START, open_cb)
        .unwrap();

    fire_damage(&dispatcher, None);
    fire_damage(&dispatcher, Some(-4));
    assert_eq!(filtered.get(), 0);

    fire_damage(&dispatcher, Some(9));
    assert_eq!(filtered.get(), 1);
    assert_eq!(open.get(), 3);
}

/// Tag conditions look at the occurrence tags, hierarchically.
#[test]
fn test_tag_conditions() {
    let dispatcher = TriggerDispatcher::new();
    let (fire_only, fire_cb) = counter();
    let (not_blocked, unblocked_cb) = counter();

    dispatcher
        .register_listener(
            tag("Combat.Hit"),
            ListenerOptions::new(TriggerPhases::START).with_filter(FilterCondition::HasTag(tag("Element.Fire"))),
            fire_cb,
        )
        .unwrap();
    dispatcher
        .register_listener(
            tag("Combat.Hit"),
            ListenerOptions::new(TriggerPhases::START).with_filter(
                FilterCondition::LacksTag(tag("Hit.Blocked")).and(FilterCondition::PhaseIn(TriggerPhases::START)),
            ),
            unblocked_cb,
        )
        .unwrap();

    let fireball = TagContainer::new().with("Element.Fire.Fireball");
    let parried = TagContainer::new().with("Element.Ice").with("Hit.Blocked");

    dispatcher
        .instantaneous_trigger_with(tag("Combat.Hit"), fireball, None, None)
        .unwrap();
    dispatcher
        .instantaneous_trigger_with(tag("Combat.Hit"), parried, None, None)
        .unwrap();

    assert_eq!(fire_only.get(), 1);
    assert_eq!(not_blocked.get(), 1);
}

/// Conditions load from JSON like any other game data.
#[test]
fn test_condition_from_json() {
    let json = r#"{ "Any": [ { "HasTag": "Element.Fire" }, { "Not": "Always" } ] }"#;
    let condition: FilterCondition = serde_json::from_str(json).unwrap();

    let burning = TriggerContext::new(tag("Combat.Hit"), TagContainer::new().with("Element.Fire"));
    let plain = TriggerContext::new(tag("Combat.Hit"), TagContainer::new());

    assert!(condition.holds(TriggerPhases::START, &burning));
    assert!(!condition.holds(TriggerPhases::START, &plain));
}

/// A stale filter may still pass the current trigger; the listener is
/// removed afterwards regardless.
#[test]
fn test_stale_filter_passes_once_then_retires() {
    let dispatcher = TriggerDispatcher::new();
    let (calls, callback) = counter();

    let last_call = |_: TriggerPhases, _: &TriggerContext| FilterOutcome::PASS.and_stale();
    let registration = dispatcher
        .register_listener(
            tag("Combat.Hit"),
            ListenerOptions::new(TriggerPhases::START).with_filter(last_call),
            callback,
        )
        .unwrap();

    dispatcher
        .instantaneous_trigger_with(tag("Combat.Hit"), TagContainer::new(), None, None)
        .unwrap();
    assert_eq!(calls.get(), 1);
    assert!(!registration.handle.is_valid());

    dispatcher
        .instantaneous_trigger_with(tag("Combat.Hit"), TagContainer::new(), None, None)
        .unwrap();
    assert_eq!(calls.get(), 1);
    assert!(registration.removed.is_removed());
}

/// Blocking and staleness are independent: every filter is consulted.
#[test]
fn test_all_filters_evaluated() {
    let dispatcher = TriggerDispatcher::new();
    let (calls, callback) = counter();
    let consulted = Rc::new(Cell::new(0));

    let seen = Rc::clone(&consulted);
    let tally = move |_: TriggerPhases, _: &TriggerContext| {
        seen.set(seen.get() + 1);
        FilterOutcome::PASS.and_stale()
    };
    let registration = dispatcher
        .register_listener(
            tag("Combat.Hit"),
            ListenerOptions::new(TriggerPhases::START)
                .with_filter(FilterCondition::Never)
                .with_filter(tally),
            callback,
        )
        .unwrap();

    dispatcher
        .instantaneous_trigger_with(tag("Combat.Hit"), TagContainer::new(), None, None)
        .unwrap();

    assert_eq!(calls.get(), 0);
    assert_eq!(consulted.get(), 1);
    assert!(!registration.handle.is_valid());
}

/// An object filter goes stale when its object is dropped.
#[test]
fn test_object_filter_expires() {
    let dispatcher = TriggerDispatcher::new();
    let (calls, callback) = counter();
    let shield = ObjectRef::new(RefCell::new(2_u32));

    let filter = ObjectFilter::new(shield.downgrade(), |object: &ObjectRef, _: &TriggerContext| {
        object
            .downcast_ref::<RefCell<u32>>()
            .is_some_and(|charges| *charges.borrow() > 0)
    });
    let registration = dispatcher
        .register_listener(
            tag("Combat.Hit"),
            ListenerOptions::new(TriggerPhases::START).with_filter(filter),
            callback,
        )
        .unwrap();

    dispatcher
        .instantaneous_trigger_with(tag("Combat.Hit"), TagContainer::new(), None, None)
        .unwrap();
    assert_eq!(calls.get(), 1);

    if let Some(charges) = shield.downcast_ref::<RefCell<u32>>() {
        *charges.borrow_mut() = 0;
    }
    dispatcher
        .instantaneous_trigger_with(tag("Combat.Hit"), TagContainer::new(), None, None)
        .unwrap();
    assert_eq!(calls.get(), 1);
    assert!(registration.handle.is_valid());

    drop(shield);
    dispatcher
        .instantaneous_trigger_with(tag("Combat.Hit"), TagContainer::new(), None, None)
        .unwrap();
    assert_eq!(calls.get(), 1);
    assert!(!registration.handle.is_valid());
}

/// One filter instance may serve several listeners.
#[test]
fn test_shared_filter() {
    let dispatcher = TriggerDispatcher::new();
    let shared: Rc<dyn TriggerFilter> = Rc::new(FilterCondition::HasTag(tag("Crit")));
    let (first, first_cb) = counter();
    let (second, second_cb) = counter();

    dispatcher
        .register_listener(
            tag("Combat.Hit"),
            ListenerOptions::new(TriggerPhases::START).with_shared_filter(Rc::clone(&shared)),
            first_cb,
        )
        .unwrap();
    dispatcher
        .register_listener(
            tag("Combat.Hit"),
            ListenerOptions::new(TriggerPhases::START).with_shared_filter(shared),
            second_cb,
        )
        .unwrap();

    dispatcher
        .instantaneous_trigger_with(tag("Combat.Hit"), TagContainer::new().with("Crit"), None, None)
        .unwrap();
    dispatcher
        .instantaneous_trigger_with(tag("Combat.Hit"), TagContainer::new(), None, None)
        .unwrap();

    assert_eq!(first.get(), 1);
    assert_eq!(second.get(), 1);
}
