//! Listener registrations.
//!
//! A listener subscribes to one trigger type for a set of phases. It may
//! narrow what it hears with identity filters (initiator / target, held
//! weakly) and an ordered list of [`TriggerFilter`]s.
//!
//! Listeners become invalid when their callback's owner is dropped or a
//! filtered object expires. Invalid listeners are never invoked; the
//! dispatcher removes them at the next safe point.

use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use futures::channel::oneshot;
use futures::future::{FutureExt, Shared};

use crate::core::{ObjectRef, TriggerTag, WeakObjectRef};

use super::context::TriggerContext;
use super::filter::{FilterOutcome, TriggerFilter};
use super::handle::{ListenerHandle, TriggerHandle};
use super::phase::TriggerPhases;

type CallbackFn = dyn FnMut(&TriggerHandle, TriggerPhases, &TriggerContext);

/// The function a listener runs when a matching trigger is dispatched.
///
/// A callback may be bound to an owner object; it reports itself unbound
/// once that object is dropped.
pub struct TriggerCallback {
    func: Box<CallbackFn>,
    owner: Option<WeakObjectRef>,
}

impl TriggerCallback {
    /// Create an unowned callback. It stays bound for its whole life.
    pub fn new<F>(func: F) -> Self
    where
        F: FnMut(&TriggerHandle, TriggerPhases, &TriggerContext) + 'static,
    {
        Self {
            func: Box::new(func),
            owner: None,
        }
    }

    /// Create a callback that unbinds when `owner` is dropped.
    pub fn bound_to<F>(owner: &ObjectRef, func: F) -> Self
    where
        F: FnMut(&TriggerHandle, TriggerPhases, &TriggerContext) + 'static,
    {
        Self {
            func: Box::new(func),
            owner: Some(owner.downgrade()),
        }
    }

    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.owner.as_ref().is_none_or(WeakObjectRef::is_valid)
    }

    pub(crate) fn invoke(&mut self, handle: &TriggerHandle, phase: TriggerPhases, context: &TriggerContext) {
        (self.func)(handle, phase, context);
    }
}

impl std::fmt::Debug for TriggerCallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriggerCallback")
            .field("owner", &self.owner)
            .field("bound", &self.is_bound())
            .finish_non_exhaustive()
    }
}

/// How a listener subscribes.
#[derive(Clone)]
pub struct ListenerOptions {
    /// Phases the listener hears.
    pub phases: TriggerPhases,
    /// Only hear triggers started by this object.
    pub filter_instigator: Option<WeakObjectRef>,
    /// Only hear triggers that affect this object.
    pub filter_target: Option<WeakObjectRef>,
    /// Predicate filters, evaluated in order.
    pub filters: Vec<Rc<dyn TriggerFilter>>,
    /// Immediately run for triggers of this type that are already active.
    /// Requires [`TriggerPhases::START`].
    pub fire_for_existing: bool,
}

impl ListenerOptions {
    /// Listen for the given phases with no filters.
    pub fn new(phases: TriggerPhases) -> Self {
        Self {
            phases,
            filter_instigator: None,
            filter_target: None,
            filters: Vec::new(),
            fire_for_existing: false,
        }
    }

    /// Filter on the trigger's initiator (builder pattern).
    #[must_use]
    pub fn with_instigator(mut self, instigator: &ObjectRef) -> Self {
        self.filter_instigator = Some(instigator.downgrade());
        self
    }

    /// Filter on the trigger's target (builder pattern).
    #[must_use]
    pub fn with_target(mut self, target: &ObjectRef) -> Self {
        self.filter_target = Some(target.downgrade());
        self
    }

    /// Append a predicate filter (builder pattern).
    #[must_use]
    pub fn with_filter(mut self, filter: impl TriggerFilter + 'static) -> Self {
        self.filters.push(Rc::new(filter));
        self
    }

    /// Append a filter shared with other listeners (builder pattern).
    #[must_use]
    pub fn with_shared_filter(mut self, filter: Rc<dyn TriggerFilter>) -> Self {
        self.filters.push(filter);
        self
    }

    /// Run for already-active triggers on registration (builder pattern).
    #[must_use]
    pub fn fire_for_existing(mut self) -> Self {
        self.fire_for_existing = true;
        self
    }
}

impl From<TriggerPhases> for ListenerOptions {
    fn from(phases: TriggerPhases) -> Self {
        Self::new(phases)
    }
}

impl std::fmt::Debug for ListenerOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerOptions")
            .field("phases", &self.phases)
            .field("filter_instigator", &self.filter_instigator)
            .field("filter_target", &self.filter_target)
            .field("filters", &self.filters.len())
            .field("fire_for_existing", &self.fire_for_existing)
            .finish()
    }
}

/// Resolves once the listener has left the dispatcher.
///
/// Clonable; every clone observes the same resolution. Also resolves if the
/// dispatcher is dropped while the listener is still registered.
#[derive(Clone)]
pub struct ListenerRemoved {
    inner: Shared<oneshot::Receiver<()>>,
}

impl ListenerRemoved {
    pub(crate) fn channel() -> (oneshot::Sender<()>, Self) {
        let (sender, receiver) = oneshot::channel();
        (sender, Self { inner: receiver.shared() })
    }

    /// Check without waiting whether the listener has been removed.
    #[must_use]
    pub fn is_removed(&self) -> bool {
        self.inner.clone().now_or_never().is_some()
    }
}

impl Future for ListenerRemoved {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        // Sent or dropped, either way the listener is gone.
        self.get_mut().inner.poll_unpin(cx).map(|_| ())
    }
}

impl std::fmt::Debug for ListenerRemoved {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRemoved")
            .field("removed", &self.is_removed())
            .finish()
    }
}

/// What `register_listener` hands back.
#[derive(Debug, Clone)]
pub struct ListenerRegistration {
    pub handle: ListenerHandle,
    pub removed: ListenerRemoved,
}

/// A listener as stored by the dispatcher.
pub(crate) struct ListenerData {
    trigger_type: TriggerTag,
    options: ListenerOptions,
    callback: std::cell::RefCell<TriggerCallback>,
    removed: std::cell::RefCell<Option<oneshot::Sender<()>>>,
}

/// Outcome of checking one listener against one trigger.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ListenerVerdict {
    /// The listener can never fire again.
    Invalid,
    /// Not interested in this trigger.
    Skip,
    /// Run the callback.
    Invoke,
}

impl ListenerData {
    pub(crate) fn new(
        trigger_type: TriggerTag,
        options: ListenerOptions,
        callback: TriggerCallback,
        removed: oneshot::Sender<()>,
    ) -> Self {
        Self {
            trigger_type,
            options,
            callback: std::cell::RefCell::new(callback),
            removed: std::cell::RefCell::new(Some(removed)),
        }
    }

    pub(crate) fn trigger_type(&self) -> &TriggerTag {
        &self.trigger_type
    }

    /// Callback bound and every filtered object still alive.
    pub(crate) fn is_valid(&self) -> bool {
        if !self.callback.borrow().is_bound() {
            return false;
        }
        let expired = |filter: &Option<WeakObjectRef>| filter.as_ref().is_some_and(|weak| !weak.is_valid());
        !expired(&self.options.filter_instigator) && !expired(&self.options.filter_target)
    }

    /// Phase and identity checks.
    pub(crate) fn matches(&self, phase: TriggerPhases, context: &TriggerContext) -> bool {
        if !self.options.phases.intersects(phase) {
            return false;
        }
        if let Some(instigator) = &self.options.filter_instigator {
            if !instigator.refers_to(context.initiator.as_ref()) {
                return false;
            }
        }
        if let Some(target) = &self.options.filter_target {
            if !target.refers_to(context.target.as_ref()) {
                return false;
            }
        }
        true
    }

    /// Run every predicate filter. Blocks if any blocks; stale if any is stale.
    pub(crate) fn evaluate_filters(&self, phase: TriggerPhases, context: &TriggerContext) -> FilterOutcome {
        self.options
            .filters
            .iter()
            .fold(FilterOutcome::PASS, |acc, filter| {
                let outcome = filter.evaluate(phase, context);
                FilterOutcome {
                    passed: acc.passed && outcome.passed,
                    stale: acc.stale || outcome.stale,
                }
            })
    }

    /// Full check used during fan-out. The second value asks for removal
    /// after this pass even when the listener is invoked now.
    pub(crate) fn verdict(&self, phase: TriggerPhases, context: &TriggerContext) -> (ListenerVerdict, bool) {
        if !self.is_valid() {
            return (ListenerVerdict::Invalid, true);
        }
        if !self.matches(phase, context) {
            return (ListenerVerdict::Skip, false);
        }
        let outcome = self.evaluate_filters(phase, context);
        let verdict = if outcome.passed { ListenerVerdict::Invoke } else { ListenerVerdict::Skip };
        (verdict, outcome.stale)
    }

    pub(crate) fn invoke(&self, handle: &TriggerHandle, phase: TriggerPhases, context: &TriggerContext) {
        self.callback.borrow_mut().invoke(handle, phase, context);
    }

    /// Resolve the removal future. Idempotent.
    pub(crate) fn notify_removed(&self) {
        if let Some(sender) = self.removed.borrow_mut().take() {
            // A dropped receiver just means nobody is waiting.
            let _ = sender.send(());
        }
    }
}

impl std::fmt::Debug for ListenerData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerData")
            .field("trigger_type", &self.trigger_type)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
