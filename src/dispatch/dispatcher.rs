//! The trigger dispatcher.
//!
//! [`TriggerDispatcher`] owns every registry: active triggers grouped by
//! type, live listeners grouped by type, the pending-add / pending-remove
//! staging areas, and the FIFO operation queue.
//!
//! ## Reentrancy
//!
//! Every public method takes `&self` and may be called from inside a
//! listener callback. Trigger lifecycle calls (start / update / end /
//! instantaneous) only append to the queue; the call that found the queue
//! empty drains it, one operation at a time, until nothing is left.
//! Listener registration and removal are staged and applied between two
//! operations, never during one, so a fan-out always sees the listener table
//! as it was when that operation started.
//!
//! ## Threading
//!
//! A dispatcher is `!Send`: it is confined to the thread that created it.
//! Hosts that need cross-thread access must funnel calls onto that thread.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, debug_span, error, trace, warn};

use crate::core::{DispatcherConfig, ObjectRef, TagContainer, TriggerTag};
use crate::error::{TriggerError, TriggerResult};
use crate::triggers::{
    deep_copy, ListenerData, ListenerHandle, ListenerOptions, ListenerRegistration, ListenerRemoved,
    ListenerVerdict, TriggerCallback, TriggerContext, TriggerContextRef, TriggerHandle,
    TriggerOperation, TriggerPhases,
};

use super::queue::{OperationQueue, PendingOperation, QueuedState};
use super::replication::{NoReplication, ReplicationHook};

type ListenerBucket = Vec<(ListenerHandle, Rc<ListenerData>)>;
type PanicPayload = Box<dyn Any + Send + 'static>;

/// Counters describing dispatcher activity since creation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Queue entries fully processed.
    pub operations_processed: u64,
    /// Listener callbacks run (including fire-for-existing).
    pub callbacks_invoked: u64,
    /// Callbacks, filters and replication hooks that panicked during a drain.
    pub callback_panics: u64,
    /// Listeners scheduled for removal because they went stale.
    pub listeners_pruned: u64,
    /// Deepest the operation queue has been.
    pub max_queue_depth: usize,
}

#[derive(Default)]
struct DispatcherState {
    /// Live listeners. Buckets keep registration order.
    listeners_by_type: FxHashMap<TriggerTag, ListenerBucket>,
    active_by_type: FxHashMap<TriggerTag, FxHashMap<TriggerHandle, TriggerContextRef>>,
    pending_add: ListenerBucket,
    pending_remove: FxHashSet<ListenerHandle>,
    /// Active triggers of replicated types.
    replicated: Vec<TriggerContextRef>,
}

pub(crate) struct DispatcherCore {
    config: DispatcherConfig,
    state: RefCell<DispatcherState>,
    queue: RefCell<OperationQueue>,
    replication: RefCell<Box<dyn ReplicationHook>>,
    stats: Cell<DispatchStats>,
}

/// Reentrant, tag-routed trigger dispatcher.
///
/// Cloning is cheap and yields another reference to the same dispatcher.
/// Callbacks should reach the dispatcher through
/// [`TriggerHandle::dispatcher`] rather than capturing a clone, which would
/// keep it alive through its own listener table.
#[derive(Clone)]
pub struct TriggerDispatcher {
    core: Rc<DispatcherCore>,
}

impl TriggerDispatcher {
    /// Create a dispatcher with the default configuration.
    pub fn new() -> Self {
        Self::with_config(DispatcherConfig::default())
    }

    /// Create a dispatcher with the given configuration.
    pub fn with_config(config: DispatcherConfig) -> Self {
        debug!(dispatcher = %config.name, "creating trigger dispatcher");
        Self {
            core: Rc::new(DispatcherCore {
                config,
                state: RefCell::new(DispatcherState::default()),
                queue: RefCell::new(OperationQueue::default()),
                replication: RefCell::new(Box::new(NoReplication)),
                stats: Cell::new(DispatchStats::default()),
            }),
        }
    }

    /// Install a replication hook (builder pattern).
    #[must_use]
    pub fn with_replication(self, hook: impl ReplicationHook + 'static) -> Self {
        self.set_replication_hook(hook);
        self
    }

    /// Replace the replication hook.
    pub fn set_replication_hook(&self, hook: impl ReplicationHook + 'static) {
        *self.core.replication.borrow_mut() = Box::new(hook);
    }

    pub(crate) fn from_core(core: Rc<DispatcherCore>) -> Self {
        Self { core }
    }

    #[must_use]
    pub fn config(&self) -> &DispatcherConfig {
        &self.core.config
    }

    /// Check whether two values refer to the same dispatcher.
    #[must_use]
    pub fn ptr_eq(&self, other: &TriggerDispatcher) -> bool {
        Rc::ptr_eq(&self.core, &other.core)
    }

    // =========================================================================
    // Factories
    // =========================================================================

    /// Build a trigger context. Nothing is registered or validated.
    pub fn make_trigger_context(
        &self,
        trigger_type: TriggerTag,
        trigger_tags: TagContainer,
        initiator: Option<ObjectRef>,
        target: Option<ObjectRef>,
    ) -> TriggerContextRef {
        let mut context = TriggerContext::new(trigger_type, trigger_tags);
        context.initiator = initiator;
        context.target = target;
        context.into_ref()
    }

    fn create_trigger_handle(&self, trigger_type: TriggerTag) -> TriggerHandle {
        TriggerHandle::issue(trigger_type, Rc::downgrade(&self.core))
    }

    fn create_listener_handle(&self, trigger_type: TriggerTag) -> ListenerHandle {
        ListenerHandle::issue(trigger_type, Rc::downgrade(&self.core))
    }

    // =========================================================================
    // Trigger lifecycle
    // =========================================================================

    /// Fire a trigger that starts and ends at once.
    ///
    /// Listeners hear a single callback with `START | END`.
    pub fn instantaneous_trigger(&self, context: TriggerContextRef) -> TriggerResult<TriggerHandle> {
        self.start_trigger_internal(context, TriggerOperation::INSTANTANEOUS)
    }

    /// Fire an instantaneous trigger, building its context in place.
    pub fn instantaneous_trigger_with(
        &self,
        trigger_type: TriggerTag,
        trigger_tags: TagContainer,
        initiator: Option<ObjectRef>,
        target: Option<ObjectRef>,
    ) -> TriggerResult<TriggerHandle> {
        let context = self.make_trigger_context(trigger_type, trigger_tags, initiator, target);
        self.instantaneous_trigger(context)
    }

    /// Fire an instantaneous trigger and hand it to the replication hook.
    pub fn networked_instantaneous_trigger(&self, context: TriggerContextRef) -> TriggerResult<TriggerHandle> {
        self.start_trigger_internal(context, TriggerOperation::NETWORKED_INSTANTANEOUS)
    }

    /// Start a trigger that stays active until [`end_trigger`](Self::end_trigger).
    pub fn start_trigger(&self, context: TriggerContextRef) -> TriggerResult<TriggerHandle> {
        self.start_trigger_internal(context, TriggerOperation::OPEN)
    }

    /// Start a persistent trigger, building its context in place.
    pub fn start_trigger_with(
        &self,
        trigger_type: TriggerTag,
        trigger_tags: TagContainer,
        initiator: Option<ObjectRef>,
        target: Option<ObjectRef>,
    ) -> TriggerResult<TriggerHandle> {
        let context = self.make_trigger_context(trigger_type, trigger_tags, initiator, target);
        self.start_trigger(context)
    }

    /// Queue an update for an active (or pending) trigger.
    ///
    /// Pass either the context returned by
    /// [`get_trigger_context_for_update`](Self::get_trigger_context_for_update)
    /// or any context of the same type.
    pub fn update_trigger(&self, handle: &TriggerHandle, context: TriggerContextRef) -> TriggerResult<()> {
        self.check_trigger_handle(handle)?;

        let found = context.borrow().trigger_type().clone();
        if found != *handle.trigger_type() {
            warn!(trigger = %handle, expected = %handle.trigger_type(), %found, "update context has the wrong type");
            return Err(TriggerError::TriggerTypeMismatch {
                expected: handle.trigger_type().clone(),
                found,
            });
        }
        self.check_alive(handle, "update")?;

        self.enqueue_and_process(PendingOperation::new(handle.clone(), TriggerOperation::UPDATE, Some(context)));
        Ok(())
    }

    /// Queue the end of a persistent trigger.
    pub fn end_trigger(&self, handle: &TriggerHandle) -> TriggerResult<()> {
        self.check_trigger_handle(handle)?;
        self.check_alive(handle, "end")?;

        self.enqueue_and_process(PendingOperation::new(handle.clone(), TriggerOperation::CLOSE, None));
        Ok(())
    }

    /// Get a context that is safe to edit and pass to
    /// [`update_trigger`](Self::update_trigger).
    ///
    /// If an operation for the trigger is still queued or being dispatched,
    /// this is a deep copy of the newest queued context, so edits cannot
    /// disturb what in-flight operations captured. Otherwise it is the live
    /// context itself, for in-place editing.
    pub fn get_trigger_context_for_update(&self, handle: &TriggerHandle) -> TriggerResult<TriggerContextRef> {
        self.check_trigger_handle(handle)?;

        let queued = {
            let queue = self.core.queue.borrow();
            queue
                .newest_for(handle)
                .map(|pending| (pending.operation, pending.context.clone()))
        };
        match queued {
            Some((operation, _)) if operation.contains(TriggerOperation::REMOVE_ACTIVE_TRIGGER) => {
                warn!(trigger = %handle, "trying to update a trigger that is pending removal");
                Err(TriggerError::PendingRemoval(handle.to_string()))
            }
            Some((_, Some(stored))) => Ok(deep_copy(&stored)),
            _ => self.active_context(handle).ok_or_else(|| {
                warn!(trigger = %handle, "no active trigger for update");
                TriggerError::TriggerNotActive(handle.to_string())
            }),
        }
    }

    fn start_trigger_internal(
        &self,
        context: TriggerContextRef,
        operation: TriggerOperation,
    ) -> TriggerResult<TriggerHandle> {
        let trigger_type = context.borrow().trigger_type().clone();
        if !trigger_type.is_valid() {
            warn!(%trigger_type, "refusing to start a trigger with an invalid type");
            return Err(TriggerError::InvalidTriggerType(trigger_type));
        }

        let handle = self.create_trigger_handle(trigger_type);
        debug!(trigger = %handle, trigger_type = %handle.trigger_type(), ?operation, "starting trigger");
        self.enqueue_and_process(PendingOperation::new(handle.clone(), operation, Some(context)));
        Ok(handle)
    }

    fn check_trigger_handle(&self, handle: &TriggerHandle) -> TriggerResult<()> {
        if !handle.is_valid() {
            warn!(trigger = %handle, "invalid trigger handle");
            return Err(TriggerError::InvalidHandle(handle.to_string()));
        }
        if !handle.belongs_to(&self.core) {
            warn!(trigger = %handle, "trigger handle from another dispatcher");
            return Err(TriggerError::ForeignHandle(handle.to_string()));
        }
        Ok(())
    }

    fn check_alive(&self, handle: &TriggerHandle, action: &str) -> TriggerResult<()> {
        let queued = self.core.queue.borrow().queued_state(handle);
        match queued {
            QueuedState::Alive => Ok(()),
            QueuedState::Removing => {
                warn!(trigger = %handle, action, "trigger is pending removal");
                Err(TriggerError::PendingRemoval(handle.to_string()))
            }
            QueuedState::Unqueued if self.is_trigger_active(handle) => Ok(()),
            QueuedState::Unqueued => {
                warn!(trigger = %handle, action, "trigger is not active");
                Err(TriggerError::TriggerNotActive(handle.to_string()))
            }
        }
    }

    // =========================================================================
    // Operation queue
    // =========================================================================

    fn enqueue_and_process(&self, operation: PendingOperation) {
        let should_drain = {
            let mut queue = self.core.queue.borrow_mut();
            let was_empty = queue.is_empty();
            queue.push_back(operation);

            let depth = queue.len();
            self.bump_stats(|stats| stats.max_queue_depth = stats.max_queue_depth.max(depth));
            if depth > self.core.config.warn_queue_depth {
                warn!(dispatcher = %self.core.config.name, depth, "trigger operation queue is unusually deep");
            }
            was_empty
        };

        if !should_drain {
            trace!("operation queued behind the running drain");
            return;
        }

        let _span = debug_span!("drain", dispatcher = %self.core.config.name).entered();
        let mut first_panic: Option<PanicPayload> = None;

        // Re-read the front every time: callbacks append while we process.
        loop {
            let front = self.core.queue.borrow().front().cloned();
            let Some(operation) = front else {
                break;
            };

            self.apply_pending_listener_changes();

            if let Some(payload) = self.process_operation(&operation) {
                first_panic.get_or_insert(payload);
            }

            self.core.queue.borrow_mut().pop_front();
            self.bump_stats(|stats| stats.operations_processed += 1);
        }

        if let Some(payload) = first_panic {
            panic::resume_unwind(payload);
        }
    }

    fn apply_pending_listener_changes(&self) {
        let removed = {
            let mut state = self.core.state.borrow_mut();
            let state = &mut *state;

            for (handle, listener) in state.pending_add.drain(..) {
                let bucket = state
                    .listeners_by_type
                    .entry(listener.trigger_type().clone())
                    .or_default();
                if !bucket.iter().any(|(existing, _)| *existing == handle) {
                    trace!(listener = %handle, "listener added");
                    bucket.push((handle, listener));
                }
            }

            let mut removed = Vec::with_capacity(state.pending_remove.len());
            for handle in state.pending_remove.drain() {
                let now_empty = match state.listeners_by_type.get_mut(handle.trigger_type()) {
                    Some(bucket) => {
                        if let Some(index) = bucket.iter().position(|(existing, _)| *existing == handle) {
                            trace!(listener = %handle, "listener removed");
                            removed.push(bucket.remove(index).1);
                        }
                        bucket.is_empty()
                    }
                    None => false,
                };
                if now_empty {
                    state.listeners_by_type.remove(handle.trigger_type());
                }
            }
            removed
        };

        for listener in &removed {
            listener.notify_removed();
        }
    }

    /// Apply one queue entry. Returns the first user-code panic, if any.
    fn process_operation(&self, pending: &PendingOperation) -> Option<PanicPayload> {
        let PendingOperation {
            handle,
            operation,
            context,
        } = pending;
        let operation = *operation;
        let mut first_panic = None;

        let context = if operation.contains(TriggerOperation::ADD_ACTIVE_TRIGGER) {
            let context = context.clone().expect("add operation queued without a context");
            keep_first(&mut first_panic, self.add_active_trigger(handle, &context));
            context
        } else if operation.contains(TriggerOperation::UPDATE_ACTIVE_TRIGGER) {
            let context = context.clone().expect("update operation queued without a context");
            keep_first(&mut first_panic, self.update_active_trigger(handle, &context));
            context
        } else {
            self.active_context(handle)
                .unwrap_or_else(|| panic!("{handle} reached the front of the queue without an active trigger"))
        };

        if operation.processes_callbacks() {
            keep_first(&mut first_panic, self.process_callbacks(handle, operation.phases(), &context));
        }

        if operation.contains(TriggerOperation::NETWORK_REPLICATE) {
            let replicated = self.call_replication_hook(handle, |hook| {
                hook.replicate_operation(handle, operation, &context.borrow());
            });
            keep_first(&mut first_panic, replicated);
        }

        if operation.contains(TriggerOperation::REMOVE_ACTIVE_TRIGGER) {
            keep_first(&mut first_panic, self.remove_active_trigger(handle));
        }

        first_panic
    }

    /// Run a replication hook callback, catching its panic like a listener's.
    fn call_replication_hook(
        &self,
        handle: &TriggerHandle,
        call: impl FnOnce(&mut dyn ReplicationHook),
    ) -> Option<PanicPayload> {
        let result = {
            let mut hook = self.core.replication.borrow_mut();
            panic::catch_unwind(AssertUnwindSafe(|| call(&mut **hook)))
        };
        let payload = result.err()?;
        error!(trigger = %handle, "replication hook panicked");
        self.bump_stats(|stats| stats.callback_panics += 1);
        Some(payload)
    }

    fn process_callbacks(
        &self,
        handle: &TriggerHandle,
        phase: TriggerPhases,
        context: &TriggerContextRef,
    ) -> Option<PanicPayload> {
        // Table changes are staged until the next operation, so this
        // snapshot is exactly what the fan-out must see.
        let listeners: ListenerBucket = {
            let state = self.core.state.borrow();
            match state.listeners_by_type.get(handle.trigger_type()) {
                Some(bucket) => bucket.clone(),
                None => return None,
            }
        };

        let context = context.borrow();
        let mut to_remove = Vec::new();
        let mut first_panic = None;
        let mut invoked = 0_u64;
        let mut panics = 0_u64;

        for (listener_handle, listener) in &listeners {
            // A panicking filter blocks this listener for this trigger only.
            let checked = panic::catch_unwind(AssertUnwindSafe(|| listener.verdict(phase, &context)));
            let (verdict, remove_after) = match checked {
                Ok(checked) => checked,
                Err(payload) => {
                    error!(trigger = %handle, listener = %listener_handle, "listener filter panicked");
                    panics += 1;
                    first_panic.get_or_insert(payload);
                    continue;
                }
            };
            if remove_after {
                to_remove.push(listener_handle.clone());
            }
            if verdict != ListenerVerdict::Invoke {
                continue;
            }

            trace!(trigger = %handle, listener = %listener_handle, %phase, "invoking listener");
            invoked += 1;
            let result = panic::catch_unwind(AssertUnwindSafe(|| listener.invoke(handle, phase, &context)));
            if let Err(payload) = result {
                error!(trigger = %handle, listener = %listener_handle, "listener callback panicked");
                panics += 1;
                first_panic.get_or_insert(payload);
            }
        }
        drop(context);

        let pruned = to_remove.len() as u64;
        if pruned > 0 {
            debug!(trigger = %handle, pruned, "scheduling stale listeners for removal");
            self.core.state.borrow_mut().pending_remove.extend(to_remove);
        }
        self.bump_stats(|stats| {
            stats.callbacks_invoked += invoked;
            stats.callback_panics += panics;
            stats.listeners_pruned += pruned;
        });

        first_panic
    }

    fn add_active_trigger(&self, handle: &TriggerHandle, context: &TriggerContextRef) -> Option<PanicPayload> {
        let replicated = self.core.config.is_replicated(handle.trigger_type());
        {
            let mut state = self.core.state.borrow_mut();
            state
                .active_by_type
                .entry(handle.trigger_type().clone())
                .or_default()
                .insert(handle.clone(), context.clone());
            if replicated {
                state.replicated.push(context.clone());
            }
        }
        if !replicated {
            return None;
        }
        self.call_replication_hook(handle, |hook| hook.on_replicated_added(handle, context))
    }

    fn update_active_trigger(&self, handle: &TriggerHandle, context: &TriggerContextRef) -> Option<PanicPayload> {
        let replicated = self.core.config.is_replicated(handle.trigger_type());
        let replaced = {
            let mut state = self.core.state.borrow_mut();
            let stored = state
                .active_by_type
                .get_mut(handle.trigger_type())
                .and_then(|triggers| triggers.get_mut(handle))
                .unwrap_or_else(|| panic!("{handle} was updated but is not active"));

            if Rc::ptr_eq(stored, context) {
                // Edited in place.
                false
            } else {
                let previous = std::mem::replace(stored, context.clone());
                if replicated {
                    state.replicated.retain(|tracked| !Rc::ptr_eq(tracked, &previous));
                    state.replicated.push(context.clone());
                }
                true
            }
        };
        if !replicated {
            return None;
        }
        self.call_replication_hook(handle, |hook| hook.on_replicated_updated(handle, context, replaced))
    }

    fn remove_active_trigger(&self, handle: &TriggerHandle) -> Option<PanicPayload> {
        let replicated = self.core.config.is_replicated(handle.trigger_type());
        let removed = {
            let mut state = self.core.state.borrow_mut();
            let triggers = state
                .active_by_type
                .get_mut(handle.trigger_type())
                .unwrap_or_else(|| panic!("{handle} was removed but its type has no active triggers"));
            let removed = triggers
                .remove(handle)
                .unwrap_or_else(|| panic!("{handle} was removed but is not active"));
            if triggers.is_empty() {
                state.active_by_type.remove(handle.trigger_type());
            }
            if replicated {
                state.replicated.retain(|tracked| !Rc::ptr_eq(tracked, &removed));
            }
            removed
        };
        debug!(trigger = %handle, "trigger ended");
        if !replicated {
            return None;
        }
        self.call_replication_hook(handle, |hook| hook.on_replicated_removed(handle, &removed))
    }

    fn active_context(&self, handle: &TriggerHandle) -> Option<TriggerContextRef> {
        let state = self.core.state.borrow();
        state
            .active_by_type
            .get(handle.trigger_type())
            .and_then(|triggers| triggers.get(handle))
            .cloned()
    }

    // =========================================================================
    // Listeners
    // =========================================================================

    /// Register a closure listener for one trigger type.
    ///
    /// See [`register_callback`](Self::register_callback).
    pub fn register_listener<F>(
        &self,
        trigger_type: TriggerTag,
        options: impl Into<ListenerOptions>,
        callback: F,
    ) -> TriggerResult<ListenerRegistration>
    where
        F: FnMut(&TriggerHandle, TriggerPhases, &TriggerContext) + 'static,
    {
        self.register_callback(trigger_type, options, TriggerCallback::new(callback))
    }

    /// Register a listener for one trigger type.
    ///
    /// The listener goes live at the next safe point between queued
    /// operations. With `fire_for_existing`, the callback runs right away for
    /// every matching active trigger of the type, before the listener is
    /// staged.
    pub fn register_callback(
        &self,
        trigger_type: TriggerTag,
        options: impl Into<ListenerOptions>,
        callback: TriggerCallback,
    ) -> TriggerResult<ListenerRegistration> {
        let options = options.into();

        if !callback.is_bound() {
            warn!(%trigger_type, "refusing to register an unbound callback");
            return Err(TriggerError::UnboundCallback);
        }
        if !trigger_type.is_valid() {
            warn!(%trigger_type, "refusing to register a listener for an invalid type");
            return Err(TriggerError::InvalidTriggerType(trigger_type));
        }
        if options.fire_for_existing && !options.phases.contains(TriggerPhases::START) {
            warn!(%trigger_type, phases = %options.phases, "fire_for_existing requires the start phase");
            return Err(TriggerError::FireForExistingRequiresStart);
        }

        let handle = self.create_listener_handle(trigger_type.clone());
        let (sender, removed) = ListenerRemoved::channel();
        let fire_for_existing = options.fire_for_existing;
        let listener = Rc::new(ListenerData::new(trigger_type, options, callback, sender));

        let mut stale = false;
        if fire_for_existing {
            stale = self.fire_for_existing(&listener);
        }

        {
            let mut state = self.core.state.borrow_mut();
            state.pending_add.push((handle.clone(), listener));
            if stale {
                state.pending_remove.insert(handle.clone());
            }
        }
        debug!(listener = %handle, trigger_type = %handle.trigger_type(), "listener registered");

        Ok(ListenerRegistration { handle, removed })
    }

    /// Run a new listener against the already-active triggers of its type.
    /// Returns whether the listener asked to be removed.
    fn fire_for_existing(&self, listener: &ListenerData) -> bool {
        let existing: Vec<(TriggerHandle, TriggerContextRef)> = {
            let state = self.core.state.borrow();
            state
                .active_by_type
                .get(listener.trigger_type())
                .map(|triggers| {
                    triggers
                        .iter()
                        .map(|(handle, context)| (handle.clone(), context.clone()))
                        .collect()
                })
                .unwrap_or_default()
        };

        let mut stale = false;
        for (handle, context) in existing {
            // An earlier callback may have ended it.
            if !self.is_trigger_active(&handle) {
                continue;
            }
            // Snapshot: the callback may edit the live context.
            let context = context.borrow().clone();
            let (verdict, remove_after) = listener.verdict(TriggerPhases::START, &context);
            stale |= remove_after;
            if verdict == ListenerVerdict::Invoke {
                trace!(trigger = %handle, "firing new listener for existing trigger");
                listener.invoke(&handle, TriggerPhases::START, &context);
                self.bump_stats(|stats| stats.callbacks_invoked += 1);
            }
        }
        stale
    }

    /// Stage a listener for removal. Invalid handles are ignored.
    ///
    /// Safe to call from inside a callback, including the listener's own:
    /// the current fan-out still reaches it, later ones do not.
    pub fn remove_listener(&self, handle: &ListenerHandle) {
        if !handle.belongs_to(&self.core) || !self.is_listener_handle_valid(handle) {
            return;
        }
        debug!(listener = %handle, "listener removal staged");
        self.core.state.borrow_mut().pending_remove.insert(handle.clone());
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Check whether the trigger is in the active set right now.
    ///
    /// False while its start is still queued.
    #[must_use]
    pub fn is_trigger_active(&self, handle: &TriggerHandle) -> bool {
        if !handle.is_valid() || !handle.belongs_to(&self.core) {
            return false;
        }
        let state = self.core.state.borrow();
        state
            .active_by_type
            .get(handle.trigger_type())
            .is_some_and(|triggers| triggers.contains_key(handle))
    }

    /// Check whether the trigger will be alive once the queue drains, as
    /// things stand now.
    #[must_use]
    pub fn is_trigger_active_or_pending(&self, handle: &TriggerHandle) -> bool {
        if !handle.is_valid() || !handle.belongs_to(&self.core) {
            return false;
        }
        let queued = self.core.queue.borrow().queued_state(handle);
        match queued {
            QueuedState::Alive => true,
            QueuedState::Removing => false,
            QueuedState::Unqueued => self.is_trigger_active(handle),
        }
    }

    /// Check whether the listener is registered and not being removed.
    #[must_use]
    pub fn is_listener_handle_valid(&self, handle: &ListenerHandle) -> bool {
        if !handle.belongs_to(&self.core) {
            return false;
        }
        let state = self.core.state.borrow();
        if state.pending_remove.contains(handle) {
            return false;
        }
        if state.pending_add.iter().any(|(pending, _)| pending == handle) {
            return true;
        }
        state
            .listeners_by_type
            .get(handle.trigger_type())
            .is_some_and(|bucket| bucket.iter().any(|(live, _)| live == handle))
    }

    /// Number of active triggers across all types.
    #[must_use]
    pub fn active_trigger_count(&self) -> usize {
        self.core
            .state
            .borrow()
            .active_by_type
            .values()
            .map(FxHashMap::len)
            .sum()
    }

    /// Snapshot of the active triggers of one type.
    #[must_use]
    pub fn active_triggers_of(&self, trigger_type: &TriggerTag) -> Vec<(TriggerHandle, TriggerContextRef)> {
        self.core
            .state
            .borrow()
            .active_by_type
            .get(trigger_type)
            .map(|triggers| {
                triggers
                    .iter()
                    .map(|(handle, context)| (handle.clone(), context.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Snapshot of the active triggers of replicated types.
    #[must_use]
    pub fn replicated_triggers(&self) -> Vec<TriggerContextRef> {
        self.core.state.borrow().replicated.clone()
    }

    /// Number of live listeners (staged changes not included).
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.core
            .state
            .borrow()
            .listeners_by_type
            .values()
            .map(Vec::len)
            .sum()
    }

    /// Number of queued operations, including the one being processed.
    #[must_use]
    pub fn pending_operation_count(&self) -> usize {
        self.core.queue.borrow().len()
    }

    /// Check whether a drain is running somewhere up the call stack.
    #[must_use]
    pub fn is_processing(&self) -> bool {
        !self.core.queue.borrow().is_empty()
    }

    #[must_use]
    pub fn stats(&self) -> DispatchStats {
        self.core.stats.get()
    }

    fn bump_stats(&self, update: impl FnOnce(&mut DispatchStats)) {
        let mut stats = self.core.stats.get();
        update(&mut stats);
        self.core.stats.set(stats);
    }
}

fn keep_first(slot: &mut Option<PanicPayload>, payload: Option<PanicPayload>) {
    if let Some(payload) = payload {
        slot.get_or_insert(payload);
    }
}

impl Default for TriggerDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TriggerDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriggerDispatcher")
            .field("name", &self.core.config.name)
            .field("active_triggers", &self.active_trigger_count())
            .field("listeners", &self.listener_count())
            .field("pending_operations", &self.pending_operation_count())
            .finish()
    }
}
