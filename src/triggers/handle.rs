//! Trigger and listener handles.
//!
//! Handles are the only external representation of dispatcher state. Each
//! one carries a process-unique id, the trigger type it was issued for, and
//! a weak back-reference to the issuing dispatcher. Equality and hashing use
//! the id alone.
//!
//! A handle never keeps its dispatcher alive. Once the dispatcher is dropped
//! every handle it issued reports itself invalid.

use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::TriggerTag;
use crate::dispatch::{DispatcherCore, TriggerDispatcher};

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique handle identifier. Zero is the empty id.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HandleId(pub u64);

impl HandleId {
    /// The empty id, never issued.
    pub const EMPTY: Self = Self(0);

    /// Allocate a fresh id.
    #[must_use]
    pub fn generate() -> Self {
        Self(NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Check whether this id was ever issued.
    #[must_use]
    pub const fn is_set(self) -> bool {
        self.0 != 0
    }
}

/// Identifies one trigger (active, queued, or finished).
#[derive(Clone)]
pub struct TriggerHandle {
    id: HandleId,
    trigger_type: TriggerTag,
    dispatcher: Weak<DispatcherCore>,
}

impl TriggerHandle {
    pub(crate) fn issue(trigger_type: TriggerTag, dispatcher: Weak<DispatcherCore>) -> Self {
        Self {
            id: HandleId::generate(),
            trigger_type,
            dispatcher,
        }
    }

    /// A handle that identifies nothing.
    pub fn empty() -> Self {
        Self {
            id: HandleId::EMPTY,
            trigger_type: TriggerTag::empty(),
            dispatcher: Weak::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> HandleId {
        self.id
    }

    #[must_use]
    pub fn trigger_type(&self) -> &TriggerTag {
        &self.trigger_type
    }

    /// Check that the handle was issued and its dispatcher is still alive.
    ///
    /// This says nothing about whether the trigger is still running; see
    /// [`is_active`](Self::is_active).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.id.is_set() && self.trigger_type.is_valid() && self.dispatcher.strong_count() > 0
    }

    /// Check whether the trigger is currently in the dispatcher's active set.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.dispatcher()
            .is_some_and(|dispatcher| dispatcher.is_trigger_active(self))
    }

    /// Check whether the trigger is active or will be once queued work drains.
    #[must_use]
    pub fn is_active_or_pending(&self) -> bool {
        self.dispatcher()
            .is_some_and(|dispatcher| dispatcher.is_trigger_active_or_pending(self))
    }

    /// The dispatcher that issued this handle, if it is still alive.
    #[must_use]
    pub fn dispatcher(&self) -> Option<TriggerDispatcher> {
        if !self.id.is_set() {
            return None;
        }
        self.dispatcher.upgrade().map(TriggerDispatcher::from_core)
    }

    /// End the trigger if it is still alive, then clear the handle.
    pub fn reset(&mut self) {
        if let Some(dispatcher) = self.dispatcher() {
            if dispatcher.is_trigger_active_or_pending(self) {
                if let Err(err) = dispatcher.end_trigger(self) {
                    debug!(trigger = %self, %err, "could not end trigger on reset");
                }
            }
        }
        *self = Self::empty();
    }

    pub(crate) fn belongs_to(&self, core: &Rc<DispatcherCore>) -> bool {
        std::ptr::eq(self.dispatcher.as_ptr(), Rc::as_ptr(core))
    }
}

impl Default for TriggerHandle {
    fn default() -> Self {
        Self::empty()
    }
}

impl PartialEq for TriggerHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TriggerHandle {}

impl Hash for TriggerHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl std::fmt::Debug for TriggerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriggerHandle")
            .field("id", &self.id.0)
            .field("trigger_type", &self.trigger_type)
            .finish()
    }
}

impl std::fmt::Display for TriggerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Trigger({})", self.id.0)
    }
}

/// Identifies one listener registration.
#[derive(Clone)]
pub struct ListenerHandle {
    id: HandleId,
    trigger_type: TriggerTag,
    dispatcher: Weak<DispatcherCore>,
}

impl ListenerHandle {
    pub(crate) fn issue(trigger_type: TriggerTag, dispatcher: Weak<DispatcherCore>) -> Self {
        Self {
            id: HandleId::generate(),
            trigger_type,
            dispatcher,
        }
    }

    /// A handle that identifies nothing.
    pub fn empty() -> Self {
        Self {
            id: HandleId::EMPTY,
            trigger_type: TriggerTag::empty(),
            dispatcher: Weak::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> HandleId {
        self.id
    }

    #[must_use]
    pub fn trigger_type(&self) -> &TriggerTag {
        &self.trigger_type
    }

    /// Check that the listener is registered (live or pending add) and not
    /// scheduled for removal.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.id.is_set()
            && self.trigger_type.is_valid()
            && self
                .dispatcher()
                .is_some_and(|dispatcher| dispatcher.is_listener_handle_valid(self))
    }

    /// The dispatcher that issued this handle, if it is still alive.
    #[must_use]
    pub fn dispatcher(&self) -> Option<TriggerDispatcher> {
        if !self.id.is_set() {
            return None;
        }
        self.dispatcher.upgrade().map(TriggerDispatcher::from_core)
    }

    /// Remove the listener if it is still registered, then clear the handle.
    pub fn reset(&mut self) {
        if let Some(dispatcher) = self.dispatcher() {
            dispatcher.remove_listener(self);
        }
        *self = Self::empty();
    }

    pub(crate) fn belongs_to(&self, core: &Rc<DispatcherCore>) -> bool {
        std::ptr::eq(self.dispatcher.as_ptr(), Rc::as_ptr(core))
    }
}

impl Default for ListenerHandle {
    fn default() -> Self {
        Self::empty()
    }
}

impl PartialEq for ListenerHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ListenerHandle {}

impl Hash for ListenerHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl std::fmt::Debug for ListenerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerHandle")
            .field("id", &self.id.0)
            .field("trigger_type", &self.trigger_type)
            .finish()
    }
}

impl std::fmt::Display for ListenerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Listener({})", self.id.0)
    }
}
