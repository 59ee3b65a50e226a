//! Trigger contexts.
//!
//! A [`TriggerContext`] describes one occurrence (instantaneous trigger) or
//! one persistent span (started, then ended) of an event. Contexts are
//! shared through [`TriggerContextRef`] because the dispatcher stores the
//! exact object the caller handed in; callers that keep their reference may
//! edit it in place and push the edit with an update.

use std::cell::RefCell;
use std::rc::Rc;

use crate::core::{ObjectRef, TagContainer, TriggerTag};

use super::data::TriggerData;

/// Shared, mutable reference to a trigger context.
///
/// Identity (`Rc::ptr_eq`) matters: an update that passes the same object
/// the dispatcher already stores is treated as an in-place edit.
pub type TriggerContextRef = Rc<RefCell<TriggerContext>>;

/// Data describing one trigger.
#[derive(Clone, Debug, Default)]
pub struct TriggerContext {
    trigger_type: TriggerTag,

    /// Tags describing this particular occurrence. Not used for routing.
    pub trigger_tags: TagContainer,

    /// Who caused the trigger.
    pub initiator: Option<ObjectRef>,

    /// Who the trigger affects.
    pub target: Option<ObjectRef>,

    /// Additional typed payload.
    pub data: TriggerData,
}

impl TriggerContext {
    /// Create a context with a type and occurrence tags.
    pub fn new(trigger_type: TriggerTag, trigger_tags: TagContainer) -> Self {
        Self {
            trigger_type,
            trigger_tags,
            ..Self::default()
        }
    }

    /// Set the initiator (builder pattern).
    #[must_use]
    pub fn with_initiator(mut self, initiator: ObjectRef) -> Self {
        self.initiator = Some(initiator);
        self
    }

    /// Set the target (builder pattern).
    #[must_use]
    pub fn with_target(mut self, target: ObjectRef) -> Self {
        self.target = Some(target);
        self
    }

    /// Attach a payload value (builder pattern).
    #[must_use]
    pub fn with_data<T: super::data::TriggerDataValue>(mut self, value: T) -> Self {
        self.data.insert(value);
        self
    }

    /// The trigger type. Fixed for the lifetime of the context.
    #[must_use]
    pub fn trigger_type(&self) -> &TriggerTag {
        &self.trigger_type
    }

    /// Wrap into a shared reference.
    #[must_use]
    pub fn into_ref(self) -> TriggerContextRef {
        Rc::new(RefCell::new(self))
    }
}

/// Deep-copy a shared context into a new, independent shared context.
///
/// # Panics
///
/// Panics if the context is currently mutably borrowed.
#[must_use]
pub fn deep_copy(context: &TriggerContextRef) -> TriggerContextRef {
    Rc::new(RefCell::new(context.borrow().clone()))
}
