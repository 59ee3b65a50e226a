//! FIFO queue of trigger operations.
//!
//! The entry currently being processed stays at the front until it is
//! finished, so "the queue is non-empty" means "a drain is running further
//! up the call stack". Lookups by handle scan newest-first: the most recent
//! operation queued for a handle decides what that handle will be once the
//! queue settles.

use std::collections::VecDeque;

use crate::triggers::{TriggerContextRef, TriggerHandle, TriggerOperation};

/// One queued trigger operation.
#[derive(Clone, Debug)]
pub(crate) struct PendingOperation {
    pub handle: TriggerHandle,
    pub operation: TriggerOperation,
    /// Present for add and update operations.
    pub context: Option<TriggerContextRef>,
}

impl PendingOperation {
    pub fn new(handle: TriggerHandle, operation: TriggerOperation, context: Option<TriggerContextRef>) -> Self {
        debug_assert_eq!(
            operation.stores_context(),
            context.is_some(),
            "add/update operations carry a context, others do not"
        );
        Self {
            handle,
            operation,
            context,
        }
    }
}

/// What the queue says about a handle's future.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum QueuedState {
    /// Newest queued operation adds or updates the trigger.
    Alive,
    /// Newest queued operation removes the trigger.
    Removing,
    /// Nothing queued for the handle.
    Unqueued,
}

#[derive(Debug, Default)]
pub(crate) struct OperationQueue {
    entries: VecDeque<PendingOperation>,
}

impl OperationQueue {
    pub fn push_back(&mut self, operation: PendingOperation) {
        self.entries.push_back(operation);
    }

    pub fn front(&self) -> Option<&PendingOperation> {
        self.entries.front()
    }

    pub fn pop_front(&mut self) -> Option<PendingOperation> {
        self.entries.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Newest operation for `handle` that adds, updates or removes it.
    pub fn newest_for(&self, handle: &TriggerHandle) -> Option<&PendingOperation> {
        let lifecycle = TriggerOperation::ADD_ACTIVE_TRIGGER
            | TriggerOperation::UPDATE_ACTIVE_TRIGGER
            | TriggerOperation::REMOVE_ACTIVE_TRIGGER;
        self.entries
            .iter()
            .rev()
            .find(|pending| pending.handle == *handle && pending.operation.intersects(lifecycle))
    }

    pub fn queued_state(&self, handle: &TriggerHandle) -> QueuedState {
        match self.newest_for(handle) {
            Some(pending) if pending.operation.contains(TriggerOperation::REMOVE_ACTIVE_TRIGGER) => {
                QueuedState::Removing
            }
            Some(_) => QueuedState::Alive,
            None => QueuedState::Unqueued,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Weak;

    use super::*;
    use crate::core::{TagContainer, TriggerTag};
    use crate::triggers::TriggerContext;

    fn handle() -> TriggerHandle {
        TriggerHandle::issue(TriggerTag::new("Q"), Weak::new())
    }

    fn context() -> TriggerContextRef {
        TriggerContext::new(TriggerTag::new("Q"), TagContainer::new()).into_ref()
    }

    #[test]
    fn test_fifo_order() {
        let mut queue = OperationQueue::default();
        let a = handle();
        let b = handle();
        queue.push_back(PendingOperation::new(a.clone(), TriggerOperation::OPEN, Some(context())));
        queue.push_back(PendingOperation::new(b.clone(), TriggerOperation::OPEN, Some(context())));

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pop_front().map(|op| op.handle), Some(a));
        assert_eq!(queue.front().map(|op| op.handle.clone()), Some(b));
    }

    #[test]
    fn test_queued_state_uses_newest() {
        let mut queue = OperationQueue::default();
        let a = handle();
        assert_eq!(queue.queued_state(&a), QueuedState::Unqueued);

        queue.push_back(PendingOperation::new(a.clone(), TriggerOperation::OPEN, Some(context())));
        assert_eq!(queue.queued_state(&a), QueuedState::Alive);

        queue.push_back(PendingOperation::new(a.clone(), TriggerOperation::CLOSE, None));
        assert_eq!(queue.queued_state(&a), QueuedState::Removing);

        assert_eq!(queue.queued_state(&handle()), QueuedState::Unqueued);
    }

    #[test]
    fn test_newest_for_picks_latest_update() {
        let mut queue = OperationQueue::default();
        let a = handle();
        let first = context();
        let second = context();
        queue.push_back(PendingOperation::new(a.clone(), TriggerOperation::UPDATE, Some(first)));
        queue.push_back(PendingOperation::new(a.clone(), TriggerOperation::UPDATE, Some(second.clone())));

        let newest = queue.newest_for(&a).and_then(|op| op.context.clone()).unwrap();
        assert!(std::rc::Rc::ptr_eq(&newest, &second));
    }
}
