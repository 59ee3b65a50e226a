//! Replication extension point.
//!
//! The dispatcher itself is single-process. Hosts that propagate triggers
//! over the network install a [`ReplicationHook`]; the dispatcher calls it
//! for operations flagged `NETWORK_REPLICATE` and whenever the set of active
//! triggers of a replicated type changes (see
//! [`DispatcherConfig::replicated_types`](crate::core::DispatcherConfig)).
//!
//! Hooks run inside the drain loop. They may call back into the dispatcher;
//! such calls are queued like any other reentrant call.

use crate::triggers::{TriggerContext, TriggerContextRef, TriggerHandle, TriggerOperation};

pub trait ReplicationHook {
    /// An operation flagged for network replication was processed.
    ///
    /// Instantaneous triggers never stay active long enough to be replicated
    /// by state, so they arrive here.
    fn replicate_operation(&mut self, _handle: &TriggerHandle, _operation: TriggerOperation, _context: &TriggerContext) {}

    /// A trigger of a replicated type became active.
    fn on_replicated_added(&mut self, _handle: &TriggerHandle, _context: &TriggerContextRef) {}

    /// A replicated trigger was updated. `replaced` is false for in-place edits.
    fn on_replicated_updated(&mut self, _handle: &TriggerHandle, _context: &TriggerContextRef, _replaced: bool) {}

    /// A replicated trigger ended.
    fn on_replicated_removed(&mut self, _handle: &TriggerHandle, _context: &TriggerContextRef) {}
}

/// The default hook: does nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoReplication;

impl ReplicationHook for NoReplication {}
