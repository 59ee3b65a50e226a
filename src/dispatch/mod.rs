//! Trigger scheduling and fan-out.
//!
//! - [`TriggerDispatcher`]: the reentrant dispatcher
//! - [`ReplicationHook`]: extension point for network replication
//!
//! The operation queue is internal; its effects are observable through
//! [`TriggerDispatcher::pending_operation_count`],
//! [`TriggerDispatcher::is_processing`] and the active-or-pending queries.

mod dispatcher;
mod queue;
mod replication;

pub use dispatcher::{DispatchStats, TriggerDispatcher};
pub use replication::{NoReplication, ReplicationHook};

pub(crate) use dispatcher::DispatcherCore;
