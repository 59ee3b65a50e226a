//! # gameplay-trigger
//!
//! A reentrant, tag-routed trigger dispatcher for gameplay events.
//!
//! Gameplay code fires *triggers* ("a hit landed", "a buff started"), and
//! *listeners* registered for a trigger type hear about them. Triggers are
//! either instantaneous (start and end in one step) or persistent (start,
//! any number of updates, end).
//!
//! ## Design Principles
//!
//! 1. **Reentrant**: listener callbacks may call any dispatcher method,
//!    including starting, updating and ending triggers and registering or
//!    removing listeners.
//!
//! 2. **Ordered**: lifecycle operations go through a single FIFO queue.
//!    Every listener observes every trigger's start, updates and end in
//!    the order they were requested.
//!
//! 3. **Stable fan-out**: listener table changes are staged and applied
//!    between queued operations, never during one.
//!
//! ## Modules
//!
//! - `core`: Trigger tags, opaque object references, configuration
//! - `triggers`: Phases, contexts, handles, filters, listeners
//! - `dispatch`: The dispatcher and its replication hook
//! - `error`: Precondition errors
//!
//! ## Example
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! use gameplay_trigger::{TagContainer, TriggerDispatcher, TriggerPhases, TriggerTag};
//!
//! let dispatcher = TriggerDispatcher::new();
//! let hits = Rc::new(Cell::new(0));
//!
//! let counter = Rc::clone(&hits);
//! dispatcher
//!     .register_listener(TriggerTag::new("Combat.Hit"), TriggerPhases::START, move |_, _, _| {
//!         counter.set(counter.get() + 1);
//!     })
//!     .unwrap();
//!
//! dispatcher
//!     .instantaneous_trigger_with(TriggerTag::new("Combat.Hit"), TagContainer::new(), None, None)
//!     .unwrap();
//! assert_eq!(hits.get(), 1);
//! ```

pub mod core;
pub mod dispatch;
pub mod error;
pub mod triggers;

// Re-export commonly used types
pub use crate::core::{DispatcherConfig, ObjectRef, TagContainer, TriggerTag, WeakObjectRef};

pub use crate::dispatch::{DispatchStats, NoReplication, ReplicationHook, TriggerDispatcher};

pub use crate::error::{TriggerError, TriggerResult};

pub use crate::triggers::{
    FilterCondition, FilterOutcome, ListenerHandle, ListenerOptions, ListenerRegistration,
    ListenerRemoved, TriggerCallback, TriggerContext, TriggerContextRef, TriggerData,
    TriggerFilter, TriggerHandle, TriggerOperation, TriggerPhases,
};
