//! Collaborator types: tags, opaque object references, configuration.
//!
//! The dispatcher only needs these at their interface. Hosts with their own
//! tag or object systems map onto them at the boundary.

pub mod config;
pub mod object;
pub mod tag;

pub use config::{DispatcherConfig, DEFAULT_WARN_QUEUE_DEPTH};
pub use object::{ObjectRef, WeakObjectRef};
pub use tag::{TagContainer, TriggerTag};
