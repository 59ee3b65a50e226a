//! Dispatcher configuration.
//!
//! Hosts configure a dispatcher at startup. Everything has a default, so
//! `DispatcherConfig::default()` is a working configuration; hosts that load
//! settings from disk can deserialize the same struct.

use serde::{Deserialize, Serialize};

use super::TriggerTag;

/// Default queue depth above which the dispatcher logs a warning.
pub const DEFAULT_WARN_QUEUE_DEPTH: usize = 64;

/// Configuration for a [`TriggerDispatcher`](crate::dispatch::TriggerDispatcher).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Name used in log output (e.g. the world this dispatcher belongs to).
    pub name: String,

    /// Trigger types whose active triggers are tracked for replication.
    /// A type is replicated if it matches any entry hierarchically.
    pub replicated_types: Vec<TriggerTag>,

    /// Log a warning when the operation queue grows beyond this many entries.
    /// Deep queues usually mean callbacks are feeding each other.
    pub warn_queue_depth: usize,
}

impl DispatcherConfig {
    /// Create a configuration with the given name and defaults otherwise.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Mark a trigger type (and its descendants) as replicated (builder pattern).
    #[must_use]
    pub fn with_replicated_type(mut self, tag: TriggerTag) -> Self {
        if !self.replicated_types.contains(&tag) {
            self.replicated_types.push(tag);
        }
        self
    }

    /// Set the queue depth warning threshold (builder pattern).
    #[must_use]
    pub fn with_warn_queue_depth(mut self, depth: usize) -> Self {
        self.warn_queue_depth = depth;
        self
    }

    /// Check whether triggers of this type are replicated.
    #[must_use]
    pub fn is_replicated(&self, trigger_type: &TriggerTag) -> bool {
        self.replicated_types
            .iter()
            .any(|replicated| trigger_type.matches(replicated))
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            name: String::from("default"),
            replicated_types: Vec::new(),
            warn_queue_depth: DEFAULT_WARN_QUEUE_DEPTH,
        }
    }
}
