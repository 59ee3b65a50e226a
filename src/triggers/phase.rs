//! Listener phases and queued trigger operations.
//!
//! [`TriggerOperation`] describes what a queued entry does to a trigger;
//! [`TriggerPhases`] describes which lifecycle points a listener cares about.
//! The two share bit positions on purpose: `ADD_ACTIVE_TRIGGER` is the start
//! bit, `UPDATE_ACTIVE_TRIGGER` the update bit and `REMOVE_ACTIVE_TRIGGER`
//! the end bit, so the phases an operation announces are just its bits masked
//! with [`TriggerPhases::ALL`].
//!
//! ```
//! use gameplay_trigger::triggers::{TriggerOperation, TriggerPhases};
//!
//! assert_eq!(TriggerOperation::INSTANTANEOUS.phases(), TriggerPhases::START | TriggerPhases::END);
//! assert_eq!(TriggerOperation::UPDATE.phases(), TriggerPhases::UPDATE);
//! assert_eq!(TriggerOperation::CLOSE.phases(), TriggerPhases::END);
//! ```

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Operation flags carried by a queued trigger operation.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct TriggerOperation: u8 {
        /// Store the attached context as a new active trigger.
        const ADD_ACTIVE_TRIGGER = 1 << 0;
        /// Replace (or accept in-place edits to) an active trigger's context.
        const UPDATE_ACTIVE_TRIGGER = 1 << 1;
        /// Fan out to listeners.
        const PROCESS_CALLBACKS = 1 << 2;
        /// Hand the operation to the replication hook.
        const NETWORK_REPLICATE = 1 << 3;
        /// Erase the trigger from the active set.
        const REMOVE_ACTIVE_TRIGGER = 1 << 4;

        /// Fires once with start and end together; never stays active.
        const INSTANTANEOUS = Self::ADD_ACTIVE_TRIGGER.bits()
            | Self::PROCESS_CALLBACKS.bits()
            | Self::REMOVE_ACTIVE_TRIGGER.bits();
        const NETWORKED_INSTANTANEOUS = Self::INSTANTANEOUS.bits() | Self::NETWORK_REPLICATE.bits();
        /// Starts a trigger that stays active until closed.
        const OPEN = Self::ADD_ACTIVE_TRIGGER.bits() | Self::PROCESS_CALLBACKS.bits();
        const UPDATE = Self::UPDATE_ACTIVE_TRIGGER.bits() | Self::PROCESS_CALLBACKS.bits();
        const CLOSE = Self::PROCESS_CALLBACKS.bits() | Self::REMOVE_ACTIVE_TRIGGER.bits();
    }
}

bitflags! {
    /// Lifecycle points a listener can subscribe to.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct TriggerPhases: u8 {
        const START = TriggerOperation::ADD_ACTIVE_TRIGGER.bits();
        const UPDATE = TriggerOperation::UPDATE_ACTIVE_TRIGGER.bits();
        const END = TriggerOperation::REMOVE_ACTIVE_TRIGGER.bits();

        const ALL = Self::START.bits() | Self::UPDATE.bits() | Self::END.bits();
    }
}

impl TriggerOperation {
    /// The listener phases this operation announces.
    #[must_use]
    pub const fn phases(self) -> TriggerPhases {
        TriggerPhases::from_bits_truncate(self.bits() & TriggerPhases::ALL.bits())
    }

    /// Whether this operation fans out to listeners.
    #[must_use]
    pub const fn processes_callbacks(self) -> bool {
        self.contains(Self::PROCESS_CALLBACKS)
    }

    /// Whether this operation carries a context of its own.
    #[must_use]
    pub const fn stores_context(self) -> bool {
        self.intersects(Self::ADD_ACTIVE_TRIGGER.union(Self::UPDATE_ACTIVE_TRIGGER))
    }
}

impl Default for TriggerPhases {
    fn default() -> Self {
        Self::empty()
    }
}

impl std::fmt::Display for TriggerPhases {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return f.write_str("None");
        }
        let names: Vec<&str> = self.iter_names().map(|(name, _)| name).collect();
        f.write_str(&names.join("|"))
    }
}
