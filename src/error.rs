//! Errors reported at the dispatcher boundary.
//!
//! Every variant is a caller precondition violation. The dispatcher reports
//! it, logs a warning, and leaves its registries untouched. Broken internal
//! invariants are not represented here; they panic.

use thiserror::Error;

use crate::core::TriggerTag;

/// Errors returned by [`TriggerDispatcher`](crate::dispatch::TriggerDispatcher) operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TriggerError {
    /// The handle is empty, was reset, or belongs to a dropped dispatcher.
    #[error("invalid handle {0}")]
    InvalidHandle(String),

    /// The handle was issued by a different dispatcher.
    #[error("handle {0} belongs to another dispatcher")]
    ForeignHandle(String),

    /// The trigger type tag is empty or malformed.
    #[error("invalid trigger type `{0}`")]
    InvalidTriggerType(TriggerTag),

    /// An update context's type differs from the trigger's type.
    #[error("context of type `{found}` cannot update a `{expected}` trigger")]
    TriggerTypeMismatch { expected: TriggerTag, found: TriggerTag },

    /// The listener callback's owner has already been dropped.
    #[error("listener callback is not bound")]
    UnboundCallback,

    /// `fire_for_existing` was requested without listening for the start phase.
    #[error("fire_for_existing requires listening for the start phase")]
    FireForExistingRequiresStart,

    /// The trigger is neither active nor waiting to become active.
    #[error("trigger {0} is not active or pending")]
    TriggerNotActive(String),

    /// The trigger's most recent queued operation removes it.
    #[error("trigger {0} is pending removal")]
    PendingRemoval(String),
}

/// Result alias for dispatcher operations.
pub type TriggerResult<T> = Result<T, TriggerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = TriggerError::InvalidTriggerType(TriggerTag::empty());
        assert_eq!(err.to_string(), "invalid trigger type ``");

        let err = TriggerError::PendingRemoval(String::from("Trigger(3)"));
        assert_eq!(err.to_string(), "trigger Trigger(3) is pending removal");
    }
}
