//! Trigger data model.
//!
//! Everything a trigger or listener is made of, independent of how the
//! dispatcher schedules them:
//!
//! - [`TriggerPhases`] / [`TriggerOperation`]: phase masks and queued
//!   operation flags (sharing bit positions)
//! - [`TriggerContext`]: the payload a trigger carries, shared as a
//!   [`TriggerContextRef`]
//! - [`TriggerData`]: type-keyed extension data inside a context
//! - [`TriggerHandle`] / [`ListenerHandle`]: opaque identifiers handed out by
//!   the dispatcher
//! - [`TriggerFilter`] and the built-in filters
//! - [`TriggerCallback`], [`ListenerOptions`] and [`ListenerRemoved`]
//!
//! ## Example
//!
//! ```
//! use gameplay_trigger::core::{TagContainer, TriggerTag};
//! use gameplay_trigger::triggers::{FilterCondition, ListenerOptions, TriggerContext, TriggerPhases};
//!
//! let options = ListenerOptions::new(TriggerPhases::START | TriggerPhases::END)
//!     .with_filter(FilterCondition::HasTag(TriggerTag::new("Damage.Fire")));
//! assert_eq!(options.filters.len(), 1);
//!
//! let context = TriggerContext::new(
//!     TriggerTag::new("Combat.Hit"),
//!     TagContainer::new().with("Damage.Fire"),
//! );
//! assert!(context.trigger_tags.has_tag(&TriggerTag::new("Damage")));
//! ```

mod context;
mod data;
mod filter;
mod handle;
mod listener;
mod phase;

pub use context::{deep_copy, TriggerContext, TriggerContextRef};
pub use data::{TriggerData, TriggerDataValue};
pub use filter::{DataMatches, FilterCondition, FilterOutcome, ObjectFilter, TriggerFilter};
pub use handle::{HandleId, ListenerHandle, TriggerHandle};
pub use listener::{ListenerOptions, ListenerRegistration, ListenerRemoved, TriggerCallback};
pub use phase::{TriggerOperation, TriggerPhases};

pub(crate) use listener::{ListenerData, ListenerVerdict};
