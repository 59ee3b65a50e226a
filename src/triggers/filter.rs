//! Pluggable listener filters.
//!
//! Beyond exact type routing and the initiator/target identity filters,
//! a listener may carry an ordered list of [`TriggerFilter`]s. Each filter
//! sees the phase and context of a trigger and answers two independent
//! questions:
//!
//! - did the trigger pass (should the callback run this time)?
//! - is the filter stale (will it never be meaningful again)?
//!
//! A stale filter gets its listener removed at the next safe point, whatever
//! the pass/block answer was for the current trigger.
//!
//! ## Provided filters
//!
//! - [`FilterCondition`]: data-only conditions on tags and phases, with
//!   `All` / `Any` / `Not` combinators. Serializable, so games can load them.
//! - [`DataMatches`]: a predicate over one typed payload value.
//! - [`ObjectFilter`]: a predicate over a weakly-held object; stale once the
//!   object is dropped.
//! - Any `Fn(TriggerPhases, &TriggerContext) -> FilterOutcome` closure.

use std::marker::PhantomData;

use serde::{Deserialize, Serialize};

use crate::core::{TagContainer, TriggerTag, WeakObjectRef};

use super::context::TriggerContext;
use super::data::TriggerDataValue;
use super::phase::TriggerPhases;

/// Result of evaluating one filter against one trigger.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FilterOutcome {
    /// The trigger may reach the callback.
    pub passed: bool,
    /// The filter can never pass again; its listener should be removed.
    pub stale: bool,
}

impl FilterOutcome {
    pub const PASS: Self = Self { passed: true, stale: false };
    pub const BLOCK: Self = Self { passed: false, stale: false };

    #[must_use]
    pub const fn from_passed(passed: bool) -> Self {
        Self { passed, stale: false }
    }

    /// Mark this outcome stale (builder pattern).
    #[must_use]
    pub const fn and_stale(self) -> Self {
        Self { passed: self.passed, stale: true }
    }
}

/// A predicate over trigger phase and context.
pub trait TriggerFilter {
    fn evaluate(&self, phase: TriggerPhases, context: &TriggerContext) -> FilterOutcome;
}

impl<F> TriggerFilter for F
where
    F: Fn(TriggerPhases, &TriggerContext) -> FilterOutcome,
{
    fn evaluate(&self, phase: TriggerPhases, context: &TriggerContext) -> FilterOutcome {
        self(phase, context)
    }
}

/// Data-only filter conditions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterCondition {
    // === Tag Filters ===

    /// Occurrence tags must include this tag (hierarchically).
    HasTag(TriggerTag),

    /// Occurrence tags must not include this tag (hierarchically).
    LacksTag(TriggerTag),

    /// Occurrence tags must include at least one of these.
    HasAnyTag(TagContainer),

    /// Occurrence tags must include all of these.
    HasAllTags(TagContainer),

    // === Phase Filters ===

    /// The announced phase must intersect this mask.
    PhaseIn(TriggerPhases),

    // === Combinators ===

    /// All conditions must pass.
    All(Vec<FilterCondition>),

    /// At least one condition must pass.
    Any(Vec<FilterCondition>),

    /// Condition must fail.
    Not(Box<FilterCondition>),

    // === Special ===

    /// Always passes.
    Always,

    /// Never passes.
    Never,
}

impl FilterCondition {
    /// Create an AND condition.
    pub fn all(conditions: impl IntoIterator<Item = FilterCondition>) -> Self {
        Self::All(conditions.into_iter().collect())
    }

    /// Create an OR condition.
    pub fn any(conditions: impl IntoIterator<Item = FilterCondition>) -> Self {
        Self::Any(conditions.into_iter().collect())
    }

    /// Negate this condition.
    #[must_use]
    pub fn negate(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// Add another condition with AND.
    #[must_use]
    pub fn and(self, other: FilterCondition) -> Self {
        match self {
            Self::All(mut conditions) => {
                conditions.push(other);
                Self::All(conditions)
            }
            _ => Self::All(vec![self, other]),
        }
    }

    /// Add another condition with OR.
    #[must_use]
    pub fn or(self, other: FilterCondition) -> Self {
        match self {
            Self::Any(mut conditions) => {
                conditions.push(other);
                Self::Any(conditions)
            }
            _ => Self::Any(vec![self, other]),
        }
    }

    /// Check whether the condition holds.
    #[must_use]
    pub fn holds(&self, phase: TriggerPhases, context: &TriggerContext) -> bool {
        match self {
            Self::HasTag(tag) => context.trigger_tags.has_tag(tag),
            Self::LacksTag(tag) => !context.trigger_tags.has_tag(tag),
            Self::HasAnyTag(tags) => context.trigger_tags.has_any(tags),
            Self::HasAllTags(tags) => context.trigger_tags.has_all(tags),
            Self::PhaseIn(mask) => phase.intersects(*mask),
            Self::All(conditions) => conditions.iter().all(|c| c.holds(phase, context)),
            Self::Any(conditions) => conditions.iter().any(|c| c.holds(phase, context)),
            Self::Not(inner) => !inner.holds(phase, context),
            Self::Always => true,
            Self::Never => false,
        }
    }
}

impl TriggerFilter for FilterCondition {
    fn evaluate(&self, phase: TriggerPhases, context: &TriggerContext) -> FilterOutcome {
        FilterOutcome::from_passed(self.holds(phase, context))
    }
}

/// Passes when the payload holds a `T` satisfying the predicate.
///
/// A missing value blocks.
pub struct DataMatches<T, F> {
    predicate: F,
    _marker: PhantomData<fn(&T)>,
}

impl<T, F> DataMatches<T, F>
where
    T: TriggerDataValue,
    F: Fn(&T) -> bool,
{
    pub fn new(predicate: F) -> Self {
        Self {
            predicate,
            _marker: PhantomData,
        }
    }
}

impl<T, F> TriggerFilter for DataMatches<T, F>
where
    T: TriggerDataValue,
    F: Fn(&T) -> bool,
{
    fn evaluate(&self, _phase: TriggerPhases, context: &TriggerContext) -> FilterOutcome {
        let passed = context.data.get::<T>().is_some_and(|value| (self.predicate)(value));
        FilterOutcome::from_passed(passed)
    }
}

/// Passes when a predicate over a weakly-held object holds.
///
/// Once the object is dropped the filter blocks and reports itself stale.
pub struct ObjectFilter<F> {
    object: WeakObjectRef,
    predicate: F,
}

impl<F> ObjectFilter<F>
where
    F: Fn(&crate::core::ObjectRef, &TriggerContext) -> bool,
{
    pub fn new(object: WeakObjectRef, predicate: F) -> Self {
        Self { object, predicate }
    }
}

impl<F> TriggerFilter for ObjectFilter<F>
where
    F: Fn(&crate::core::ObjectRef, &TriggerContext) -> bool,
{
    fn evaluate(&self, _phase: TriggerPhases, context: &TriggerContext) -> FilterOutcome {
        match self.object.upgrade() {
            Some(object) => FilterOutcome::from_passed((self.predicate)(&object, context)),
            None => FilterOutcome::BLOCK.and_stale(),
        }
    }
}
