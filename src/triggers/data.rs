//! Typed payload bank attached to trigger contexts.
//!
//! A [`TriggerData`] holds at most one value per Rust type. Games define
//! small structs for the extra data their triggers carry (damage amounts,
//! stack counts, ...) and look them up by type.
//!
//! ```
//! use gameplay_trigger::triggers::TriggerData;
//!
//! #[derive(Clone, Debug, Default)]
//! struct Damage(i64);
//!
//! let mut data = TriggerData::new();
//! data.add_unique::<Damage>().0 = 12;
//! assert_eq!(data.get::<Damage>().map(|d| d.0), Some(12));
//! ```

use std::any::{Any, TypeId};

use rustc_hash::FxHashMap;

/// Values that can live in a [`TriggerData`] bank.
///
/// Blanket-implemented for every `Clone + Debug + 'static` type; values must
/// be clonable because contexts are deep-copied for safe updates.
pub trait TriggerDataValue: Any + std::fmt::Debug {
    fn clone_boxed(&self) -> Box<dyn TriggerDataValue>;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T> TriggerDataValue for T
where
    T: Any + Clone + std::fmt::Debug,
{
    fn clone_boxed(&self) -> Box<dyn TriggerDataValue> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// A bank of typed values, one per type.
#[derive(Debug, Default)]
pub struct TriggerData {
    values: FxHashMap<TypeId, Box<dyn TriggerDataValue>>,
}

impl TriggerData {
    /// Create an empty bank.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the value of type `T`, inserting `T::default()` first if absent.
    ///
    /// # Panics
    ///
    /// Never in practice: values are keyed by their own `TypeId`.
    pub fn add_unique<T>(&mut self) -> &mut T
    where
        T: TriggerDataValue + Default,
    {
        self.values
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(T::default()))
            .as_any_mut()
            .downcast_mut::<T>()
            .expect("trigger data stored under a foreign type id")
    }

    /// Insert or replace the value of type `T`, returning the previous one.
    pub fn insert<T: TriggerDataValue>(&mut self, value: T) -> Option<T> {
        self.values
            .insert(TypeId::of::<T>(), Box::new(value))
            .and_then(|old| old.into_any().downcast::<T>().ok())
            .map(|old| *old)
    }

    /// Get the existing value of type `T`.
    #[must_use]
    pub fn get<T: TriggerDataValue>(&self) -> Option<&T> {
        self.values
            .get(&TypeId::of::<T>())
            // Through the trait object: `&Box<_>` also matches the blanket impl.
            .and_then(|value| (**value).as_any().downcast_ref::<T>())
    }

    /// Get the existing value of type `T` for modification.
    pub fn get_mut<T: TriggerDataValue>(&mut self) -> Option<&mut T> {
        self.values
            .get_mut(&TypeId::of::<T>())
            .and_then(|value| (**value).as_any_mut().downcast_mut::<T>())
    }

    /// Check whether a value of type `T` is present.
    #[must_use]
    pub fn contains<T: TriggerDataValue>(&self) -> bool {
        self.values.contains_key(&TypeId::of::<T>())
    }

    /// Remove the value of type `T`, returning it.
    pub fn remove<T: TriggerDataValue>(&mut self) -> Option<T> {
        self.values
            .remove(&TypeId::of::<T>())
            .and_then(|old| old.into_any().downcast::<T>().ok())
            .map(|old| *old)
    }

    /// Number of stored values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the bank is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Clone for TriggerData {
    fn clone(&self) -> Self {
        Self {
            values: self
                .values
                .iter()
                .map(|(id, value)| (*id, (**value).clone_boxed()))
                .collect(),
        }
    }
}
