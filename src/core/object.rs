//! Opaque object identities for initiators, targets and filters.
//!
//! Triggers hold strong [`ObjectRef`]s to the objects that caused or are
//! affected by them. Listeners that filter on an object hold a
//! [`WeakObjectRef`] so that subscribing never keeps the object alive; once
//! the object is dropped the listener is considered stale and is removed.
//!
//! Equality is identity: two refs are equal when they point at the same
//! allocation, regardless of the value stored there.

use std::any::Any;
use std::rc::{Rc, Weak};

/// A strong, identity-compared reference to an arbitrary object.
#[derive(Clone)]
pub struct ObjectRef(Rc<dyn Any>);

impl ObjectRef {
    /// Wrap a new object.
    pub fn new<T: Any>(value: T) -> Self {
        Self(Rc::new(value))
    }

    /// Share an object the caller already holds in an `Rc`.
    pub fn from_rc<T: Any>(rc: Rc<T>) -> Self {
        Self(rc)
    }

    /// Create a non-owning reference to the same object.
    #[must_use]
    pub fn downgrade(&self) -> WeakObjectRef {
        WeakObjectRef(Rc::downgrade(&self.0))
    }

    /// Downcast to the concrete object type.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    fn addr(&self) -> *const () {
        Rc::as_ptr(&self.0).cast::<()>()
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.addr() == other.addr()
    }
}

impl Eq for ObjectRef {}

impl std::fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ObjectRef({:p})", self.addr())
    }
}

/// A non-owning object reference. Resolves while the object is alive.
#[derive(Clone)]
pub struct WeakObjectRef(Weak<dyn Any>);

impl WeakObjectRef {
    /// Check whether the referenced object is still alive.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.0.strong_count() > 0
    }

    /// Resolve to a strong reference, if the object is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<ObjectRef> {
        self.0.upgrade().map(ObjectRef)
    }

    /// Identity comparison against an optional strong reference.
    ///
    /// An expired reference never matches anything.
    #[must_use]
    pub fn refers_to(&self, object: Option<&ObjectRef>) -> bool {
        match object {
            Some(object) => self.is_valid() && self.addr() == object.addr(),
            None => false,
        }
    }

    fn addr(&self) -> *const () {
        self.0.as_ptr().cast::<()>()
    }
}

impl From<&ObjectRef> for WeakObjectRef {
    fn from(object: &ObjectRef) -> Self {
        object.downgrade()
    }
}

impl std::fmt::Debug for WeakObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_valid() {
            write!(f, "WeakObjectRef({:p})", self.addr())
        } else {
            f.write_str("WeakObjectRef(expired)")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_equality() {
        let a = ObjectRef::new(5_u32);
        let b = ObjectRef::new(5_u32);

        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn test_downcast() {
        let a = ObjectRef::new(String::from("hero"));
        assert_eq!(a.downcast_ref::<String>().map(String::as_str), Some("hero"));
        assert!(a.downcast_ref::<u32>().is_none());
    }

    #[test]
    fn test_weak_expires() {
        let a = ObjectRef::new(1_u8);
        let weak = a.downgrade();

        assert!(weak.is_valid());
        assert!(weak.refers_to(Some(&a)));
        assert_eq!(weak.upgrade(), Some(a.clone()));

        drop(a);
        assert!(!weak.is_valid());
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_weak_refers_to() {
        let a = ObjectRef::new(1_u8);
        let b = ObjectRef::new(1_u8);
        let weak = a.downgrade();

        assert!(!weak.refers_to(Some(&b)));
        assert!(!weak.refers_to(None));
    }

    #[test]
    fn test_from_rc_shares_identity() {
        let rc = Rc::new(7_i32);
        let a = ObjectRef::from_rc(rc.clone());
        let b = ObjectRef::from_rc(rc);
        assert_eq!(a, b);
    }
}
