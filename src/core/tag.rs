//! Hierarchical trigger tags.
//!
//! A [`TriggerTag`] is a dot-separated name such as `Ability.Fire.Started`.
//! Tags are the routing key for listeners (exact match) and also describe
//! individual trigger occurrences through a [`TagContainer`].
//!
//! ## Hierarchy
//!
//! `Ability.Fire` is a parent of `Ability.Fire.Started`. Routing never uses
//! the hierarchy; it is available to filters and configuration through
//! [`TriggerTag::matches`].
//!
//! ```
//! use gameplay_trigger::core::TriggerTag;
//!
//! let started = TriggerTag::new("Ability.Fire.Started");
//! assert!(started.matches(&TriggerTag::new("Ability.Fire")));
//! assert!(!started.matches(&TriggerTag::new("Ability.Fi")));
//! assert!(!TriggerTag::empty().is_valid());
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// A hierarchical tag identifying a kind of trigger.
///
/// Cloning is cheap (shared string). The empty tag is invalid and never
/// routes to any listener.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TriggerTag(Arc<str>);

impl TriggerTag {
    /// Create a tag from its dotted name.
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref().trim()))
    }

    /// The empty (invalid) tag.
    pub fn empty() -> Self {
        Self(Arc::from(""))
    }

    /// Get the dotted name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// A tag is valid when it is non-empty and has no empty segments.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.0.is_empty() && self.0.split('.').all(|segment| !segment.is_empty())
    }

    /// Check whether this tag equals `other` or is a descendant of it.
    ///
    /// Matching is segment-wise, so `A.BC` does not match `A.B`.
    #[must_use]
    pub fn matches(&self, other: &TriggerTag) -> bool {
        if !self.is_valid() || !other.is_valid() {
            return false;
        }
        match self.0.strip_prefix(&*other.0) {
            Some(rest) => rest.is_empty() || rest.starts_with('.'),
            None => false,
        }
    }

    /// The immediate parent, if this tag has more than one segment.
    #[must_use]
    pub fn parent(&self) -> Option<TriggerTag> {
        self.0.rfind('.').map(|idx| Self(Arc::from(&self.0[..idx])))
    }
}

impl Default for TriggerTag {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<&str> for TriggerTag {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl std::fmt::Debug for TriggerTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TriggerTag({})", self.0)
    }
}

impl std::fmt::Display for TriggerTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A small ordered set of tags describing one trigger occurrence.
///
/// Most triggers carry zero to a handful of tags, so storage is inline.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagContainer {
    tags: SmallVec<[TriggerTag; 4]>,
}

impl TagContainer {
    /// Create an empty container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tag (builder pattern).
    #[must_use]
    pub fn with(mut self, tag: impl Into<TriggerTag>) -> Self {
        self.add(tag.into());
        self
    }

    /// Add a tag. Invalid and duplicate tags are ignored.
    ///
    /// Returns `true` if the tag was inserted.
    pub fn add(&mut self, tag: TriggerTag) -> bool {
        if !tag.is_valid() || self.has_tag_exact(&tag) {
            return false;
        }
        self.tags.push(tag);
        true
    }

    /// Remove a tag. Returns `true` if it was present.
    pub fn remove(&mut self, tag: &TriggerTag) -> bool {
        let before = self.tags.len();
        self.tags.retain(|t| t != tag);
        self.tags.len() != before
    }

    /// Check for a tag, including hierarchical matches (`A.B` satisfies `A`).
    #[must_use]
    pub fn has_tag(&self, tag: &TriggerTag) -> bool {
        self.tags.iter().any(|t| t.matches(tag))
    }

    /// Check for an exact tag.
    #[must_use]
    pub fn has_tag_exact(&self, tag: &TriggerTag) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Check whether any of `tags` is present (hierarchically).
    #[must_use]
    pub fn has_any(&self, tags: &TagContainer) -> bool {
        tags.iter().any(|t| self.has_tag(t))
    }

    /// Check whether all of `tags` are present (hierarchically).
    #[must_use]
    pub fn has_all(&self, tags: &TagContainer) -> bool {
        tags.iter().all(|t| self.has_tag(t))
    }

    /// Number of tags.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// Check if the container is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Iterate tags in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &TriggerTag> {
        self.tags.iter()
    }
}

impl FromIterator<TriggerTag> for TagContainer {
    fn from_iter<I: IntoIterator<Item = TriggerTag>>(iter: I) -> Self {
        let mut container = Self::new();
        for tag in iter {
            container.add(tag);
        }
        container
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_validity() {
        assert!(TriggerTag::new("Damage").is_valid());
        assert!(TriggerTag::new("Damage.Fire").is_valid());
        assert!(!TriggerTag::new("").is_valid());
        assert!(!TriggerTag::new("Damage..Fire").is_valid());
        assert!(!TriggerTag::new(".Damage").is_valid());
        assert!(!TriggerTag::default().is_valid());
    }

    #[test]
    fn test_tag_matches_hierarchy() {
        let child = TriggerTag::new("Damage.Fire.Burn");

        assert!(child.matches(&TriggerTag::new("Damage")));
        assert!(child.matches(&TriggerTag::new("Damage.Fire")));
        assert!(child.matches(&child));
        assert!(!child.matches(&TriggerTag::new("Damage.Fi")));
        assert!(!TriggerTag::new("Damage").matches(&child));
        assert!(!child.matches(&TriggerTag::empty()));
    }

    #[test]
    fn test_tag_parent() {
        let tag = TriggerTag::new("A.B.C");
        assert_eq!(tag.parent(), Some(TriggerTag::new("A.B")));
        assert_eq!(TriggerTag::new("A").parent(), None);
    }

    #[test]
    fn test_tag_equality_and_display() {
        assert_eq!(TriggerTag::new("A.B"), TriggerTag::from("A.B"));
        assert_ne!(TriggerTag::new("A.B"), TriggerTag::new("A.C"));
        assert_eq!(format!("{}", TriggerTag::new("A.B")), "A.B");
        assert_eq!(format!("{:?}", TriggerTag::new("A.B")), "TriggerTag(A.B)");
    }

    #[test]
    fn test_container_add_remove() {
        let mut tags = TagContainer::new();
        assert!(tags.add(TriggerTag::new("Element.Fire")));
        assert!(!tags.add(TriggerTag::new("Element.Fire")));
        assert!(!tags.add(TriggerTag::empty()));
        assert_eq!(tags.len(), 1);

        assert!(tags.remove(&TriggerTag::new("Element.Fire")));
        assert!(!tags.remove(&TriggerTag::new("Element.Fire")));
        assert!(tags.is_empty());
    }

    #[test]
    fn test_container_queries() {
        let tags = TagContainer::new().with("Element.Fire").with("Critical");

        assert!(tags.has_tag(&TriggerTag::new("Element")));
        assert!(!tags.has_tag_exact(&TriggerTag::new("Element")));
        assert!(tags.has_tag_exact(&TriggerTag::new("Critical")));

        let wanted = TagContainer::new().with("Element").with("Critical");
        assert!(tags.has_all(&wanted));

        let other = TagContainer::new().with("Element.Ice").with("Critical");
        assert!(tags.has_any(&other));
        assert!(!tags.has_all(&other));
    }

    #[test]
    fn test_tag_serde() {
        let tag = TriggerTag::new("A.B");
        let json = serde_json::to_string(&tag).unwrap();
        assert_eq!(json, "\"A.B\"");
        let back: TriggerTag = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tag);
    }
}
