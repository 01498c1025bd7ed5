//! Dual-shape category collections.
//!
//! Not every metadata category in an org can be listed item by item: for
//! some, only aggregate counts survive the query cascade, and for some
//! nothing survives at all. `ItemCollection` makes that variance explicit
//! so every consumer has to handle both shapes instead of assuming a list.

use serde::{Deserialize, Serialize};

/// A category's contents: full per-item detail, or counts only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "camelCase")]
pub enum ItemCollection<T> {
    /// Per-item detail was retrievable.
    Detailed { items: Vec<T> },
    /// Only aggregate counts are known. `available: false` with a note
    /// means the category could not be retrieved at all.
    CountOnly {
        total: Option<u32>,
        active: Option<u32>,
        available: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        note: Option<String>,
    },
}

impl<T> ItemCollection<T> {
    pub fn detailed(items: Vec<T>) -> Self {
        Self::Detailed { items }
    }

    /// A category that was queryable but holds nothing.
    pub fn empty() -> Self {
        Self::Detailed { items: Vec::new() }
    }

    pub fn count_only(total: Option<u32>, active: Option<u32>) -> Self {
        Self::CountOnly {
            total,
            active,
            available: true,
            note: None,
        }
    }

    pub fn count_only_with_note(
        total: Option<u32>,
        active: Option<u32>,
        note: impl Into<String>,
    ) -> Self {
        Self::CountOnly {
            total,
            active,
            available: true,
            note: Some(note.into()),
        }
    }

    /// The explicit "nothing retrievable" marker. Never used for a merely
    /// empty category.
    pub fn unavailable(note: impl Into<String>) -> Self {
        Self::CountOnly {
            total: None,
            active: None,
            available: false,
            note: Some(note.into()),
        }
    }

    pub fn is_available(&self) -> bool {
        match self {
            Self::Detailed { .. } => true,
            Self::CountOnly { available, .. } => *available,
        }
    }

    pub fn note(&self) -> Option<&str> {
        match self {
            Self::Detailed { .. } => None,
            Self::CountOnly { note, .. } => note.as_deref(),
        }
    }

    /// Total item count, if known in either shape.
    pub fn total(&self) -> Option<u32> {
        match self {
            Self::Detailed { items } => Some(items.len() as u32),
            Self::CountOnly { total, .. } => *total,
        }
    }

    /// Active item count. For the detailed shape the caller supplies the
    /// activity predicate; for the count-only shape the stored aggregate
    /// is used as-is.
    pub fn active_count(&self, is_active: impl Fn(&T) -> bool) -> Option<u32> {
        match self {
            Self::Detailed { items } => {
                Some(items.iter().filter(|i| is_active(i)).count() as u32)
            }
            Self::CountOnly { active, .. } => *active,
        }
    }

    /// Per-item detail, when this collection has it.
    pub fn items(&self) -> Option<&[T]> {
        match self {
            Self::Detailed { items } => Some(items),
            Self::CountOnly { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detailed_counts_via_predicate() {
        let coll = ItemCollection::detailed(vec![true, false, true, true]);
        assert_eq!(coll.total(), Some(4));
        assert_eq!(coll.active_count(|a| *a), Some(3));
        assert!(coll.is_available());
        assert!(coll.note().is_none());
    }

    #[test]
    fn count_only_uses_stored_aggregates() {
        let coll: ItemCollection<bool> = ItemCollection::count_only(Some(40), Some(22));
        assert_eq!(coll.total(), Some(40));
        assert_eq!(coll.active_count(|a| *a), Some(22));
        assert!(coll.is_available());
        assert!(coll.items().is_none());
    }

    #[test]
    fn unavailable_is_not_empty_success() {
        let coll: ItemCollection<bool> = ItemCollection::unavailable("all strategies failed");
        assert!(!coll.is_available());
        assert_eq!(coll.total(), None);
        assert_eq!(coll.note(), Some("all strategies failed"));

        let empty: ItemCollection<bool> = ItemCollection::empty();
        assert!(empty.is_available());
        assert_eq!(empty.total(), Some(0));
    }
}
