use std::collections::HashSet;

use contactsync_core::{RawContact, RawTag};

use crate::error::SourceError;

/// A listing entry that arrived but did not decode into the expected shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedItem {
    /// Position in the full listing, counted across pages.
    pub index: usize,
    /// The entry's `id`, when at least that much was readable.
    pub id: Option<i64>,
    pub reason: String,
}

/// A fully paged-through listing.
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched<T> {
    pub items: Vec<T>,
    pub malformed: Vec<MalformedItem>,
    pub pages: usize,
}

impl<T> Fetched<T> {
    pub fn new(items: Vec<T>, pages: usize) -> Self {
        Self {
            items,
            malformed: Vec::new(),
            pages,
        }
    }

    pub fn with_malformed(mut self, malformed: Vec<MalformedItem>) -> Self {
        self.malformed = malformed;
        self
    }

    /// Entries in the listing, decoded or not.
    pub fn count(&self) -> usize {
        self.items.len() + self.malformed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Listing position of each decoded item, in `items` order.
    pub fn positions(&self) -> Vec<usize> {
        let skipped: HashSet<usize> = self.malformed.iter().map(|m| m.index).collect();
        (0..)
            .filter(|i| !skipped.contains(i))
            .take(self.items.len())
            .collect()
    }
}

/// Read-only access to the marketing platform.
pub trait ContactSource {
    fn fetch_contacts(&self) -> Result<Fetched<RawContact>, SourceError>;

    fn fetch_tags(&self) -> Result<Fetched<RawTag>, SourceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn malformed(index: usize) -> MalformedItem {
        MalformedItem { index, id: None, reason: "bad".into() }
    }

    #[test]
    fn positions_skip_malformed_entries() {
        let fetched = Fetched::new(vec!['a', 'b', 'c'], 2).with_malformed(vec![malformed(0), malformed(2)]);
        assert_eq!(fetched.count(), 5);
        assert_eq!(fetched.positions(), vec![1, 3, 4]);
    }

    #[test]
    fn clean_listing_positions_are_identity() {
        let fetched = Fetched::new(vec![1, 2], 1);
        assert_eq!(fetched.positions(), vec![0, 1]);
        assert!(Fetched::<u8>::new(Vec::new(), 1).is_empty());
    }
}
