//! Insertion-ordered set.

use crate::iter::{Cursor, Sequenceable};
use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};
use std::fmt;

/// An insertion-ordered collection of unique elements.
///
/// Uniqueness is decided by an equality scan, so elements only need
/// `PartialEq`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Set<T> {
    seq: Vec<T>,
}

impl<T> Set<T> {
    /// Creates an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self { seq: Vec::new() }
    }

    /// Returns the number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.seq.len()
    }

    /// Returns true if the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seq.is_empty()
    }

    /// Removes every element.
    pub fn clear(&mut self) {
        self.seq.clear();
    }

    /// Borrows the elements in insertion order.
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.seq
    }

    /// Consumes the set, returning the elements in insertion order.
    #[must_use]
    pub fn into_vec(self) -> Vec<T> {
        self.seq
    }
}

impl<T: PartialEq> Set<T> {
    /// Returns true if an equal element is present.
    #[must_use]
    pub fn has(&self, element: &T) -> bool {
        self.seq.contains(element)
    }

    /// Adds the element unless an equal one is present.
    ///
    /// Returns true if the set grew.
    pub fn add(&mut self, element: T) -> bool {
        if self.has(&element) {
            false
        } else {
            self.seq.push(element);
            true
        }
    }

    /// Removes the equal element. Returns true if one was removed.
    pub fn remove(&mut self, element: &T) -> bool {
        match self.seq.iter().position(|e| e == element) {
            Some(index) => {
                self.seq.remove(index);
                true
            }
            None => false,
        }
    }
}

impl<T: Clone + PartialEq> Set<T> {
    /// Builds a set from a slice, skipping duplicates.
    #[must_use]
    pub fn from_slice(items: &[T]) -> Self {
        items.iter().cloned().collect()
    }
}

impl<T: Clone> Set<T> {
    /// Returns a fresh cursor over the elements.
    #[must_use]
    pub fn iter(&self) -> Cursor<T> {
        Cursor::new(self.seq.clone())
    }
}

impl<T> Default for Set<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: PartialEq> FromIterator<T> for Set<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = Self::new();
        for element in iter {
            set.add(element);
        }
        set
    }
}

impl<T: Clone + PartialEq> Sequenceable for Set<T> {
    type Key = usize;
    type Item = T;

    fn items(&self) -> Cursor<(usize, T)> {
        Cursor::new(self.seq.iter().cloned().enumerate().collect())
    }

    fn len(&self) -> usize {
        self.seq.len()
    }

    fn put(&mut self, _key: usize, item: T) {
        self.add(item);
    }
}

impl<T: Serialize> Serialize for Set<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.seq.serialize(serializer)
    }
}

impl<'de, T> Deserialize<'de> for Set<T>
where
    T: Deserialize<'de> + PartialEq,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let seq = Vec::<T>::deserialize(deserializer)?;
        Ok(seq.into_iter().collect())
    }
}

impl<T: fmt::Display> fmt::Display for Set<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, element) in self.seq.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{element}")?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn add_is_unique() {
        let mut set = Set::new();
        assert!(set.add("a"));
        assert!(!set.add("a"));
        assert!(set.add("b"));
        assert_eq!(set.len(), 2);
        assert_eq!(set.as_slice(), &["a", "b"]);
    }

    #[test]
    fn remove_element() {
        let mut set = Set::from_slice(&[1, 2, 3]);
        assert!(set.remove(&2));
        assert!(!set.remove(&2));
        assert!(!set.has(&2));
        assert_eq!(set.as_slice(), &[1, 3]);
    }

    #[test]
    fn filter_keeps_kind() {
        let set = Set::from_slice(&[1, 2, 3, 4]);
        let odd = set.filter(|v, _| v % 2 == 1);
        assert_eq!(odd, Set::from_slice(&[1, 3]));

        // mapping onto equal values collapses them
        let collapsed = set.map(|v, _| v % 2);
        assert_eq!(collapsed.as_slice(), &[1, 0]);
    }

    #[test]
    fn deserialize_drops_duplicates() {
        let set: Set<String> = serde_json::from_str(r#"["x","y","x"]"#).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(serde_json::to_string(&set).unwrap(), r#"["x","y"]"#);
    }

    proptest! {
        #[test]
        fn size_matches_iteration(ops in prop::collection::vec((any::<bool>(), 0u8..12), 0..64)) {
            let mut set = Set::new();
            for (add, v) in ops {
                if add {
                    set.add(v);
                } else {
                    set.remove(&v);
                }
            }
            prop_assert_eq!(set.len(), set.iter().count());
            let mut distinct = set.clone().into_vec();
            distinct.sort_unstable();
            distinct.dedup();
            prop_assert_eq!(distinct.len(), set.len());
        }
    }
}
