//! Cursor protocol and the generic algorithms built on it.

use crate::error::{IterResult, StopIteration};

/// A single-pass cursor over a snapshot of a collection.
///
/// Every call to an `items()`/`iter()` accessor produces a fresh cursor over
/// the backing sequence as it was at call time. Later mutation of the
/// collection is not observed. A cursor cannot be restarted.
///
/// `Cursor` also implements [`Iterator`], so it composes with `for` loops and
/// iterator adapters.
#[derive(Debug, Clone)]
pub struct Cursor<T> {
    remaining: std::vec::IntoIter<T>,
}

impl<T> Cursor<T> {
    /// Creates a cursor that yields the given snapshot in order.
    #[must_use]
    pub fn new(snapshot: Vec<T>) -> Self {
        Self {
            remaining: snapshot.into_iter(),
        }
    }

    /// Creates an exhausted cursor.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Returns true while at least one element remains.
    #[must_use]
    pub fn has_next(&self) -> bool {
        self.remaining.len() > 0
    }

    /// Returns the next element, or `StopIteration` once exhausted.
    ///
    /// An exhausted cursor keeps failing on every further call.
    pub fn try_next(&mut self) -> IterResult<T> {
        self.remaining.next().ok_or(StopIteration)
    }
}

impl<T> Default for Cursor<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> Iterator for Cursor<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.remaining.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.remaining.size_hint()
    }
}

impl<T> ExactSizeIterator for Cursor<T> {}

/// Capability shared by every container: produce `(key, item)` pairs and
/// accept new pairs.
///
/// Lists and sets use the element index as key, maps their real keys. The
/// algorithms below are written once against this capability; containers
/// only supply `items`, `len` and `put`.
///
/// Non-callable arguments cannot be passed: the closure bounds reject them
/// at compile time.
pub trait Sequenceable {
    /// Key type yielded alongside each item.
    type Key: Clone;
    /// Item type.
    type Item: Clone;

    /// Returns a fresh cursor over `(key, item)` pairs.
    fn items(&self) -> Cursor<(Self::Key, Self::Item)>;

    /// Returns the number of live elements.
    fn len(&self) -> usize;

    /// Inserts a pair the way the concrete container does: maps associate
    /// the key, lists and sets append the item.
    fn put(&mut self, key: Self::Key, item: Self::Item);

    /// Returns true if the container holds no elements.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Calls `f(item, key)` for every pair.
    fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&Self::Item, &Self::Key),
    {
        let mut cursor = self.items();
        while let Ok((key, item)) = cursor.try_next() {
            f(&item, &key);
        }
    }

    /// Returns true if `f` holds for every pair (vacuously for none).
    fn every<F>(&self, mut f: F) -> bool
    where
        F: FnMut(&Self::Item, &Self::Key) -> bool,
    {
        let mut cursor = self.items();
        while let Ok((key, item)) = cursor.try_next() {
            if !f(&item, &key) {
                return false;
            }
        }
        true
    }

    /// Returns true if `f` holds for at least one pair.
    fn some<F>(&self, mut f: F) -> bool
    where
        F: FnMut(&Self::Item, &Self::Key) -> bool,
    {
        let mut cursor = self.items();
        while let Ok((key, item)) = cursor.try_next() {
            if f(&item, &key) {
                return true;
            }
        }
        false
    }

    /// Returns the first item for which `f` holds.
    fn find<F>(&self, mut f: F) -> Option<Self::Item>
    where
        F: FnMut(&Self::Item, &Self::Key) -> bool,
    {
        let mut cursor = self.items();
        while let Ok((key, item)) = cursor.try_next() {
            if f(&item, &key) {
                return Some(item);
            }
        }
        None
    }

    /// Returns a new container of the same kind holding the pairs accepted
    /// by `f`.
    fn filter<F>(&self, mut f: F) -> Self
    where
        Self: Default,
        F: FnMut(&Self::Item, &Self::Key) -> bool,
    {
        let mut result = Self::default();
        let mut cursor = self.items();
        while let Ok((key, item)) = cursor.try_next() {
            if f(&item, &key) {
                result.put(key, item);
            }
        }
        result
    }

    /// Returns a new container of the same kind with every item replaced by
    /// `f(item, key)`.
    fn map<F>(&self, mut f: F) -> Self
    where
        Self: Default,
        F: FnMut(&Self::Item, &Self::Key) -> Self::Item,
    {
        let mut result = Self::default();
        let mut cursor = self.items();
        while let Ok((key, item)) = cursor.try_next() {
            let mapped = f(&item, &key);
            result.put(key, mapped);
        }
        result
    }

    /// Folds the items using the first item as seed.
    ///
    /// Fails with `StopIteration` if the container is empty.
    fn reduce<F>(&self, mut f: F) -> IterResult<Self::Item>
    where
        F: FnMut(Self::Item, &Self::Item, &Self::Key) -> Self::Item,
    {
        let mut cursor = self.items();
        let (_, mut acc) = cursor.try_next()?;
        while let Ok((key, item)) = cursor.try_next() {
            acc = f(acc, &item, &key);
        }
        Ok(acc)
    }

    /// Folds the items starting from `seed`.
    fn fold<A, F>(&self, seed: A, mut f: F) -> A
    where
        F: FnMut(A, &Self::Item, &Self::Key) -> A,
    {
        let mut acc = seed;
        let mut cursor = self.items();
        while let Ok((key, item)) = cursor.try_next() {
            acc = f(acc, &item, &key);
        }
        acc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_signals_stop_iteration() {
        let mut cursor = Cursor::new(vec![1, 2]);
        assert!(cursor.has_next());
        assert_eq!(cursor.try_next(), Ok(1));
        assert_eq!(cursor.try_next(), Ok(2));
        assert!(!cursor.has_next());
        assert_eq!(cursor.try_next(), Err(StopIteration));
        assert_eq!(cursor.try_next(), Err(StopIteration));
    }

    #[test]
    fn empty_cursor() {
        let mut cursor: Cursor<u8> = Cursor::empty();
        assert!(!cursor.has_next());
        assert!(cursor.try_next().is_err());
    }

    #[test]
    fn cursor_is_an_iterator() {
        let cursor = Cursor::new(vec!["a", "b", "c"]);
        assert_eq!(cursor.len(), 3);
        let joined: Vec<_> = cursor.collect();
        assert_eq!(joined, vec!["a", "b", "c"]);
    }
}
