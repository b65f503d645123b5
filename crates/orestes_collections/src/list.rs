//! Indexed list.

use crate::iter::{Cursor, Sequenceable};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An ordered sequence with indexed access.
///
/// `get` and `set` accept negative indices counted from the end. `set`
/// never fails: an index past the end appends, an index resolving below
/// zero prepends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct List<T> {
    seq: Vec<T>,
}

impl<T> List<T> {
    /// Creates an empty list.
    #[must_use]
    pub const fn new() -> Self {
        Self { seq: Vec::new() }
    }

    /// Returns the number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.seq.len()
    }

    /// Returns true if the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seq.is_empty()
    }

    /// Appends an element.
    pub fn add(&mut self, element: T) {
        self.seq.push(element);
    }

    /// Returns the element at `index`, counting from the end if negative.
    #[must_use]
    pub fn get(&self, index: isize) -> Option<&T> {
        let resolved = self.resolve(index);
        usize::try_from(resolved)
            .ok()
            .and_then(|i| self.seq.get(i))
    }

    /// Writes `value` at `index`, counting from the end if negative.
    ///
    /// Past the end the value is appended; below zero it is prepended.
    pub fn set(&mut self, index: isize, value: T) {
        let resolved = self.resolve(index);
        match usize::try_from(resolved) {
            Err(_) => self.seq.insert(0, value),
            Ok(i) if i >= self.seq.len() => self.seq.push(value),
            Ok(i) => self.seq[i] = value,
        }
    }

    /// Removes every element.
    pub fn clear(&mut self) {
        self.seq.clear();
    }

    /// Keeps the first `len` elements.
    pub fn truncate(&mut self, len: usize) {
        self.seq.truncate(len);
    }

    /// Borrows the backing sequence.
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.seq
    }

    /// Consumes the list, returning the backing sequence.
    #[must_use]
    pub fn into_vec(self) -> Vec<T> {
        self.seq
    }

    #[allow(clippy::cast_possible_wrap)]
    fn resolve(&self, index: isize) -> isize {
        if index < 0 {
            self.seq.len() as isize + index
        } else {
            index
        }
    }
}

impl<T: PartialEq> List<T> {
    /// Returns true if an equal element is present.
    #[must_use]
    pub fn has(&self, element: &T) -> bool {
        self.seq.contains(element)
    }

    /// Removes the first equal element. Returns true if one was removed.
    pub fn remove(&mut self, element: &T) -> bool {
        match self.index_of(element) {
            Some(index) => {
                self.seq.remove(index);
                true
            }
            None => false,
        }
    }

    /// Position of the first equal element.
    #[must_use]
    pub fn index_of(&self, element: &T) -> Option<usize> {
        self.seq.iter().position(|e| e == element)
    }

    /// Position of the last equal element.
    #[must_use]
    pub fn last_index_of(&self, element: &T) -> Option<usize> {
        self.seq.iter().rposition(|e| e == element)
    }
}

impl<T: Clone> List<T> {
    /// Builds a list from a slice, in order.
    #[must_use]
    pub fn from_slice(items: &[T]) -> Self {
        Self {
            seq: items.to_vec(),
        }
    }

    /// Returns a fresh cursor over the elements.
    #[must_use]
    pub fn iter(&self) -> Cursor<T> {
        Cursor::new(self.seq.clone())
    }
}

impl<T> Default for List<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FromIterator<T> for List<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            seq: iter.into_iter().collect(),
        }
    }
}

impl<T> From<Vec<T>> for List<T> {
    fn from(seq: Vec<T>) -> Self {
        Self { seq }
    }
}

impl<T: Clone> Sequenceable for List<T> {
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

impl<T: fmt::Display> fmt::Display for List<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, element) in self.seq.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{element}")?;
        }
        write!(f, "]")
    }
}
