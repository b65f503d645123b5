//! Collections that report mutation to their owning entity.
//!
//! A tracked collection is a shared handle: clones see the same elements.
//! The owner is fixed when the handle is created. Assigning a handle to an
//! attribute of another entity copies the elements instead of re-parenting
//! the handle (see [`Value::adopt`](crate::Value)).
//!
//! Owned collections know the declared element type of their attribute and
//! refuse elements that do not fit it.

use crate::entity::State;
use crate::error::{OrmError, OrmResult};
use crate::metamodel::{Attribute, AttributeKind, Metamodel, Type};
use crate::value::Value;
use orestes_collections::{Cursor, List, Map, Set};
use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, Weak};

/// Back-reference from a collection to the entity attribute that owns it.
///
/// Two trackers are equal when they point at the same attribute of the same
/// entity. The element shape they carry does not take part in equality.
#[derive(Clone)]
pub struct Tracker {
    state: Weak<Mutex<State>>,
    metamodel: Arc<Metamodel>,
    attribute: Arc<str>,
    shape: Option<AttributeKind>,
}

impl Tracker {
    pub(crate) fn new(state: &Arc<Mutex<State>>, metamodel: &Arc<Metamodel>, attribute: &str) -> Self {
        Self {
            state: Arc::downgrade(state),
            metamodel: Arc::clone(metamodel),
            attribute: Arc::from(attribute),
            shape: None,
        }
    }

    /// Same owner, typed for the collection held by `attribute`.
    ///
    /// `attribute` is either the owning attribute itself or a field of an
    /// embedded object stored in it.
    pub(crate) fn for_collection(&self, attribute: &Attribute) -> Self {
        Self {
            shape: attribute.is_plural().then(|| attribute.kind().clone()),
            ..self.clone()
        }
    }

    /// Same owner, typed for field `field` of embeddable `type_name`.
    pub(crate) fn for_field(&self, type_name: &str, field: &str) -> Self {
        match self.metamodel.attribute(type_name, field) {
            Ok(attribute) => self.for_collection(&attribute),
            Err(_) => Self {
                shape: None,
                ..self.clone()
            },
        }
    }

    /// Name of the owning attribute.
    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// Checks a list or set element, or a map value.
    pub(crate) fn check_element(&self, value: &Value) -> OrmResult<()> {
        match &self.shape {
            Some(AttributeKind::List(ty) | AttributeKind::Set(ty)) => self.check(ty, value),
            Some(AttributeKind::Map { value: ty, .. }) => self.check(ty, value),
            Some(AttributeKind::Singular(_)) | None => Ok(()),
        }
    }

    /// Checks a map key.
    pub(crate) fn check_key(&self, key: &Value) -> OrmResult<()> {
        match &self.shape {
            Some(AttributeKind::Map { key: ty, .. }) => self.check(ty, key),
            _ => Ok(()),
        }
    }

    fn check(&self, ty: &Type, value: &Value) -> OrmResult<()> {
        ty.check(&self.metamodel, value)
    }

    /// Runs a mutation on behalf of the owner and flags the attribute dirty.
    ///
    /// The state lock is held while `mutate` runs, so the dirty stamp is
    /// ordered after the mutation relative to a concurrent save.
    pub(crate) fn record<R>(&self, mutate: impl FnOnce() -> R) -> OrmResult<R> {
        let Some(state) = self.state.upgrade() else {
            return Ok(mutate());
        };
        let mut state = state.lock();
        if state.lifecycle().is_removed() {
            return Err(OrmError::entity_removed(format!(
                "{}.{}",
                state.type_name(),
                self.attribute
            )));
        }
        let result = mutate();
        state.mark_dirty(&self.attribute);
        Ok(result)
    }
}

impl PartialEq for Tracker {
    fn eq(&self, other: &Self) -> bool {
        Weak::ptr_eq(&self.state, &other.state) && self.attribute == other.attribute
    }
}

impl fmt::Debug for Tracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracker")
            .field("attribute", &self.attribute)
            .field("shape", &self.shape)
            .field("alive", &(self.state.strong_count() > 0))
            .finish()
    }
}

fn record<R>(owner: &Option<Tracker>, mutate: impl FnOnce() -> R) -> OrmResult<R> {
    match owner {
        Some(tracker) => tracker.record(mutate),
        None => Ok(mutate()),
    }
}

enum Slot {
    Element,
    Key,
}

/// Type-checks `value` against the owner's declared shape and adopts it.
fn bind(owner: &Option<Tracker>, value: Value, slot: Slot) -> OrmResult<Value> {
    let Some(tracker) = owner else {
        return Ok(value);
    };
    match slot {
        Slot::Element => tracker.check_element(&value)?,
        Slot::Key => tracker.check_key(&value)?,
    }
    Ok(value.adopt(tracker))
}

macro_rules! handle_common {
    ($name:ident, $inner:ty) => {
        impl $name {
            /// Wraps `collection` in a handle owned by `tracker`.
            pub(crate) fn owned(collection: $inner, tracker: Tracker) -> Self {
                Self {
                    inner: Arc::new(Mutex::new(collection)),
                    owner: Some(tracker),
                }
            }

            /// Creates an empty unowned collection.
            #[must_use]
            pub fn new() -> Self {
                Self::from(<$inner>::new())
            }

            /// Returns true if `tracker` owns this handle.
            #[must_use]
            pub fn is_owned_by(&self, tracker: &Tracker) -> bool {
                self.owner.as_ref() == Some(tracker)
            }

            /// Owner of the handle, if any.
            #[must_use]
            pub fn tracker(&self) -> Option<&Tracker> {
                self.owner.as_ref()
            }

            /// Copies the current contents.
            #[must_use]
            pub fn snapshot(&self) -> $inner {
                self.inner.lock().clone()
            }

            /// Returns the number of elements.
            #[must_use]
            pub fn len(&self) -> usize {
                self.inner.lock().len()
            }

            /// Returns true if the collection is empty.
            #[must_use]
            pub fn is_empty(&self) -> bool {
                self.inner.lock().is_empty()
            }

            /// Removes every element.
            pub fn clear(&self) -> OrmResult<()> {
                record(&self.owner, || self.inner.lock().clear())
            }

            /// Swaps in new contents without flagging the owner.
            pub(crate) fn replace_untracked(&self, collection: $inner) {
                *self.inner.lock() = collection;
            }

            /// Runs `f` on the contents without flagging the owner.
            pub(crate) fn with_untracked<R>(&self, f: impl FnOnce(&mut $inner) -> R) -> R {
                f(&mut self.inner.lock())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<$inner> for $name {
            fn from(collection: $inner) -> Self {
                Self {
                    inner: Arc::new(Mutex::new(collection)),
                    owner: None,
                }
            }
        }

        impl PartialEq for $name {
            fn eq(&self, other: &Self) -> bool {
                Arc::ptr_eq(&self.inner, &other.inner)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("owner", &self.owner)
                    .field("contents", &*self.inner.lock())
                    .finish()
            }
        }
    };
}

/// A [`List`] of values bound to an entity attribute.
#[derive(Clone)]
pub struct TrackedList {
    inner: Arc<Mutex<List<Value>>>,
    owner: Option<Tracker>,
}

handle_common!(TrackedList, List<Value>);

impl TrackedList {
    /// Returns the element at `index`, counting from the end if negative.
    #[must_use]
    pub fn get(&self, index: isize) -> Option<Value> {
        self.inner.lock().get(index).cloned()
    }

    /// Returns true if an equal element is present.
    #[must_use]
    pub fn has(&self, element: &Value) -> bool {
        self.inner.lock().has(element)
    }

    /// Position of the first equal element.
    #[must_use]
    pub fn index_of(&self, element: &Value) -> Option<usize> {
        self.inner.lock().index_of(element)
    }

    /// Position of the last equal element.
    #[must_use]
    pub fn last_index_of(&self, element: &Value) -> Option<usize> {
        self.inner.lock().last_index_of(element)
    }

    /// Returns a fresh cursor over the current elements.
    #[must_use]
    pub fn iter(&self) -> Cursor<Value> {
        self.inner.lock().iter()
    }

    /// Appends an element.
    pub fn add(&self, element: impl Into<Value>) -> OrmResult<()> {
        let element = bind(&self.owner, element.into(), Slot::Element)?;
        record(&self.owner, || self.inner.lock().add(element))
    }

    /// Writes at `index` with [`List::set`] semantics.
    pub fn set(&self, index: isize, element: impl Into<Value>) -> OrmResult<()> {
        let element = bind(&self.owner, element.into(), Slot::Element)?;
        record(&self.owner, || self.inner.lock().set(index, element))
    }

    /// Removes the first equal element. Returns true if one was removed.
    pub fn remove(&self, element: &Value) -> OrmResult<bool> {
        record(&self.owner, || self.inner.lock().remove(element))
    }
}

/// A [`Set`] of values bound to an entity attribute.
#[derive(Clone)]
pub struct TrackedSet {
    inner: Arc<Mutex<Set<Value>>>,
    owner: Option<Tracker>,
}

handle_common!(TrackedSet, Set<Value>);

impl TrackedSet {
    /// Returns true if an equal element is present.
    #[must_use]
    pub fn has(&self, element: &Value) -> bool {
        self.inner.lock().has(element)
    }

    /// Returns a fresh cursor over the current elements.
    #[must_use]
    pub fn iter(&self) -> Cursor<Value> {
        self.inner.lock().iter()
    }

    /// Adds an element. Returns false if an equal one was already present.
    pub fn add(&self, element: impl Into<Value>) -> OrmResult<bool> {
        let element = bind(&self.owner, element.into(), Slot::Element)?;
        record(&self.owner, || self.inner.lock().add(element))
    }

    /// Removes an equal element. Returns true if one was removed.
    pub fn remove(&self, element: &Value) -> OrmResult<bool> {
        record(&self.owner, || self.inner.lock().remove(element))
    }
}

/// A [`Map`] from values to values bound to an entity attribute.
#[derive(Clone)]
pub struct TrackedMap {
    inner: Arc<Mutex<Map<Value, Value>>>,
    owner: Option<Tracker>,
}

handle_common!(TrackedMap, Map<Value, Value>);

impl TrackedMap {
    /// Returns the value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &Value) -> Option<Value> {
        self.inner.lock().get(key).cloned()
    }

    /// Returns true if the key is present.
    #[must_use]
    pub fn has(&self, key: &Value) -> bool {
        self.inner.lock().has(key)
    }

    /// Returns a fresh cursor over the keys.
    #[must_use]
    pub fn keys(&self) -> Cursor<Value> {
        self.inner.lock().keys()
    }

    /// Returns a fresh cursor over the values.
    #[must_use]
    pub fn values(&self) -> Cursor<Value> {
        self.inner.lock().values()
    }

    /// Returns a fresh cursor over `(key, value)` pairs.
    #[must_use]
    pub fn entries(&self) -> Cursor<(Value, Value)> {
        let pairs = self
            .inner
            .lock()
            .entries()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Cursor::new(pairs)
    }

    /// Associates `value` with `key`, returning the previous value.
    pub fn set(&self, key: impl Into<Value>, value: impl Into<Value>) -> OrmResult<Option<Value>> {
        let key = bind(&self.owner, key.into(), Slot::Key)?;
        let value = bind(&self.owner, value.into(), Slot::Element)?;
        record(&self.owner, || self.inner.lock().set(key, value))
    }

    /// Removes `key`, returning its value.
    pub fn remove(&self, key: &Value) -> OrmResult<Option<Value>> {
        record(&self.owner, || self.inner.lock().remove(key))
    }
}
