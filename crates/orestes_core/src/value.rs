//! In-memory attribute values.

use crate::entity::{Entity, EntityRef};
use crate::tracked::{TrackedList, TrackedMap, TrackedSet, Tracker};
use chrono::{DateTime, Utc};
use orestes_collections::{List, Map, Set};
use std::collections::BTreeMap;

/// The value held by one attribute slot of a managed object.
///
/// Plural values are tracked collection handles: cloning a `Value::Set`
/// clones the handle, not the elements, and mutation through any clone is
/// reported to the owning entity.
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// No value.
    #[default]
    Null,
    /// Boolean.
    Bool(bool),
    /// Number (JSON numbers are doubles).
    Number(f64),
    /// Text.
    String(String),
    /// Point in time.
    Date(DateTime<Utc>),
    /// Nested object without identity.
    Embedded(Embedded),
    /// Reference to another entity.
    Reference(EntityRef),
    /// Tracked list.
    List(TrackedList),
    /// Tracked set.
    Set(TrackedSet),
    /// Tracked map.
    Map(TrackedMap),
}

impl Value {
    /// Short name of the value kind, used in error messages.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "Boolean",
            Self::Number(_) => "Number",
            Self::String(_) => "String",
            Self::Date(_) => "Date",
            Self::Embedded(_) => "embedded object",
            Self::Reference(_) => "reference",
            Self::List(_) => "List",
            Self::Set(_) => "Set",
            Self::Map(_) => "Map",
        }
    }

    /// Returns true for `Null`.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the boolean, if this is one.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the number, if this is one.
    #[must_use]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the text, if this is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the date, if this is one.
    #[must_use]
    pub const fn as_date(&self) -> Option<&DateTime<Utc>> {
        match self {
            Self::Date(d) => Some(d),
            _ => None,
        }
    }

    /// Returns the embedded object, if this is one.
    #[must_use]
    pub const fn as_embedded(&self) -> Option<&Embedded> {
        match self {
            Self::Embedded(e) => Some(e),
            _ => None,
        }
    }

    /// Returns the referenced entity, if this is a reference.
    ///
    /// See [`EntityRef::entity`] for how a reference finds its target.
    #[must_use]
    pub fn as_entity(&self) -> Option<Entity> {
        self.as_reference().and_then(EntityRef::entity)
    }

    /// Returns the reference, if this is one.
    #[must_use]
    pub const fn as_reference(&self) -> Option<&EntityRef> {
        match self {
            Self::Reference(r) => Some(r),
            _ => None,
        }
    }

    /// Returns the tracked list handle, if this is a list.
    #[must_use]
    pub const fn as_list(&self) -> Option<&TrackedList> {
        match self {
            Self::List(l) => Some(l),
            _ => None,
        }
    }

    /// Returns the tracked set handle, if this is a set.
    #[must_use]
    pub const fn as_set(&self) -> Option<&TrackedSet> {
        match self {
            Self::Set(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the tracked map handle, if this is a map.
    #[must_use]
    pub const fn as_map(&self) -> Option<&TrackedMap> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Binds every collection inside this value to `tracker`.
    ///
    /// Collections already owned by `tracker` are kept as they are; all
    /// others are copied into fresh collections owned by it, so a tracked
    /// collection never reports to two entities.
    #[must_use]
    pub(crate) fn adopt(self, tracker: &Tracker) -> Self {
        match self {
            Self::List(list) if !list.is_owned_by(tracker) => {
                let elements = list.snapshot().into_vec();
                let adopted: List<Value> = elements.into_iter().map(|v| v.adopt(tracker)).collect();
                Self::List(TrackedList::owned(adopted, tracker.clone()))
            }
            Self::Set(set) if !set.is_owned_by(tracker) => {
                let elements = set.snapshot().into_vec();
                let adopted: Set<Value> = elements.into_iter().map(|v| v.adopt(tracker)).collect();
                Self::Set(TrackedSet::owned(adopted, tracker.clone()))
            }
            Self::Map(map) if !map.is_owned_by(tracker) => {
                let adopted: Map<Value, Value> = map
                    .snapshot()
                    .entries()
                    .map(|(k, v)| (k.clone(), v.clone().adopt(tracker)))
                    .collect();
                Self::Map(TrackedMap::owned(adopted, tracker.clone()))
            }
            Self::Embedded(embedded) => Self::Embedded(embedded.adopt(tracker)),
            other => other,
        }
    }
}

impl PartialEq for Value {
    /// Scalars and embedded objects compare by content, references by
    /// entity identity or id, collections by handle identity.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Date(a), Self::Date(b)) => a == b,
            (Self::Embedded(a), Self::Embedded(b)) => a == b,
            (Self::Reference(a), Self::Reference(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Set(a), Self::Set(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Date(value)
    }
}

impl From<Embedded> for Value {
    fn from(value: Embedded) -> Self {
        Self::Embedded(value)
    }
}

impl From<Entity> for Value {
    fn from(value: Entity) -> Self {
        Self::Reference(EntityRef::new(&value))
    }
}

impl From<&Entity> for Value {
    fn from(value: &Entity) -> Self {
        Self::Reference(EntityRef::new(value))
    }
}

impl From<EntityRef> for Value {
    fn from(value: EntityRef) -> Self {
        Self::Reference(value)
    }
}

impl From<List<Value>> for Value {
    fn from(value: List<Value>) -> Self {
        Self::List(TrackedList::from(value))
    }
}

impl From<Set<Value>> for Value {
    fn from(value: Set<Value>) -> Self {
        Self::Set(TrackedSet::from(value))
    }
}

impl From<Map<Value, Value>> for Value {
    fn from(value: Map<Value, Value>) -> Self {
        Self::Map(TrackedMap::from(value))
    }
}

impl From<TrackedList> for Value {
    fn from(value: TrackedList) -> Self {
        Self::List(value)
    }
}

impl From<TrackedSet> for Value {
    fn from(value: TrackedSet) -> Self {
        Self::Set(value)
    }
}

impl From<TrackedMap> for Value {
    fn from(value: TrackedMap) -> Self {
        Self::Map(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// An instance of an embeddable type.
///
/// Embedded objects have no identity of their own: they are stored inline in
/// their owner and compare by content.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedded {
    type_name: String,
    fields: BTreeMap<String, Value>,
}

impl Embedded {
    /// Creates an empty instance of the named embeddable type.
    ///
    /// Prefer [`Metamodel::create_embedded`](crate::Metamodel::create_embedded),
    /// which checks the type and initializes every declared attribute.
    #[must_use]
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Name of the embeddable type.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Returns the field value, `Null` if unset.
    #[must_use]
    pub fn get(&self, name: &str) -> &Value {
        self.fields.get(name).unwrap_or(&Value::Null)
    }

    /// Sets a field.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Builder-style [`set`](Self::set).
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Iterates over the fields in name order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub(crate) fn field_mut(&mut self, name: &str) -> &mut Value {
        self.fields.entry(name.to_string()).or_default()
    }

    fn adopt(self, tracker: &Tracker) -> Self {
        let fields = self
            .fields
            .into_iter()
            .map(|(k, v)| {
                let field = tracker.for_field(&self.type_name, &k);
                (k, v.adopt(&field))
            })
            .collect();
        Self {
            type_name: self.type_name,
            fields,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_equality() {
        assert_eq!(Value::from("a"), Value::String("a".into()));
        assert_eq!(Value::from(3), Value::Number(3.0));
        assert_ne!(Value::from(true), Value::from(1));
        assert_eq!(Value::from(None::<String>), Value::Null);
    }

    #[test]
    fn collection_equality_is_identity() {
        let a = Value::from(Set::from_slice(&[Value::from("x")]));
        let b = Value::from(Set::from_slice(&[Value::from("x")]));
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn embedded_fields() {
        let address = Embedded::new("Address")
            .with("street", "Main St")
            .with("number", 12);
        assert_eq!(address.get("street").as_str(), Some("Main St"));
        assert!(address.get("zip").is_null());
        assert_eq!(address.fields().count(), 2);
        assert_eq!(address.clone(), address);
    }

    #[test]
    fn kinds() {
        assert_eq!(Value::Null.kind(), "null");
        assert_eq!(Value::from(1.5).kind(), "Number");
        assert_eq!(Value::from(List::new()).kind(), "List");
    }
}
