//! Declared attributes and their (de)serialization.

use super::types::{ConversionContext, PersistenceType, Type};
use super::Metamodel;
use crate::config::MapKeyPolicy;
use crate::error::{OrmError, OrmResult};
use crate::tracked::{TrackedList, TrackedMap, TrackedSet, Tracker};
use crate::value::Value;
use orestes_collections::{List, Map, Set};
use serde_json::{json, Value as Json};
use tracing::{trace, warn};

/// Wire keys every entity carries besides its declared attributes.
pub const RESERVED_NAMES: [&str; 3] = ["id", "version", "acl"];

/// How an attribute is mapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PersistentAttributeType {
    /// Scalar column.
    Basic,
    /// Inlined embeddable object.
    Embedded,
    /// Reference to another entity.
    OneToMany,
    /// List, set or map of values.
    ElementCollection,
}

/// Container kind of a plural attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionType {
    /// Ordered, duplicates allowed.
    List,
    /// Unique elements.
    Set,
    /// Key/value associations.
    Map,
}

/// Shape of an attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeKind {
    /// A single value.
    Singular(Type),
    /// List of elements.
    List(Type),
    /// Set of elements.
    Set(Type),
    /// Map from keys to values.
    Map {
        /// Key type.
        key: Type,
        /// Value type.
        value: Type,
    },
}

/// A named, typed attribute of a managed type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    name: String,
    kind: AttributeKind,
    persistent_attribute_type: PersistentAttributeType,
}

impl Attribute {
    /// Creates an attribute of the given shape.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: AttributeKind) -> Self {
        let persistent_attribute_type = match &kind {
            AttributeKind::Singular(ty) => match ty.persistence_type() {
                PersistenceType::Basic => PersistentAttributeType::Basic,
                PersistenceType::Embeddable => PersistentAttributeType::Embedded,
                PersistenceType::Entity => PersistentAttributeType::OneToMany,
            },
            _ => PersistentAttributeType::ElementCollection,
        };
        Self {
            name: name.into(),
            kind,
            persistent_attribute_type,
        }
    }

    /// Single-valued attribute.
    #[must_use]
    pub fn singular(name: impl Into<String>, ty: Type) -> Self {
        Self::new(name, AttributeKind::Singular(ty))
    }

    /// List attribute.
    #[must_use]
    pub fn list(name: impl Into<String>, element: Type) -> Self {
        Self::new(name, AttributeKind::List(element))
    }

    /// Set attribute.
    #[must_use]
    pub fn set(name: impl Into<String>, element: Type) -> Self {
        Self::new(name, AttributeKind::Set(element))
    }

    /// Map attribute.
    #[must_use]
    pub fn map(name: impl Into<String>, key: Type, value: Type) -> Self {
        Self::new(name, AttributeKind::Map { key, value })
    }

    /// Attribute name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attribute shape.
    #[must_use]
    pub fn kind(&self) -> &AttributeKind {
        &self.kind
    }

    /// Mapping classification, derived once from the declared type.
    #[must_use]
    pub fn persistent_attribute_type(&self) -> PersistentAttributeType {
        self.persistent_attribute_type
    }

    /// Container kind, `None` for singular attributes.
    #[must_use]
    pub fn collection_type(&self) -> Option<CollectionType> {
        match self.kind {
            AttributeKind::Singular(_) => None,
            AttributeKind::List(_) => Some(CollectionType::List),
            AttributeKind::Set(_) => Some(CollectionType::Set),
            AttributeKind::Map { .. } => Some(CollectionType::Map),
        }
    }

    /// Value type, or element type for plural attributes.
    #[must_use]
    pub fn element_type(&self) -> &Type {
        match &self.kind {
            AttributeKind::Singular(ty) | AttributeKind::List(ty) | AttributeKind::Set(ty) => ty,
            AttributeKind::Map { value, .. } => value,
        }
    }

    /// Key type of a map attribute.
    #[must_use]
    pub fn key_type(&self) -> Option<&Type> {
        match &self.kind {
            AttributeKind::Map { key, .. } => Some(key),
            _ => None,
        }
    }

    /// Returns true for list, set and map attributes.
    #[must_use]
    pub fn is_plural(&self) -> bool {
        self.collection_type().is_some()
    }

    /// Value of a fresh slot: `Null`, or an empty collection owned by
    /// `tracker`.
    pub(crate) fn initial_value(&self, tracker: Option<&Tracker>) -> Value {
        let tracker = tracker.map(|t| t.for_collection(self));
        match (&self.kind, tracker) {
            (AttributeKind::Singular(_), _) => Value::Null,
            (AttributeKind::List(_), Some(t)) => TrackedList::owned(List::new(), t).into(),
            (AttributeKind::Set(_), Some(t)) => TrackedSet::owned(Set::new(), t).into(),
            (AttributeKind::Map { .. }, Some(t)) => TrackedMap::owned(Map::new(), t).into(),
            (AttributeKind::List(_), None) => TrackedList::new().into(),
            (AttributeKind::Set(_), None) => TrackedSet::new().into(),
            (AttributeKind::Map { .. }, None) => TrackedMap::new().into(),
        }
    }

    /// Checks that `value` may be assigned to this attribute.
    ///
    /// Plural attributes accept `Null` or the matching collection kind whose
    /// elements (keys and values for maps) fit the declared types.
    pub fn check(&self, metamodel: &Metamodel, value: &Value) -> OrmResult<()> {
        match (&self.kind, value) {
            (AttributeKind::Singular(ty), value) => ty.check(metamodel, value),
            (_, Value::Null) => Ok(()),
            (AttributeKind::List(ty), Value::List(list)) => list
                .snapshot()
                .as_slice()
                .iter()
                .try_for_each(|element| ty.check(metamodel, element)),
            (AttributeKind::Set(ty), Value::Set(set)) => set
                .snapshot()
                .as_slice()
                .iter()
                .try_for_each(|element| ty.check(metamodel, element)),
            (AttributeKind::Map { key, value: ty }, Value::Map(map)) => {
                map.snapshot().entries().try_for_each(|(k, v)| {
                    key.check(metamodel, k)?;
                    ty.check(metamodel, v)
                })
            }
            _ => Err(OrmError::type_mismatch(self.describe(), value.kind())),
        }
    }

    /// Converts the in-memory value of this attribute to its wire form.
    pub fn get_database_value(&self, ctx: &ConversionContext<'_>, value: &Value) -> OrmResult<Json> {
        trace!(attribute = %self.name, "serializing attribute");
        match (&self.kind, value) {
            (AttributeKind::Singular(ty), value) => ty.to_json(ctx, value),
            (_, Value::Null) => Ok(Json::Null),
            (AttributeKind::List(ty), Value::List(list)) => {
                let items = list.snapshot().into_vec();
                elements_to_json(ctx, ty, &items)
            }
            (AttributeKind::Set(ty), Value::Set(set)) => {
                let items = set.snapshot().into_vec();
                elements_to_json(ctx, ty, &items)
            }
            (AttributeKind::Map { key, value: ty }, Value::Map(map)) => {
                self.map_to_json(ctx, key, ty, map)
            }
            (_, other) => Err(OrmError::type_mismatch(self.describe(), other.kind())),
        }
    }

    /// Stores the wire value `json` into `slot`.
    ///
    /// A collection in `slot` owned by the context's tracker is reconciled in
    /// place and keeps its identity; otherwise a new owned collection replaces
    /// it. Reconciliation does not mark the owner dirty.
    pub fn set_database_value(
        &self,
        ctx: &ConversionContext<'_>,
        slot: &mut Value,
        json: &Json,
    ) -> OrmResult<()> {
        trace!(attribute = %self.name, "loading attribute");
        if let AttributeKind::Singular(ty) = &self.kind {
            *slot = ty.from_json(ctx, slot, json)?;
            return Ok(());
        }
        if json.is_null() {
            *slot = Value::Null;
            return Ok(());
        }
        let items = json.as_array().ok_or_else(|| {
            OrmError::conversion(format!("attribute {} expects an array, found {json}", self.name))
        })?;

        match &self.kind {
            AttributeKind::List(ty) => {
                let current = match slot {
                    Value::List(list) => list.snapshot().into_vec(),
                    _ => Vec::new(),
                };
                let list: List<Value> = elements_from_json(ctx, ty, &current, items)?.into();
                match slot {
                    Value::List(existing) if ctx.owns(existing.tracker()) => {
                        existing.replace_untracked(list);
                    }
                    _ => *slot = Value::List(new_list(ctx, self, list)),
                }
            }
            AttributeKind::Set(ty) => {
                let current = match slot {
                    Value::Set(set) => set.snapshot().into_vec(),
                    _ => Vec::new(),
                };
                let elements = elements_from_json(ctx, ty, &current, items)?;
                let set: Set<Value> = elements.into_iter().collect();
                match slot {
                    Value::Set(existing) if ctx.owns(existing.tracker()) => {
                        existing.replace_untracked(set);
                    }
                    _ => *slot = Value::Set(new_set(ctx, self, set)),
                }
            }
            AttributeKind::Map { key, value } => self.map_from_json(ctx, key, value, slot, items)?,
            AttributeKind::Singular(_) => {}
        }
        Ok(())
    }

    fn map_to_json(
        &self,
        ctx: &ConversionContext<'_>,
        key_type: &Type,
        value_type: &Type,
        map: &TrackedMap,
    ) -> OrmResult<Json> {
        let entries = map.snapshot();
        let mut records = Vec::with_capacity(entries.len());
        let mut dropped = Vec::new();

        for (key, value) in entries.entries() {
            let wire_key = key_type.to_json(ctx, key)?;
            if wire_key.is_null() && !key.is_null() {
                dropped.push(key.clone());
                continue;
            }
            let wire_value = value_type.to_json(ctx, value)?;
            records.push(json!({ "key": wire_key, "value": wire_value }));
        }

        if !dropped.is_empty() {
            let policy = ctx.config().map_key_policy;
            warn!(
                attribute = %self.name,
                count = dropped.len(),
                ?policy,
                "map keys without a wire form were dropped"
            );
            if policy == MapKeyPolicy::Evict {
                map.with_untracked(|m| {
                    for key in &dropped {
                        m.remove(key);
                    }
                });
            }
        }

        Ok(Json::Array(records))
    }

    fn map_from_json(
        &self,
        ctx: &ConversionContext<'_>,
        key_type: &Type,
        value_type: &Type,
        slot: &mut Value,
        items: &[Json],
    ) -> OrmResult<()> {
        let strict = ctx.config().strict_map_records;
        let current = match slot {
            Value::Map(map) => map.snapshot(),
            _ => Map::new(),
        };

        let mut entries = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            let (wire_key, wire_value) = self.record_parts(item, i, strict)?;
            let (current_key, current_value) = current
                .entry_at(i)
                .map_or((Value::Null, Value::Null), |(k, v)| (k.clone(), v.clone()));
            let key = key_type.from_json(ctx, &current_key, wire_key)?;
            let value = value_type.from_json(ctx, &current_value, wire_value)?;
            entries.push((key, value));
        }

        if strict {
            for (i, (key, _)) in entries.iter().enumerate() {
                if entries[..i].iter().any(|(earlier, _)| earlier == key) {
                    return Err(OrmError::malformed_records(
                        &self.name,
                        format!("duplicate key in record {i}"),
                    ));
                }
            }
        }

        let collapsed = match slot {
            Value::Map(existing) if ctx.owns(existing.tracker()) => {
                existing.with_untracked(|m| m.reconcile(entries))
            }
            _ => {
                let mut map = Map::new();
                let collapsed = map.reconcile(entries);
                *slot = Value::Map(new_map(ctx, self, map));
                collapsed
            }
        };
        if collapsed > 0 {
            warn!(attribute = %self.name, collapsed, "duplicate map keys collapsed on load");
        }
        Ok(())
    }

    fn record_parts<'j>(
        &self,
        item: &'j Json,
        index: usize,
        strict: bool,
    ) -> OrmResult<(&'j Json, &'j Json)> {
        const NULL: &Json = &Json::Null;
        let key = item.get("key");
        let value = item.get("value");
        match (key, value) {
            (Some(key), Some(value)) => Ok((key, value)),
            _ if strict => Err(OrmError::malformed_records(
                &self.name,
                format!("record {index} lacks a key or a value: {item}"),
            )),
            _ => {
                warn!(attribute = %self.name, index, "incomplete map record read as null");
                Ok((key.unwrap_or(NULL), value.unwrap_or(NULL)))
            }
        }
    }

    fn describe(&self) -> String {
        match &self.kind {
            AttributeKind::Singular(ty) => ty.name().to_string(),
            AttributeKind::List(ty) => format!("List<{ty}>"),
            AttributeKind::Set(ty) => format!("Set<{ty}>"),
            AttributeKind::Map { key, value } => format!("Map<{key},{value}>"),
        }
    }

    /// Type expression of the attribute as written in schemas.
    #[must_use]
    pub fn type_expr(&self) -> String {
        self.describe()
    }
}

fn elements_to_json(ctx: &ConversionContext<'_>, ty: &Type, items: &[Value]) -> OrmResult<Json> {
    items
        .iter()
        .map(|item| ty.to_json(ctx, item))
        .collect::<OrmResult<Vec<_>>>()
        .map(Json::Array)
}

fn elements_from_json(
    ctx: &ConversionContext<'_>,
    ty: &Type,
    current: &[Value],
    items: &[Json],
) -> OrmResult<Vec<Value>> {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| ty.from_json(ctx, current.get(i).unwrap_or(&Value::Null), item))
        .collect()
}

fn new_list(ctx: &ConversionContext<'_>, attribute: &Attribute, list: List<Value>) -> TrackedList {
    match ctx.tracker() {
        Some(tracker) => TrackedList::owned(list, tracker.for_collection(attribute)),
        None => TrackedList::from(list),
    }
}

fn new_set(ctx: &ConversionContext<'_>, attribute: &Attribute, set: Set<Value>) -> TrackedSet {
    match ctx.tracker() {
        Some(tracker) => TrackedSet::owned(set, tracker.for_collection(attribute)),
        None => TrackedSet::from(set),
    }
}

fn new_map(ctx: &ConversionContext<'_>, attribute: &Attribute, map: Map<Value, Value>) -> TrackedMap {
    match ctx.tracker() {
        Some(tracker) => TrackedMap::owned(map, tracker.for_collection(attribute)),
        None => TrackedMap::from(map),
    }
}
