//! Attribute types and their wire conversions.

use super::Metamodel;
use crate::config::Config;
use crate::entity::{format_ref, parse_ref, Entity, EntityId, EntityRef};
use crate::error::{OrmError, OrmResult};
use crate::tracked::Tracker;
use crate::value::Value;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map as JsonMap, Value as Json};
use std::fmt;
use tracing::trace;

/// How values of a type are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PersistenceType {
    /// Native JSON scalar.
    Basic,
    /// Inlined nested object without identity.
    Embeddable,
    /// Stored separately, referenced by id.
    Entity,
}

/// Built-in scalar types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BasicType {
    /// UTF-8 text.
    String,
    /// Double precision number.
    Number,
    /// Boolean.
    Boolean,
    /// Instant, RFC 3339 on the wire.
    Date,
}

impl BasicType {
    /// Type name as used in schemas.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::String => "String",
            Self::Number => "Number",
            Self::Boolean => "Boolean",
            Self::Date => "Date",
        }
    }

    /// Looks up a basic type by schema name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "String" => Some(Self::String),
            "Number" => Some(Self::Number),
            "Boolean" => Some(Self::Boolean),
            "Date" => Some(Self::Date),
            _ => None,
        }
    }
}

/// The declared type of an attribute or collection element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    /// Scalar.
    Basic(BasicType),
    /// Embeddable type, by name.
    Embeddable(String),
    /// Entity type, by name.
    Entity(String),
}

impl Type {
    /// `String`.
    pub const STRING: Self = Self::Basic(BasicType::String);
    /// `Number`.
    pub const NUMBER: Self = Self::Basic(BasicType::Number);
    /// `Boolean`.
    pub const BOOLEAN: Self = Self::Basic(BasicType::Boolean);
    /// `Date`.
    pub const DATE: Self = Self::Basic(BasicType::Date);

    /// Reference to the named embeddable type.
    #[must_use]
    pub fn embeddable(name: impl Into<String>) -> Self {
        Self::Embeddable(name.into())
    }

    /// Reference to the named entity type.
    #[must_use]
    pub fn entity(name: impl Into<String>) -> Self {
        Self::Entity(name.into())
    }

    /// Name of the type.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Basic(basic) => basic.name(),
            Self::Embeddable(name) | Self::Entity(name) => name,
        }
    }

    /// Persistence classification.
    #[must_use]
    pub const fn persistence_type(&self) -> PersistenceType {
        match self {
            Self::Basic(_) => PersistenceType::Basic,
            Self::Embeddable(_) => PersistenceType::Embeddable,
            Self::Entity(_) => PersistenceType::Entity,
        }
    }

    /// Checks that `value` may be stored in a slot of this type.
    ///
    /// The check is shallow: the contents of an embedded object are not
    /// inspected. `Null` fits every type.
    pub fn check(&self, metamodel: &Metamodel, value: &Value) -> OrmResult<()> {
        let fits = match (self, value) {
            (_, Value::Null) => true,
            (Self::Basic(BasicType::String), Value::String(_))
            | (Self::Basic(BasicType::Number), Value::Number(_))
            | (Self::Basic(BasicType::Boolean), Value::Bool(_))
            | (Self::Basic(BasicType::Date), Value::Date(_)) => true,
            (Self::Embeddable(name), Value::Embedded(embedded)) => {
                metamodel.is_assignable(embedded.type_name(), name)
            }
            (Self::Entity(name), Value::Reference(reference)) => {
                metamodel.is_assignable(reference.type_name(), name)
            }
            _ => false,
        };

        if fits {
            Ok(())
        } else {
            Err(OrmError::type_mismatch(self.name(), found(value)))
        }
    }

    /// Converts an in-memory value to its wire form.
    pub fn to_json(&self, ctx: &ConversionContext<'_>, value: &Value) -> OrmResult<Json> {
        if value.is_null() {
            return Ok(Json::Null);
        }
        self.check(ctx.metamodel(), value)?;

        let json = match value {
            Value::String(s) => Json::String(s.clone()),
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map(Json::Number)
                .ok_or_else(|| OrmError::conversion(format!("{n} has no JSON representation")))?,
            Value::Bool(b) => Json::Bool(*b),
            Value::Date(d) => Json::String(d.to_rfc3339_opts(SecondsFormat::Millis, true)),
            Value::Reference(reference) => reference
                .id()
                .map_or(Json::Null, |id| Json::String(format_ref(reference.type_name(), id))),
            Value::Embedded(embedded) => {
                let mut object = JsonMap::new();
                for attribute in ctx.metamodel().attributes(embedded.type_name())? {
                    let field = attribute.get_database_value(ctx, embedded.get(attribute.name()))?;
                    object.insert(attribute.name().to_string(), field);
                }
                Json::Object(object)
            }
            other => return Err(OrmError::type_mismatch(self.name(), found(other))),
        };
        Ok(json)
    }

    /// Converts a wire value back.
    ///
    /// `current` is the value being replaced. Embedded objects of the same
    /// type are updated field by field so that their tracked collections keep
    /// their identity.
    pub fn from_json(
        &self,
        ctx: &ConversionContext<'_>,
        current: &Value,
        json: &Json,
    ) -> OrmResult<Value> {
        if json.is_null() {
            return Ok(Value::Null);
        }

        let value = match self {
            Self::Basic(BasicType::String) => json.as_str().map(|s| Value::String(s.to_string())),
            Self::Basic(BasicType::Number) => json.as_f64().map(Value::Number),
            Self::Basic(BasicType::Boolean) => json.as_bool().map(Value::Bool),
            Self::Basic(BasicType::Date) => match json.as_str() {
                Some(text) => {
                    let date = DateTime::parse_from_rfc3339(text).map_err(|e| {
                        OrmError::conversion(format!("invalid date {text:?}: {e}"))
                    })?;
                    Some(Value::Date(date.with_timezone(&Utc)))
                }
                None => None,
            },
            Self::Entity(name) => match json.as_str() {
                Some(reference) => {
                    let entity = resolve_reference(ctx, name, reference)?;
                    Some(Value::Reference(EntityRef::new(&entity)))
                }
                None => None,
            },
            Self::Embeddable(name) => match json.as_object() {
                Some(object) => Some(Value::Embedded(embedded_from_json(ctx, name, current, object)?)),
                None => None,
            },
        };

        value.ok_or_else(|| OrmError::conversion(format!("expected {}, found {json}", self.name())))
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn resolve_reference(ctx: &ConversionContext<'_>, name: &str, reference: &str) -> OrmResult<Entity> {
    let (type_name, id) = parse_ref(reference)
        .ok_or_else(|| OrmError::conversion(format!("invalid reference {reference:?}")))?;
    if !ctx.metamodel().is_assignable(type_name, name) {
        return Err(OrmError::type_mismatch(name, type_name));
    }
    trace!(reference, "resolving reference");
    ctx.resolver().resolve(type_name, id)
}

fn found(value: &Value) -> String {
    match value {
        Value::Embedded(embedded) => embedded.type_name().to_string(),
        Value::Reference(reference) => reference.type_name().to_string(),
        other => other.kind().to_string(),
    }
}

fn embedded_from_json(
    ctx: &ConversionContext<'_>,
    name: &str,
    current: &Value,
    object: &JsonMap<String, Json>,
) -> OrmResult<crate::value::Embedded> {
    let mut embedded = match current {
        Value::Embedded(existing) if existing.type_name() == name => existing.clone(),
        _ => ctx.metamodel().instantiate_embedded(name, ctx.tracker())?,
    };
    for attribute in ctx.metamodel().attributes(name)? {
        if let Some(field) = object.get(attribute.name()) {
            attribute.set_database_value(ctx, embedded.field_mut(attribute.name()), field)?;
        }
    }
    Ok(embedded)
}

/// Maps object references found on the wire to entity instances.
///
/// Inside a session this is the identity map, so a reference resolves to the
/// canonical instance for its id.
pub trait ReferenceResolver {
    /// Returns the entity for `id`, creating a hollow reference on first sight.
    fn resolve(&self, type_name: &str, id: EntityId) -> OrmResult<Entity>;
}

/// Everything a conversion needs besides the value itself.
pub struct ConversionContext<'a> {
    metamodel: &'a Metamodel,
    resolver: &'a dyn ReferenceResolver,
    config: &'a Config,
    tracker: Option<Tracker>,
}

impl<'a> ConversionContext<'a> {
    /// Creates a context whose collections are not bound to any entity.
    pub fn new(
        metamodel: &'a Metamodel,
        resolver: &'a dyn ReferenceResolver,
        config: &'a Config,
    ) -> Self {
        Self {
            metamodel,
            resolver,
            config,
            tracker: None,
        }
    }

    /// Same context, with new collections owned by `tracker`.
    pub(crate) fn for_attribute(&self, tracker: Tracker) -> Self {
        Self {
            metamodel: self.metamodel,
            resolver: self.resolver,
            config: self.config,
            tracker: Some(tracker),
        }
    }

    /// Registry of managed types.
    pub fn metamodel(&self) -> &'a Metamodel {
        self.metamodel
    }

    /// Resolver for object references.
    pub fn resolver(&self) -> &'a dyn ReferenceResolver {
        self.resolver
    }

    /// Runtime configuration.
    pub fn config(&self) -> &'a Config {
        self.config
    }

    /// Owner of the collections created during this conversion.
    pub fn tracker(&self) -> Option<&Tracker> {
        self.tracker.as_ref()
    }

    /// Returns true if a collection with owner `owner` may be updated in
    /// place by this conversion.
    pub(crate) fn owns(&self, owner: Option<&Tracker>) -> bool {
        owner == self.tracker.as_ref()
    }
}
