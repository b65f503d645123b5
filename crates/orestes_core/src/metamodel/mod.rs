//! Registry of managed types.
//!
//! The metamodel maps type names to [`ManagedType`]s. Registration is
//! additive; once bootstrap has synchronized with the server the registry is
//! sealed and only [`Metamodel::reset`] reopens it.

mod attribute;
mod managed_type;
mod schema;
mod types;

pub use attribute::{Attribute, AttributeKind, CollectionType, PersistentAttributeType, RESERVED_NAMES};
pub use managed_type::{ManagedType, TypeKind};
pub use schema::{parse_type_expr, FieldDocument, SchemaDocument};
pub use types::{BasicType, ConversionContext, PersistenceType, ReferenceResolver, Type};

use crate::error::{OrmError, OrmResult};
use crate::tracked::Tracker;
use crate::value::Embedded;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Thread-safe registry of managed types, shared through `Arc`.
#[derive(Debug, Default)]
pub struct Metamodel {
    types: RwLock<BTreeMap<String, Arc<ManagedType>>>,
    sealed: AtomicBool,
}

impl Metamodel {
    /// Creates an empty, unsealed metamodel.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a type.
    ///
    /// Registering the same `Arc` twice is a no-op. Fails with
    /// `DuplicateType` if another type holds the name, `CyclicInheritance`
    /// if the type would become its own ancestor, and `MetamodelSealed`
    /// after [`seal`](Self::seal).
    pub fn add_type(&self, managed_type: impl Into<Arc<ManagedType>>) -> OrmResult<Arc<ManagedType>> {
        let managed_type = managed_type.into();
        if self.is_sealed() {
            return Err(OrmError::MetamodelSealed);
        }

        let mut types = self.types.write();
        if let Some(existing) = types.get(managed_type.name()) {
            if Arc::ptr_eq(existing, &managed_type) {
                return Ok(Arc::clone(existing));
            }
            return Err(OrmError::DuplicateType {
                name: managed_type.name().to_string(),
            });
        }

        let mut ancestor = managed_type.supertype();
        let mut steps = 0usize;
        while let Some(name) = ancestor {
            if name == managed_type.name() || steps > types.len() {
                return Err(OrmError::CyclicInheritance {
                    name: managed_type.name().to_string(),
                });
            }
            ancestor = types.get(name).and_then(|t| t.supertype());
            steps += 1;
        }

        debug!(type_name = managed_type.name(), kind = ?managed_type.kind(), "type registered");
        types.insert(managed_type.name().to_string(), Arc::clone(&managed_type));
        Ok(managed_type)
    }

    /// Makes the registry read-only.
    pub fn seal(&self) {
        self.sealed.store(true, Ordering::SeqCst);
    }

    /// Returns true once sealed.
    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::SeqCst)
    }

    /// Drops every type and unseals the registry.
    pub fn reset(&self) {
        self.types.write().clear();
        self.sealed.store(false, Ordering::SeqCst);
    }

    /// Looks up any managed type.
    #[must_use]
    pub fn managed_type(&self, name: &str) -> Option<Arc<ManagedType>> {
        self.types.read().get(name).cloned()
    }

    /// Looks up an entity type.
    #[must_use]
    pub fn entity(&self, name: &str) -> Option<Arc<ManagedType>> {
        self.managed_type(name).filter(|t| t.is_entity())
    }

    /// Looks up an embeddable type.
    #[must_use]
    pub fn embeddable(&self, name: &str) -> Option<Arc<ManagedType>> {
        self.managed_type(name).filter(|t| t.is_embeddable())
    }

    /// All registered types in name order.
    #[must_use]
    pub fn types(&self) -> Vec<Arc<ManagedType>> {
        self.types.read().values().cloned().collect()
    }

    /// Names of the ancestors of `name`, nearest first.
    ///
    /// The walk stops at the first supertype that is not registered.
    #[must_use]
    pub fn supertypes(&self, name: &str) -> Vec<String> {
        let types = self.types.read();
        let mut chain = Vec::new();
        let mut current = types.get(name).and_then(|t| t.supertype());
        while let Some(supertype) = current {
            if chain.iter().any(|seen| seen == supertype) {
                break;
            }
            chain.push(supertype.to_string());
            current = types.get(supertype).and_then(|t| t.supertype());
        }
        chain
    }

    /// Returns true if values of type `sub` may be stored where `sup` is
    /// declared.
    #[must_use]
    pub fn is_assignable(&self, sub: &str, sup: &str) -> bool {
        sub == sup || self.supertypes(sub).iter().any(|s| s == sup)
    }

    /// Finds an attribute of `type_name`, own attributes first, then those
    /// of the ancestors.
    pub fn attribute(&self, type_name: &str, name: &str) -> OrmResult<Attribute> {
        let managed_type = self
            .managed_type(type_name)
            .ok_or_else(|| OrmError::unknown_type(type_name))?;
        if let Some(attribute) = managed_type.declared_attribute(name) {
            return Ok(attribute.clone());
        }
        for supertype in self.supertypes(type_name) {
            if let Some(attribute) = self
                .managed_type(&supertype)
                .and_then(|t| t.declared_attribute(name).cloned())
            {
                return Ok(attribute);
            }
        }
        Err(OrmError::unknown_attribute(type_name, name))
    }

    /// All attributes visible on `type_name`, root type first.
    ///
    /// An attribute redeclared by a subtype replaces the inherited one at
    /// the inherited position.
    pub fn attributes(&self, type_name: &str) -> OrmResult<Vec<Attribute>> {
        let managed_type = self
            .managed_type(type_name)
            .ok_or_else(|| OrmError::unknown_type(type_name))?;

        let mut chain: Vec<Arc<ManagedType>> = self
            .supertypes(type_name)
            .iter()
            .filter_map(|name| self.managed_type(name))
            .collect();
        chain.reverse();
        chain.push(managed_type);

        let mut attributes: Vec<Attribute> = Vec::new();
        for declaring in chain {
            for attribute in declaring.declared_attributes() {
                match attributes.iter_mut().find(|a| a.name() == attribute.name()) {
                    Some(shadowed) => *shadowed = attribute.clone(),
                    None => attributes.push(attribute.clone()),
                }
            }
        }
        Ok(attributes)
    }

    /// Creates an instance of an embeddable type with every declared
    /// attribute initialized.
    pub fn create_embedded(&self, name: &str) -> OrmResult<Embedded> {
        self.instantiate_embedded(name, None)
    }

    pub(crate) fn instantiate_embedded(
        &self,
        name: &str,
        tracker: Option<&Tracker>,
    ) -> OrmResult<Embedded> {
        if self.embeddable(name).is_none() {
            return Err(OrmError::unknown_type(name));
        }
        let mut embedded = Embedded::new(name);
        for attribute in self.attributes(name)? {
            embedded.set(attribute.name(), attribute.initial_value(tracker));
        }
        Ok(embedded)
    }

    /// Builds a metamodel from a schema document list.
    pub fn from_schema(schema: &serde_json::Value) -> OrmResult<Self> {
        let metamodel = Self::new();
        metamodel.register_schema(schema)?;
        Ok(metamodel)
    }

    /// Registers every type of a schema document list, skipping names that
    /// are already registered.
    ///
    /// Returns the newly registered types.
    pub fn register_schema(&self, schema: &serde_json::Value) -> OrmResult<Vec<Arc<ManagedType>>> {
        let documents: Vec<SchemaDocument> = serde_json::from_value(schema.clone())
            .map_err(|e| OrmError::invalid_schema(e.to_string()))?;
        let parsed = schema::parse_documents(&documents, |name| self.embeddable(name).is_some())?;

        let mut added = Vec::new();
        for managed_type in parsed {
            if self.managed_type(managed_type.name()).is_none() {
                added.push(self.add_type(managed_type)?);
            }
        }
        Ok(added)
    }

    /// Serializes every registered type as a schema document list.
    #[must_use]
    pub fn to_schema(&self) -> serde_json::Value {
        let documents: Vec<SchemaDocument> =
            self.types().iter().map(|t| SchemaDocument::from_type(t)).collect();
        serde_json::to_value(documents).unwrap_or_default()
    }
}
