//! Entity and embeddable type declarations.

use super::attribute::{Attribute, RESERVED_NAMES};
use super::types::Type;
use crate::error::{OrmError, OrmResult};

/// Whether instances of a managed type have identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// Instances have an id and are stored on their own.
    Entity,
    /// Instances are stored inline in their owner.
    Embeddable,
}

/// A user-declared type: name, optional supertype and attributes in
/// declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedType {
    name: String,
    kind: TypeKind,
    supertype: Option<String>,
    attributes: Vec<Attribute>,
}

impl ManagedType {
    /// Declares an entity type.
    #[must_use]
    pub fn entity(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Entity)
    }

    /// Declares an embeddable type.
    #[must_use]
    pub fn embeddable(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Embeddable)
    }

    fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            supertype: None,
            attributes: Vec::new(),
        }
    }

    /// Sets the supertype (single inheritance).
    #[must_use]
    pub fn with_supertype(mut self, supertype: impl Into<String>) -> Self {
        self.supertype = Some(supertype.into());
        self
    }

    /// Appends an attribute.
    ///
    /// Fails with `ReservedAttribute` for `id`, `version` and `acl`, and with
    /// `DuplicateAttribute` if the type already declares the name.
    pub fn add_attribute(&mut self, attribute: Attribute) -> OrmResult<()> {
        if RESERVED_NAMES.contains(&attribute.name()) {
            return Err(OrmError::ReservedAttribute {
                attribute: attribute.name().to_string(),
            });
        }
        if self.declared_attribute(attribute.name()).is_some() {
            return Err(OrmError::DuplicateAttribute {
                type_name: self.name.clone(),
                attribute: attribute.name().to_string(),
            });
        }
        self.attributes.push(attribute);
        Ok(())
    }

    /// Builder-style [`add_attribute`](Self::add_attribute).
    pub fn with_attribute(mut self, attribute: Attribute) -> OrmResult<Self> {
        self.add_attribute(attribute)?;
        Ok(self)
    }

    /// Type name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Entity or embeddable.
    #[must_use]
    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    /// Returns true for entity types.
    #[must_use]
    pub fn is_entity(&self) -> bool {
        self.kind == TypeKind::Entity
    }

    /// Returns true for embeddable types.
    #[must_use]
    pub fn is_embeddable(&self) -> bool {
        self.kind == TypeKind::Embeddable
    }

    /// Name of the direct supertype.
    #[must_use]
    pub fn supertype(&self) -> Option<&str> {
        self.supertype.as_deref()
    }

    /// Attributes declared by this type itself, in declaration order.
    #[must_use]
    pub fn declared_attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Own attribute by name, ignoring supertypes.
    #[must_use]
    pub fn declared_attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name() == name)
    }

    /// The [`Type`] referring to this managed type.
    #[must_use]
    pub fn as_type(&self) -> Type {
        match self.kind {
            TypeKind::Entity => Type::entity(&self.name),
            TypeKind::Embeddable => Type::embeddable(&self.name),
        }
    }
}
