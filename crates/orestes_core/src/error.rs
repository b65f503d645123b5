//! Error types for the Orestes ORM runtime.

use orestes_collections::StopIteration;
use thiserror::Error;

/// Result type for ORM operations.
pub type OrmResult<T> = Result<T, OrmError>;

/// Errors that can occur while mapping, tracking or persisting entities.
#[derive(Debug, Error)]
pub enum OrmError {
    /// The value is not a managed entity this operation can work with.
    #[error("entity {entity} is not a valid entity")]
    IllegalEntity {
        /// Description of the offending value.
        entity: String,
    },

    /// The entity was deleted; further mutation is a programming error.
    #[error("entity {entity} has been removed")]
    EntityRemoved {
        /// Description of the removed entity.
        entity: String,
    },

    /// No managed type is registered under this name.
    #[error("unknown type: {name}")]
    UnknownType {
        /// Requested type name.
        name: String,
    },

    /// The type declares no attribute with this name.
    #[error("type {type_name} has no attribute {attribute}")]
    UnknownAttribute {
        /// Name of the managed type.
        type_name: String,
        /// Requested attribute name.
        attribute: String,
    },

    /// A different type is already registered under this name.
    #[error("type {name} is already defined")]
    DuplicateType {
        /// Conflicting type name.
        name: String,
    },

    /// The type already declares an attribute with this name.
    #[error("type {type_name} already declares attribute {attribute}")]
    DuplicateAttribute {
        /// Name of the managed type.
        type_name: String,
        /// Conflicting attribute name.
        attribute: String,
    },

    /// The type would become its own ancestor.
    #[error("type {name} appears in its own supertype chain")]
    CyclicInheritance {
        /// Name of the offending type.
        name: String,
    },

    /// The metamodel was sealed after bootstrap.
    #[error("metamodel is sealed; reset it before defining new types")]
    MetamodelSealed,

    /// The attribute name collides with a reserved wire key.
    #[error("attribute name {attribute} is reserved")]
    ReservedAttribute {
        /// Rejected attribute name.
        attribute: String,
    },

    /// A value does not fit the declared type.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// Declared type.
        expected: String,
        /// Kind of the supplied value.
        found: String,
    },

    /// A wire value could not be converted.
    #[error("conversion error: {message}")]
    Conversion {
        /// Description of the failure.
        message: String,
    },

    /// Map records on the wire were malformed (strict mode only).
    #[error("malformed map records for attribute {attribute}: {message}")]
    MalformedRecords {
        /// Attribute being loaded.
        attribute: String,
        /// Description of the problem.
        message: String,
    },

    /// The server answered with a non-success status.
    #[error("communication error: status {status}: {message}")]
    Communication {
        /// HTTP status code.
        status: u16,
        /// Request summary or server message.
        message: String,
    },

    /// The transport failed before a response was received.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
    },

    /// A schema document could not be interpreted.
    #[error("invalid schema: {message}")]
    InvalidSchema {
        /// Description of the problem.
        message: String,
    },

    /// JSON (de)serialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// An exhausted cursor escaped a seedless reduction.
    #[error(transparent)]
    StopIteration(#[from] StopIteration),
}

impl OrmError {
    /// Creates an illegal entity error.
    pub fn illegal_entity(entity: impl Into<String>) -> Self {
        Self::IllegalEntity {
            entity: entity.into(),
        }
    }

    /// Creates an entity removed error.
    pub fn entity_removed(entity: impl Into<String>) -> Self {
        Self::EntityRemoved {
            entity: entity.into(),
        }
    }

    /// Creates an unknown type error.
    pub fn unknown_type(name: impl Into<String>) -> Self {
        Self::UnknownType { name: name.into() }
    }

    /// Creates an unknown attribute error.
    pub fn unknown_attribute(type_name: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self::UnknownAttribute {
            type_name: type_name.into(),
            attribute: attribute.into(),
        }
    }

    /// Creates a type mismatch error.
    pub fn type_mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Creates a conversion error.
    pub fn conversion(message: impl Into<String>) -> Self {
        Self::Conversion {
            message: message.into(),
        }
    }

    /// Creates a malformed records error.
    pub fn malformed_records(attribute: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedRecords {
            attribute: attribute.into(),
            message: message.into(),
        }
    }

    /// Creates a communication error.
    pub fn communication(status: u16, message: impl Into<String>) -> Self {
        Self::Communication {
            status,
            message: message.into(),
        }
    }

    /// Creates a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates an invalid schema error.
    pub fn invalid_schema(message: impl Into<String>) -> Self {
        Self::InvalidSchema {
            message: message.into(),
        }
    }

    /// Returns true if the error came from the network round trip.
    ///
    /// Entity state is never modified when one of these is returned, so the
    /// same operation can be issued again.
    pub fn is_communication(&self) -> bool {
        matches!(self, Self::Communication { .. } | Self::Transport { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = OrmError::unknown_attribute("Person", "age");
        assert_eq!(err.to_string(), "type Person has no attribute age");

        let err = OrmError::communication(503, "PUT /db/Person/1");
        assert!(err.to_string().contains("503"));
    }

    #[test]
    fn communication_errors() {
        assert!(OrmError::communication(500, "boom").is_communication());
        assert!(OrmError::transport("connection reset").is_communication());
        assert!(!OrmError::MetamodelSealed.is_communication());
    }

    #[test]
    fn stop_iteration_converts() {
        let err: OrmError = StopIteration.into();
        assert_eq!(err.to_string(), "no such element");
    }
}
