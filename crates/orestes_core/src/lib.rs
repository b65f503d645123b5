//! # Orestes Core
//!
//! Object mapping runtime for a remote document database.
//!
//! This crate provides:
//! - `Metamodel`: registry of entity and embeddable types
//! - `Entity`: shared handle with lifecycle, version and per-attribute dirty flags
//! - Tracked collections that flag their owning attribute on mutation
//! - Attribute converters between in-memory values and wire JSON
//! - `Acl`: read and write permission tables
//! - `EntityManager`: save, load, refresh and delete over a `Transport`
//!
//! ## Example
//!
//! ```
//! use orestes_core::{Attribute, Entity, ManagedType, Metamodel, Type};
//! use std::sync::Arc;
//!
//! let metamodel = Arc::new(Metamodel::new());
//! metamodel
//!     .add_type(
//!         ManagedType::entity("Person")
//!             .with_attribute(Attribute::singular("name", Type::STRING))?
//!             .with_attribute(Attribute::set("tags", Type::STRING))?,
//!     )?;
//!
//! let person = Entity::new(&metamodel, "Person")?;
//! person.set("name", "Ada")?;
//! person.get("tags")?.as_set().unwrap().add("math")?;
//! assert!(person.is_attribute_dirty("tags"));
//! # Ok::<(), orestes_core::OrmError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod acl;
mod config;
mod entity;
mod error;
mod manager;
mod metamodel;
mod tracked;
mod transport;
mod value;

pub use acl::{Acl, AclHandle, Permission, Principal, PrincipalRef, Rule};
pub use config::{Config, MapKeyPolicy};
pub use entity::{
    format_ref, parse_ref, DetachedResolver, Entity, EntityId, EntityRef, Lifecycle, State,
    WeakEntity, REF_PREFIX,
};
pub use error::{OrmError, OrmResult};
pub use manager::{EntityManager, EntityManagerFactory};
pub use metamodel::{
    parse_type_expr, Attribute, AttributeKind, BasicType, CollectionType, ConversionContext,
    FieldDocument, ManagedType, Metamodel, PersistenceType, PersistentAttributeType,
    ReferenceResolver, SchemaDocument, Type, TypeKind, RESERVED_NAMES,
};
pub use tracked::{TrackedList, TrackedMap, TrackedSet, Tracker};
pub use transport::{Method, MockTransport, Request, Response, Transport};
pub use value::{Embedded, Value};

pub use orestes_collections::{Cursor, List, Map, Record, Sequenceable, Set, StopIteration};
