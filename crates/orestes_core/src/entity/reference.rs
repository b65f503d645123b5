//! Entity references held by attribute values.
//!
//! A reference does not own an entity that has an id. It keeps a weak
//! handle and, once that handle is dead, resolves the id again: through the
//! session that managed the entity, or as a fresh hollow entity outside of
//! one. Entities pointing at each other therefore never keep each other
//! alive.
//!
//! An entity without an id can only be reached through its references, so
//! they anchor it until it receives one.

use super::handle::{Entity, WeakEntity};
use super::id::EntityId;
use crate::metamodel::{Metamodel, ReferenceResolver};
use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, OnceLock, Weak};
use tracing::trace;

/// Resolver an entity was registered with.
pub(crate) type Scope = Weak<dyn ReferenceResolver + Send + Sync>;

/// Id cell shared by an entity and every reference to it.
#[derive(Default)]
pub(crate) struct Identity {
    id: OnceLock<EntityId>,
    scope: Mutex<Option<Scope>>,
    anchor: Mutex<Weak<Anchor>>,
}

impl Identity {
    pub(crate) fn new(id: Option<EntityId>) -> Self {
        Self {
            id: id.map_or_else(OnceLock::new, OnceLock::from),
            ..Self::default()
        }
    }

    pub(crate) fn get(&self) -> Option<EntityId> {
        self.id.get().copied()
    }

    /// Sets the id unless one is already set, then releases the anchor.
    pub(crate) fn assign(&self, id: impl FnOnce() -> EntityId) -> EntityId {
        let id = *self.id.get_or_init(id);
        let anchor = self.anchor.lock().upgrade();
        if let Some(anchor) = anchor {
            anchor.release();
        }
        id
    }

    pub(crate) fn set_scope(&self, scope: Scope) {
        *self.scope.lock() = Some(scope);
    }

    fn scope(&self) -> Option<Arc<dyn ReferenceResolver + Send + Sync>> {
        self.scope.lock().as_ref().and_then(Weak::upgrade)
    }

    /// The anchor shared by all references to `entity`, `None` once it has
    /// an id.
    fn anchor(&self, entity: &Entity) -> Option<Arc<Anchor>> {
        if self.id.get().is_some() {
            return None;
        }
        let anchor = {
            let mut slot = self.anchor.lock();
            match slot.upgrade() {
                Some(anchor) => anchor,
                None => {
                    let anchor = Arc::new(Anchor(Mutex::new(Some(entity.clone()))));
                    *slot = Arc::downgrade(&anchor);
                    anchor
                }
            }
        };
        // An id assigned meanwhile has already swept the slot.
        if self.id.get().is_some() {
            anchor.release();
        }
        Some(anchor)
    }
}

/// Strong handle on an entity that has no id yet.
struct Anchor(Mutex<Option<Entity>>);

impl Anchor {
    fn release(&self) {
        let entity = self.0.lock().take();
        drop(entity);
    }
}

/// Reference from an attribute value to an entity.
///
/// Two references are equal when they point at the same instance, or at
/// instances of the same type with the same id.
#[derive(Clone)]
pub struct EntityRef {
    type_name: Arc<str>,
    metamodel: Arc<Metamodel>,
    identity: Arc<Identity>,
    target: Arc<Mutex<WeakEntity>>,
    anchor: Option<Arc<Anchor>>,
}

impl EntityRef {
    /// Creates a reference to `entity`.
    #[must_use]
    pub fn new(entity: &Entity) -> Self {
        let identity = Arc::clone(entity.identity());
        Self {
            type_name: Arc::from(entity.type_name()),
            metamodel: Arc::clone(entity.metamodel()),
            anchor: identity.anchor(entity),
            identity,
            target: Arc::new(Mutex::new(entity.downgrade())),
        }
    }

    /// Type of the referenced entity.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Id of the referenced entity, once it has one.
    #[must_use]
    pub fn id(&self) -> Option<EntityId> {
        self.identity.get()
    }

    /// Returns the referenced entity.
    ///
    /// If the instance the reference was made from is gone, its id is
    /// resolved again. `None` only if the type is no longer registered.
    #[must_use]
    pub fn entity(&self) -> Option<Entity> {
        let alive = self.target.lock().upgrade();
        if alive.is_some() {
            return alive;
        }
        let id = self.identity.get()?;
        let entity = self
            .identity
            .scope()
            .and_then(|scope| scope.resolve(&self.type_name, id).ok())
            .or_else(|| Entity::hollow(&self.metamodel, &self.type_name, id).ok())?;
        trace!(type_name = %self.type_name, %id, "reference resolved again");
        *self.target.lock() = entity.downgrade();
        Some(entity)
    }

    /// Returns true if the reference holds its target strongly.
    #[must_use]
    pub fn is_anchored(&self) -> bool {
        self.anchor
            .as_ref()
            .is_some_and(|anchor| anchor.0.lock().is_some())
    }
}

impl From<&Entity> for EntityRef {
    fn from(entity: &Entity) -> Self {
        Self::new(entity)
    }
}

impl PartialEq for EntityRef {
    fn eq(&self, other: &Self) -> bool {
        if Arc::ptr_eq(&self.identity, &other.identity) {
            return true;
        }
        match (self.id(), other.id()) {
            (Some(a), Some(b)) => a == b && self.type_name == other.type_name,
            _ => false,
        }
    }
}

impl fmt::Debug for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityRef")
            .field("type", &self.type_name)
            .field("id", &self.id())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metamodel::{Attribute, ManagedType, Type};
    use crate::value::Value;

    fn metamodel() -> Arc<Metamodel> {
        let metamodel = Arc::new(Metamodel::new());
        metamodel
            .add_type(
                ManagedType::entity("Person")
                    .with_attribute(Attribute::singular("friend", Type::entity("Person")))
                    .unwrap(),
            )
            .unwrap();
        metamodel
    }

    #[test]
    fn linked_entities_are_freed() {
        let metamodel = metamodel();
        let a = Entity::new(&metamodel, "Person").unwrap();
        let b = Entity::new(&metamodel, "Person").unwrap();
        a.set("friend", &b).unwrap();
        b.set("friend", &a).unwrap();
        a.mark_persistent();
        b.mark_persistent();

        let (weak_a, weak_b) = (a.downgrade(), b.downgrade());
        drop(a);
        drop(b);
        assert!(weak_a.upgrade().is_none());
        assert!(weak_b.upgrade().is_none());
    }

    #[test]
    fn unsaved_target_is_anchored_until_it_has_an_id() {
        let metamodel = metamodel();
        let person = Entity::new(&metamodel, "Person").unwrap();
        let friend = Entity::new(&metamodel, "Person").unwrap();
        person.set("friend", &friend).unwrap();
        let weak = friend.downgrade();
        drop(friend);

        let value = person.get("friend").unwrap();
        let reference = value.as_reference().unwrap();
        assert!(reference.is_anchored());
        let friend = reference.entity().unwrap();
        assert!(friend.ptr_eq(&weak.upgrade().unwrap()));

        friend.mark_persistent();
        assert!(!reference.is_anchored());
        drop(friend);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn dead_target_resolves_by_id() {
        let metamodel = metamodel();
        let friend = Entity::new(&metamodel, "Person").unwrap();
        friend.mark_persistent();
        let id = friend.id();
        let value = Value::from(&friend);
        drop(friend);

        let reference = value.as_reference().unwrap();
        assert_eq!(reference.id(), id);
        let again = reference.entity().unwrap();
        assert_eq!(again.id(), id);
        assert!(!again.is_loaded());
        assert!(reference.entity().unwrap().ptr_eq(&again));
    }

    #[test]
    fn equality_follows_identity() {
        let metamodel = metamodel();
        let a = Entity::new(&metamodel, "Person").unwrap();
        let b = Entity::new(&metamodel, "Person").unwrap();
        assert_eq!(EntityRef::new(&a), EntityRef::from(&a));
        assert_ne!(EntityRef::new(&a), EntityRef::new(&b));

        a.mark_persistent();
        let id = a.id().unwrap();
        let hollow = Entity::hollow(&metamodel, "Person", id).unwrap();
        assert_eq!(EntityRef::new(&a), EntityRef::new(&hollow));
    }
}
