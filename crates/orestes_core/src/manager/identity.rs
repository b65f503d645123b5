//! Per-session identity map.

use crate::entity::{Entity, EntityId, Scope, WeakEntity};
use crate::error::{OrmError, OrmResult};
use crate::metamodel::{Metamodel, ReferenceResolver};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tracing::debug;

/// Maps ids to the live instance a session manages for them.
///
/// Entries are weak. Every entity entering the map is registered with it,
/// so references to the entity resolve through the map after the instance
/// itself is gone.
pub(crate) struct IdentityMap {
    me: Weak<IdentityMap>,
    metamodel: Arc<Metamodel>,
    entries: Mutex<HashMap<EntityId, WeakEntity>>,
}

impl IdentityMap {
    pub(crate) fn new(metamodel: &Arc<Metamodel>) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            metamodel: Arc::clone(metamodel),
            entries: Mutex::new(HashMap::new()),
        })
    }

    /// The live instance for `id`, if any.
    pub(crate) fn get(&self, id: EntityId) -> Option<Entity> {
        self.entries.lock().get(&id).and_then(WeakEntity::upgrade)
    }

    /// Returns true if `entity` is the live instance for its id.
    pub(crate) fn holds(&self, entity: &Entity) -> bool {
        entity
            .id()
            .and_then(|id| self.get(id))
            .is_some_and(|managed| managed.ptr_eq(entity))
    }

    /// The instance for `id`, a new hollow one if none is live.
    pub(crate) fn reference(&self, type_name: &str, id: EntityId) -> OrmResult<Entity> {
        let mut entries = self.entries.lock();
        if let Some(entity) = entries.get(&id).and_then(WeakEntity::upgrade) {
            if !self.metamodel.is_assignable(entity.type_name(), type_name) {
                return Err(OrmError::type_mismatch(type_name, entity.type_name()));
            }
            return Ok(entity);
        }
        let entity = Entity::hollow(&self.metamodel, type_name, id)?;
        self.register(&entity);
        entries.insert(id, entity.downgrade());
        Ok(entity)
    }

    /// Fails if a different live instance holds `id`.
    pub(crate) fn check(&self, entity: &Entity, id: EntityId) -> OrmResult<()> {
        match self.get(id) {
            Some(managed) if !managed.ptr_eq(entity) => Err(conflict(entity)),
            _ => Ok(()),
        }
    }

    /// Makes `entity` the live instance for `id`.
    pub(crate) fn attach(&self, entity: &Entity, id: EntityId) -> OrmResult<()> {
        let mut entries = self.entries.lock();
        match entries.get(&id).and_then(WeakEntity::upgrade) {
            Some(managed) if managed.ptr_eq(entity) => Ok(()),
            Some(_) => Err(conflict(entity)),
            None => {
                self.register(entity);
                entries.insert(id, entity.downgrade());
                debug!(entity = %entity, "entity attached");
                Ok(())
            }
        }
    }

    /// Drops the entry for `entity` if it is the live instance.
    pub(crate) fn remove(&self, entity: &Entity) -> bool {
        let Some(id) = entity.id() else {
            return false;
        };
        let mut entries = self.entries.lock();
        let held = entries
            .get(&id)
            .and_then(WeakEntity::upgrade)
            .is_some_and(|managed| managed.ptr_eq(entity));
        if held {
            entries.remove(&id);
        }
        held
    }

    /// Number of live entries, pruning dead ones.
    pub(crate) fn live_count(&self) -> usize {
        let mut entries = self.entries.lock();
        entries.retain(|_, weak| weak.upgrade().is_some());
        entries.len()
    }

    fn register(&self, entity: &Entity) {
        let scope: Scope = self.me.clone();
        entity.set_scope(scope);
    }
}

impl ReferenceResolver for IdentityMap {
    fn resolve(&self, type_name: &str, id: EntityId) -> OrmResult<Entity> {
        self.reference(type_name, id)
    }
}

fn conflict(entity: &Entity) -> OrmError {
    OrmError::illegal_entity(format!(
        "{entity} is managed by this session as a different instance"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metamodel::{Attribute, ManagedType, Type};

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
    fn references_outlive_their_instance() {
        let metamodel = metamodel();
        let map = IdentityMap::new(&metamodel);
        let id = EntityId::new();
        let person = Entity::new(&metamodel, "Person").unwrap();
        person.set("friend", &map.reference("Person", id).unwrap()).unwrap();
        assert_eq!(map.live_count(), 0);

        let friend = person.get("friend").unwrap().as_entity().unwrap();
        assert_eq!(friend.id(), Some(id));
        assert!(map.holds(&friend));
        assert!(map.reference("Person", id).unwrap().ptr_eq(&friend));
    }

    #[test]
    fn loaded_cycle_is_freed() {
        let metamodel = metamodel();
        let map = IdentityMap::new(&metamodel);
        let a = map.reference("Person", EntityId::new()).unwrap();
        let b = map.reference("Person", EntityId::new()).unwrap();
        a.set("friend", &b).unwrap();
        b.set("friend", &a).unwrap();
        assert_eq!(map.live_count(), 2);

        drop(a);
        drop(b);
        assert_eq!(map.live_count(), 0);
    }

    #[test]
    fn second_instance_conflicts() {
        let metamodel = metamodel();
        let map = IdentityMap::new(&metamodel);
        let id = EntityId::new();
        let managed = map.reference("Person", id).unwrap();
        let other = Entity::hollow(&metamodel, "Person", id).unwrap();

        assert!(map.check(&managed, id).is_ok());
        assert!(matches!(map.check(&other, id), Err(OrmError::IllegalEntity { .. })));
        assert!(matches!(map.attach(&other, id), Err(OrmError::IllegalEntity { .. })));
        assert!(!map.remove(&other));
        assert!(map.remove(&managed));
        assert!(map.attach(&other, id).is_ok());
        assert!(map.holds(&other));
    }
}
