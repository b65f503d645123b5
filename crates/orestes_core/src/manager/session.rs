//! Entity manager sessions.

use super::identity::IdentityMap;
use super::message;
use crate::config::Config;
use crate::entity::{Entity, EntityId};
use crate::error::{OrmError, OrmResult};
use crate::metamodel::{Metamodel, ReferenceResolver};
use crate::transport::Transport;
use std::sync::Arc;
use tracing::debug;

/// A session over one transport with its own identity map.
///
/// Within a session every id maps to at most one live [`Entity`]: loading
/// the same object twice, or resolving a reference to it, yields the same
/// instance. The map holds weak handles, so dropping the last user handle
/// lets the entity go; references to it then resolve through the map again.
///
/// Network operations suspend only while the request is in flight. No lock
/// is held across the await, and responses may complete in any order.
pub struct EntityManager<T: Transport> {
    transport: Arc<T>,
    metamodel: Arc<Metamodel>,
    config: Arc<Config>,
    identity: Arc<IdentityMap>,
}

impl<T: Transport> EntityManager<T> {
    /// Creates a session. Usually obtained from
    /// [`EntityManagerFactory::create_entity_manager`](super::EntityManagerFactory::create_entity_manager).
    pub fn new(transport: Arc<T>, metamodel: Arc<Metamodel>, config: Arc<Config>) -> Self {
        Self {
            identity: IdentityMap::new(&metamodel),
            transport,
            metamodel,
            config,
        }
    }

    /// The metamodel shared by this session.
    pub fn metamodel(&self) -> &Arc<Metamodel> {
        &self.metamodel
    }

    /// The session configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The underlying transport.
    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Creates a transient entity. It joins the identity map on first save.
    pub fn create(&self, type_name: &str) -> OrmResult<Entity> {
        Entity::new(&self.metamodel, type_name)
    }

    /// Returns the canonical instance for `id`.
    ///
    /// If the session does not know the object yet, a hollow entity is
    /// created: persistent, not loaded, with every attribute empty.
    pub fn reference(&self, type_name: &str, id: EntityId) -> OrmResult<Entity> {
        self.identity.reference(type_name, id)
    }

    /// Returns true if `entity` is the instance this session manages.
    pub fn contains(&self, entity: &Entity) -> bool {
        self.identity.holds(entity)
    }

    /// Removes `entity` from the identity map. Returns true if it was managed.
    ///
    /// The entity keeps its state; a later load of the same id yields a new
    /// instance.
    pub fn detach(&self, entity: &Entity) -> bool {
        let detached = self.identity.remove(entity);
        if detached {
            debug!(entity = %entity, "entity detached");
        }
        detached
    }

    /// Number of live entities in the identity map.
    pub fn managed_count(&self) -> usize {
        self.identity.live_count()
    }

    /// Saves `entity`.
    ///
    /// A transient entity is inserted with all of its attributes and an
    /// optimistic id; otherwise only dirty attributes are sent. A clean
    /// persistent entity is not sent at all. An acknowledgement older than
    /// the confirmed version is discarded, which still counts as success.
    ///
    /// On failure the entity keeps its dirty flags and version, so the save
    /// can be issued again. Saving an instance whose id the session manages
    /// as a different instance fails with `IllegalEntity` and changes
    /// nothing.
    pub async fn save(&self, entity: &Entity) -> OrmResult<()> {
        self.check_owner(entity)?;
        if entity.lifecycle().is_persistent() && !entity.is_dirty() {
            debug!(entity = %entity, "nothing to save");
            return Ok(());
        }
        if let Some(id) = entity.id() {
            self.identity.check(entity, id)?;
        }

        let (ticket, body) = entity.prepare_save(self, &self.config)?;
        let id = entity
            .id()
            .ok_or_else(|| OrmError::illegal_entity(entity.to_string()))?;
        self.identity.attach(entity, id)?;

        let request = if ticket.insert {
            message::insert_object(&self.config, entity.type_name(), body)
        } else {
            message::update_object(&self.config, entity.type_name(), id, body)
        };
        let summary = request.to_string();
        debug!(request = %summary, "sending save");

        let response = self.transport.send(request).await?;
        let response = message::expect_status(&summary, response, &[200, 201])?;
        let version = message::ack_version(&summary, &response.body)?;
        entity.confirm_save(version, &ticket);
        Ok(())
    }

    /// Loads an object by id.
    ///
    /// Returns `None` if the server does not know it. A response older than
    /// what the session already holds is discarded and the current instance
    /// returned unchanged. Attributes modified while the request was in
    /// flight keep their local value.
    pub async fn load(&self, type_name: &str, id: EntityId) -> OrmResult<Option<Entity>> {
        if self.metamodel.entity(type_name).is_none() {
            return Err(OrmError::unknown_type(type_name));
        }
        let mark = self
            .identity
            .get(id)
            .map_or(0, |entity| entity.mutation_mark());
        let request = message::get_object(&self.config, type_name, id);
        let summary = request.to_string();
        debug!(request = %summary, "sending load");

        let response = self.transport.send(request).await?;
        if response.status == 404 {
            debug!(request = %summary, "object not found");
            return Ok(None);
        }
        let response = message::expect_status(&summary, response, &[200])?;

        let entity = self.reference(type_name, id)?;
        entity.apply_load(&response.body, mark, self, &self.config)?;
        Ok(Some(entity))
    }

    /// Reloads `entity` from the server, discarding the changes made before
    /// the call.
    ///
    /// Fails with `Communication` if the object no longer exists.
    pub async fn refresh(&self, entity: &Entity) -> OrmResult<()> {
        self.check_owner(entity)?;
        let id = entity
            .id()
            .ok_or_else(|| OrmError::illegal_entity(entity.to_string()))?;
        if entity.lifecycle().is_removed() {
            return Err(OrmError::entity_removed(entity.to_string()));
        }
        self.identity.attach(entity, id)?;
        let mark = entity.mutation_mark();

        let request = message::get_object(&self.config, entity.type_name(), id);
        let summary = request.to_string();
        debug!(request = %summary, "sending refresh");

        let response = self.transport.send(request).await?;
        let response = message::expect_status(&summary, response, &[200])?;
        entity.apply_load(&response.body, mark, self, &self.config)?;
        Ok(())
    }

    /// Deletes `entity` on the server. Once accepted the entity is removed
    /// and leaves the identity map.
    pub async fn delete(&self, entity: &Entity) -> OrmResult<()> {
        self.check_owner(entity)?;
        let id = entity
            .id()
            .ok_or_else(|| OrmError::illegal_entity(entity.to_string()))?;
        if entity.lifecycle().is_removed() {
            return Err(OrmError::entity_removed(entity.to_string()));
        }

        let request = message::delete_object(&self.config, entity.type_name(), id);
        let summary = request.to_string();
        debug!(request = %summary, "sending delete");

        let response = self.transport.send(request).await?;
        message::expect_status(&summary, response, &[200, 204])?;
        entity.confirm_delete();
        self.identity.remove(entity);
        Ok(())
    }

    fn check_owner(&self, entity: &Entity) -> OrmResult<()> {
        if Arc::ptr_eq(entity.metamodel(), &self.metamodel) {
            Ok(())
        } else {
            Err(OrmError::illegal_entity(format!(
                "{entity} belongs to another metamodel"
            )))
        }
    }
}

impl<T: Transport> ReferenceResolver for EntityManager<T> {
    fn resolve(&self, type_name: &str, id: EntityId) -> OrmResult<Entity> {
        self.identity.reference(type_name, id)
    }
}
