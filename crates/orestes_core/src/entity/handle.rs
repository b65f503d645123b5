//! The entity handle.

use super::id::{format_ref, EntityId};
use super::reference::{Identity, Scope};
use super::state::{Lifecycle, SaveTicket, State};
use crate::acl::{Acl, AclHandle};
use crate::config::Config;
use crate::error::{OrmError, OrmResult};
use crate::metamodel::{ConversionContext, Metamodel, ReferenceResolver};
use crate::tracked::Tracker;
use crate::value::Value;
use parking_lot::Mutex;
use serde_json::{Map as JsonMap, Value as Json};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

struct EntityInner {
    metamodel: Arc<Metamodel>,
    type_name: String,
    identity: Arc<Identity>,
    state: Arc<Mutex<State>>,
    slots: Mutex<Slots>,
}

struct Slots {
    values: BTreeMap<String, Value>,
    acl: Acl,
}

/// A managed object.
///
/// Locks are taken in the order state, then slots, then collection
/// contents. The id lives outside both locks, in a cell shared with every
/// [`EntityRef`](super::EntityRef) to the entity, so that references can be
/// serialized without touching the state of their target.
#[derive(Clone)]
pub struct Entity {
    inner: Arc<EntityInner>,
}

impl Entity {
    /// Creates a transient instance of an entity type.
    ///
    /// Every attribute starts out `Null`, or as an empty collection owned by
    /// the new entity.
    pub fn new(metamodel: &Arc<Metamodel>, type_name: &str) -> OrmResult<Self> {
        Self::build(metamodel, type_name, None, State::transient(type_name))
    }

    /// Creates the hollow reference for a known id: persistent, not loaded.
    pub(crate) fn hollow(metamodel: &Arc<Metamodel>, type_name: &str, id: EntityId) -> OrmResult<Self> {
        Self::build(metamodel, type_name, Some(id), State::hollow(type_name))
    }

    fn build(
        metamodel: &Arc<Metamodel>,
        type_name: &str,
        id: Option<EntityId>,
        state: State,
    ) -> OrmResult<Self> {
        if metamodel.entity(type_name).is_none() {
            return Err(OrmError::unknown_type(type_name));
        }
        let state = Arc::new(Mutex::new(state));
        let values = metamodel
            .attributes(type_name)?
            .into_iter()
            .map(|attribute| {
                let tracker = Tracker::new(&state, metamodel, attribute.name());
                let value = attribute.initial_value(Some(&tracker));
                (attribute.name().to_string(), value)
            })
            .collect();

        debug!(type_name, ?id, "entity created");
        Ok(Self {
            inner: Arc::new(EntityInner {
                metamodel: Arc::clone(metamodel),
                type_name: type_name.to_string(),
                identity: Arc::new(Identity::new(id)),
                state,
                slots: Mutex::new(Slots {
                    values,
                    acl: Acl::default(),
                }),
            }),
        })
    }

    /// Builds a detached entity from its wire JSON.
    ///
    /// With a `version` key the entity is persistent and clean; without one
    /// it is transient and every attribute present in `json` is dirty.
    /// References resolve to fresh hollow entities.
    pub fn from_json(metamodel: &Arc<Metamodel>, type_name: &str, json: &Json) -> OrmResult<Self> {
        Self::from_json_with(metamodel, type_name, json, &Config::default())
    }

    /// [`from_json`](Self::from_json) with explicit map handling settings.
    pub fn from_json_with(
        metamodel: &Arc<Metamodel>,
        type_name: &str,
        json: &Json,
        config: &Config,
    ) -> OrmResult<Self> {
        let object = json
            .as_object()
            .ok_or_else(|| OrmError::conversion(format!("{type_name} must be a JSON object")))?;
        let id = match object.get("id") {
            None | Some(Json::Null) => None,
            Some(Json::String(text)) => Some(
                EntityId::parse(text)
                    .ok_or_else(|| OrmError::conversion(format!("invalid id {text:?}")))?,
            ),
            Some(other) => return Err(OrmError::conversion(format!("invalid id {other}"))),
        };

        let entity = Self::build(metamodel, type_name, id, State::transient(type_name))?;
        let resolver = DetachedResolver::new(metamodel);

        let mut state = entity.inner.state.lock();
        let mut slots = entity.inner.slots.lock();
        let applied = entity.apply_attributes(&mut slots, object, |_| false, &resolver, config)?;
        match object.get("version").and_then(Json::as_u64) {
            Some(version) => {
                let mark = state.mutation_mark();
                state.confirm_load(version, mark);
            }
            None => applied.iter().for_each(|name| state.mark_dirty(name)),
        }
        drop(slots);
        drop(state);
        Ok(entity)
    }

    /// Name of the entity type.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.inner.type_name
    }

    /// The id, assigned on first save or known from the server.
    #[must_use]
    pub fn id(&self) -> Option<EntityId> {
        self.inner.identity.get()
    }

    /// The reference path `/db/<Type>/<id>`, if the entity has an id.
    #[must_use]
    pub fn ref_path(&self) -> Option<String> {
        self.id().map(|id| format_ref(&self.inner.type_name, id))
    }

    /// Metamodel the entity was created from.
    #[must_use]
    pub fn metamodel(&self) -> &Arc<Metamodel> {
        &self.inner.metamodel
    }

    /// Copy of the current state record.
    #[must_use]
    pub fn state(&self) -> State {
        self.inner.state.lock().clone()
    }

    /// Last version confirmed by the server.
    #[must_use]
    pub fn version(&self) -> Option<u64> {
        self.inner.state.lock().version()
    }

    /// Current lifecycle status.
    #[must_use]
    pub fn lifecycle(&self) -> Lifecycle {
        self.inner.state.lock().lifecycle()
    }

    /// False for hollow references.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.inner.state.lock().is_loaded()
    }

    /// Returns true if any attribute changed since the last confirmed save
    /// or load.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.inner.state.lock().is_dirty()
    }

    /// Returns true if `attribute` changed since the last confirmed save or
    /// load.
    #[must_use]
    pub fn is_attribute_dirty(&self, attribute: &str) -> bool {
        self.inner.state.lock().is_attribute_dirty(attribute)
    }

    /// Names of the dirty attributes.
    #[must_use]
    pub fn dirty_attributes(&self) -> Vec<String> {
        self.inner.state.lock().dirty_attributes()
    }

    /// Returns the value of an attribute.
    ///
    /// Collections are returned as handles: mutating them mutates the
    /// entity.
    pub fn get(&self, name: &str) -> OrmResult<Value> {
        self.inner
            .slots
            .lock()
            .values
            .get(name)
            .cloned()
            .ok_or_else(|| OrmError::unknown_attribute(&self.inner.type_name, name))
    }

    /// Assigns an attribute and marks it dirty.
    ///
    /// Collections not owned by this attribute are copied into fresh owned
    /// ones. Fails with `TypeMismatch` if the value does not fit the
    /// declared type and with `EntityRemoved` after deletion.
    pub fn set(&self, name: &str, value: impl Into<Value>) -> OrmResult<()> {
        let attribute = self.inner.metamodel.attribute(&self.inner.type_name, name)?;
        let value = value.into();
        attribute.check(&self.inner.metamodel, &value)?;
        let tracker = Tracker::new(&self.inner.state, &self.inner.metamodel, name);
        let value = value.adopt(&tracker.for_collection(&attribute));

        let mut state = self.inner.state.lock();
        if state.lifecycle().is_removed() {
            return Err(self.removed());
        }
        self.inner.slots.lock().values.insert(name.to_string(), value);
        state.mark_dirty(name);
        Ok(())
    }

    /// Access rules of this entity.
    #[must_use]
    pub fn acl(&self) -> AclHandle<'_> {
        AclHandle::new(self)
    }

    /// Marks the entity as in sync with the server without a round trip,
    /// assigning an id if it has none.
    pub fn mark_persistent(&self) {
        let mut state = self.inner.state.lock();
        self.inner.identity.assign(EntityId::new);
        state.set_persistent();
    }

    /// Serializes every attribute together with `id`, `version` and `acl`.
    pub fn to_json(&self) -> OrmResult<Json> {
        let resolver = DetachedResolver::new(&self.inner.metamodel);
        let config = Config::default();
        let state = self.inner.state.lock();
        let slots = self.inner.slots.lock();
        self.serialize(&slots, self.id(), state.version(), |_| true, &resolver, &config)
    }

    /// Returns a weak handle that does not keep the entity alive.
    #[must_use]
    pub fn downgrade(&self) -> WeakEntity {
        WeakEntity {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Returns true if both handles refer to the same object.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn identity(&self) -> &Arc<Identity> {
        &self.inner.identity
    }

    /// Registers the resolver that finds this entity again by id.
    pub(crate) fn set_scope(&self, scope: Scope) {
        self.inner.identity.set_scope(scope);
    }

    pub(crate) fn with_acl<R>(&self, read: impl FnOnce(&Acl) -> R) -> R {
        read(&self.inner.slots.lock().acl)
    }

    pub(crate) fn mutate_acl<R>(&self, mutate: impl FnOnce(&mut Acl) -> R) -> OrmResult<R> {
        let mut state = self.inner.state.lock();
        if state.lifecycle().is_removed() {
            return Err(self.removed());
        }
        let result = mutate(&mut self.inner.slots.lock().acl);
        state.mark_dirty("acl");
        Ok(result)
    }

    /// Starts a save and serializes the request body.
    ///
    /// Nothing changes if serialization fails. On success a transient entity
    /// becomes attached and receives its optimistic id.
    pub(crate) fn prepare_save(
        &self,
        resolver: &dyn ReferenceResolver,
        config: &Config,
    ) -> OrmResult<(SaveTicket, Json)> {
        let mut state = self.inner.state.lock();
        let mut staged = state.clone();
        let ticket = staged.begin_save().ok_or_else(|| self.removed())?;
        let id = self.id().unwrap_or_else(EntityId::new);

        let body = {
            let slots = self.inner.slots.lock();
            self.serialize(
                &slots,
                Some(id),
                staged.version(),
                |name| ticket.includes(name),
                resolver,
                config,
            )?
        };

        self.inner.identity.assign(|| id);
        *state = staged;
        debug!(
            type_name = %self.inner.type_name,
            %id,
            insert = ticket.insert,
            full = ticket.full,
            "save prepared"
        );
        Ok((ticket, body))
    }

    /// Applies a save acknowledgement. Returns false if it was discarded.
    pub(crate) fn confirm_save(&self, version: u64, ticket: &SaveTicket) -> bool {
        let mut state = self.inner.state.lock();
        let previous = state.version();
        if state.confirm_save(version, ticket) {
            debug!(type_name = %self.inner.type_name, version, "save confirmed");
            true
        } else {
            warn!(
                type_name = %self.inner.type_name,
                version,
                ?previous,
                lifecycle = ?state.lifecycle(),
                "stale save response discarded"
            );
            false
        }
    }

    /// Sequence number of the latest local mutation.
    ///
    /// Taken before a load request is sent and handed back to
    /// [`apply_load`](Self::apply_load) with its response.
    pub(crate) fn mutation_mark(&self) -> u64 {
        self.inner.state.lock().mutation_mark()
    }

    /// Overwrites the attributes with a server response.
    ///
    /// Attributes mutated after `mark` keep their local value and stay
    /// dirty. Returns false if the response is older than the confirmed
    /// version or the entity was removed; nothing changes in that case.
    pub(crate) fn apply_load(
        &self,
        json: &Json,
        mark: u64,
        resolver: &dyn ReferenceResolver,
        config: &Config,
    ) -> OrmResult<bool> {
        let object = json.as_object().ok_or_else(|| {
            OrmError::conversion(format!("{} must be a JSON object", self.inner.type_name))
        })?;
        let version = object
            .get("version")
            .and_then(Json::as_u64)
            .ok_or_else(|| OrmError::conversion("load response carries no version"))?;

        let mut state = self.inner.state.lock();
        if !state.accepts_load(version) {
            warn!(
                type_name = %self.inner.type_name,
                version,
                previous = ?state.version(),
                "stale load response discarded"
            );
            return Ok(false);
        }
        let kept: Vec<String> = state
            .dirty_attributes()
            .into_iter()
            .filter(|name| state.dirtied_since(name, mark))
            .collect();
        let mut slots = self.inner.slots.lock();
        let keep = |name: &str| kept.iter().any(|k| k == name);
        self.apply_attributes(&mut slots, object, keep, resolver, config)?;
        state.confirm_load(version, mark);
        debug!(type_name = %self.inner.type_name, version, ?kept, "entity loaded");
        Ok(true)
    }

    pub(crate) fn confirm_delete(&self) {
        self.inner.state.lock().confirm_delete();
        debug!(type_name = %self.inner.type_name, id = ?self.id(), "entity removed");
    }

    fn apply_attributes(
        &self,
        slots: &mut Slots,
        object: &JsonMap<String, Json>,
        skip: impl Fn(&str) -> bool,
        resolver: &dyn ReferenceResolver,
        config: &Config,
    ) -> OrmResult<Vec<String>> {
        let metamodel = &self.inner.metamodel;
        let base = ConversionContext::new(metamodel, resolver, config);
        let mut applied = Vec::new();

        for attribute in metamodel.attributes(&self.inner.type_name)? {
            let Some(json) = object.get(attribute.name()).filter(|_| !skip(attribute.name())) else {
                continue;
            };
            let tracker = Tracker::new(&self.inner.state, metamodel, attribute.name());
            let ctx = base.for_attribute(tracker);
            let slot = slots.values.entry(attribute.name().to_string()).or_default();
            attribute.set_database_value(&ctx, slot, json)?;
            applied.push(attribute.name().to_string());
        }
        if let Some(acl) = object.get("acl").filter(|_| !skip("acl")) {
            slots.acl = Acl::from_json(acl)?;
            applied.push("acl".to_string());
        }
        Ok(applied)
    }

    fn serialize(
        &self,
        slots: &Slots,
        id: Option<EntityId>,
        version: Option<u64>,
        include: impl Fn(&str) -> bool,
        resolver: &dyn ReferenceResolver,
        config: &Config,
    ) -> OrmResult<Json> {
        let metamodel = &self.inner.metamodel;
        let base = ConversionContext::new(metamodel, resolver, config);
        let mut object = JsonMap::new();

        if let Some(id) = id {
            object.insert("id".to_string(), Json::String(id.to_string()));
        }
        if let Some(version) = version {
            object.insert("version".to_string(), Json::from(version));
        }
        for attribute in metamodel.attributes(&self.inner.type_name)? {
            if !include(attribute.name()) {
                continue;
            }
            let tracker = Tracker::new(&self.inner.state, metamodel, attribute.name());
            let ctx = base.for_attribute(tracker);
            let value = slots.values.get(attribute.name()).unwrap_or(&Value::Null);
            object.insert(
                attribute.name().to_string(),
                attribute.get_database_value(&ctx, value)?,
            );
        }
        if include("acl") {
            object.insert("acl".to_string(), slots.acl.to_json());
        }
        Ok(Json::Object(object))
    }

    fn removed(&self) -> OrmError {
        OrmError::entity_removed(self.to_string())
    }
}

impl PartialEq for Entity {
    /// Same instance, or same type and id.
    fn eq(&self, other: &Self) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        match (self.id(), other.id()) {
            (Some(a), Some(b)) => a == b && self.inner.type_name == other.inner.type_name,
            _ => false,
        }
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("type", &self.inner.type_name)
            .field("id", &self.id())
            .finish()
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ref_path() {
            Some(path) => f.write_str(&path),
            None => write!(f, "{} (unsaved)", self.inner.type_name),
        }
    }
}

/// Non-owning counterpart of [`Entity`].
#[derive(Clone)]
pub struct WeakEntity {
    inner: Weak<EntityInner>,
}

impl WeakEntity {
    /// Returns the entity if it is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<Entity> {
        self.inner.upgrade().map(|inner| Entity { inner })
    }
}

impl fmt::Debug for WeakEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakEntity")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

/// Resolves references outside of a session.
///
/// Each id resolves to one hollow entity per resolver.
pub struct DetachedResolver {
    metamodel: Arc<Metamodel>,
    seen: Mutex<HashMap<EntityId, Entity>>,
}

impl DetachedResolver {
    /// Creates a resolver for the given metamodel.
    #[must_use]
    pub fn new(metamodel: &Arc<Metamodel>) -> Self {
        Self {
            metamodel: Arc::clone(metamodel),
            seen: Mutex::new(HashMap::new()),
        }
    }
}

impl ReferenceResolver for DetachedResolver {
    fn resolve(&self, type_name: &str, id: EntityId) -> OrmResult<Entity> {
        let mut seen = self.seen.lock();
        if let Some(entity) = seen.get(&id) {
            return Ok(entity.clone());
        }
        let entity = Entity::hollow(&self.metamodel, type_name, id)?;
        seen.insert(id, entity.clone());
        Ok(entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metamodel::{Attribute, ManagedType, Type};
    use serde_json::json;

    fn metamodel() -> Arc<Metamodel> {
        let metamodel = Arc::new(Metamodel::new());
        metamodel
            .add_type(
                ManagedType::entity("Person")
                    .with_attribute(Attribute::singular("name", Type::STRING))
                    .unwrap()
                    .with_attribute(Attribute::set("tags", Type::STRING))
                    .unwrap()
                    .with_attribute(Attribute::singular("score", Type::NUMBER))
                    .unwrap()
                    .with_attribute(Attribute::singular("friend", Type::entity("Person")))
                    .unwrap(),
            )
            .unwrap();
        metamodel
    }

    #[test]
    fn new_entity_is_transient_without_id() {
        let metamodel = metamodel();
        let person = Entity::new(&metamodel, "Person").unwrap();
        assert_eq!(person.lifecycle(), Lifecycle::Transient);
        assert!(person.id().is_none());
        assert!(person.get("name").unwrap().is_null());
        assert!(person.get("tags").unwrap().as_set().unwrap().is_empty());
        assert!(matches!(
            Entity::new(&metamodel, "Robot").unwrap_err(),
            OrmError::UnknownType { .. }
        ));
    }

    #[test]
    fn dirty_tracking_is_per_attribute() {
        let metamodel = metamodel();
        let person = Entity::new(&metamodel, "Person").unwrap();
        person.set("name", "Ada").unwrap();
        assert_eq!(person.dirty_attributes(), ["name"]);

        let tags = person.get("tags").unwrap();
        tags.as_set().unwrap().add("math").unwrap();
        assert!(person.is_attribute_dirty("tags"));
        assert!(!person.is_attribute_dirty("friend"));
    }

    #[test]
    fn set_checks_types() {
        let metamodel = metamodel();
        let person = Entity::new(&metamodel, "Person").unwrap();
        assert!(matches!(
            person.set("name", 42).unwrap_err(),
            OrmError::TypeMismatch { .. }
        ));
        assert!(matches!(
            person.set("age", 42).unwrap_err(),
            OrmError::UnknownAttribute { .. }
        ));
        assert!(!person.is_dirty());
    }

    #[test]
    fn collection_elements_are_checked() {
        let metamodel = metamodel();
        let person = Entity::new(&metamodel, "Person").unwrap();
        let tags = person.get("tags").unwrap();
        let err = tags.as_set().unwrap().add(42).unwrap_err();
        assert!(matches!(err, OrmError::TypeMismatch { .. }));
        assert!(!person.is_dirty());

        let foreign = crate::tracked::TrackedSet::new();
        foreign.add(true).unwrap();
        let err = person.set("tags", foreign).unwrap_err();
        assert!(matches!(err, OrmError::TypeMismatch { .. }));
        assert!(!person.is_dirty());
        assert_eq!(person.get("tags").unwrap(), tags);
    }

    #[test]
    fn assigning_foreign_collection_copies_it() {
        let metamodel = metamodel();
        let a = Entity::new(&metamodel, "Person").unwrap();
        let b = Entity::new(&metamodel, "Person").unwrap();
        a.get("tags").unwrap().as_set().unwrap().add("x").unwrap();

        b.set("tags", a.get("tags").unwrap()).unwrap();
        let b_tags = b.get("tags").unwrap();
        assert_ne!(b_tags, a.get("tags").unwrap());

        a.mark_persistent();
        b.mark_persistent();
        b_tags.as_set().unwrap().add("y").unwrap();
        assert!(b.is_attribute_dirty("tags"));
        assert!(!a.is_dirty());
    }

    #[test]
    fn removed_entity_refuses_mutation() {
        let metamodel = metamodel();
        let person = Entity::new(&metamodel, "Person").unwrap();
        let tags = person.get("tags").unwrap();
        person.confirm_delete();

        assert!(matches!(
            person.set("name", "x").unwrap_err(),
            OrmError::EntityRemoved { .. }
        ));
        assert!(tags.as_set().unwrap().add("x").is_err());
    }

    #[test]
    fn prepare_save_assigns_optimistic_id() {
        let metamodel = metamodel();
        let resolver = DetachedResolver::new(&metamodel);
        let config = Config::default();
        let person = Entity::new(&metamodel, "Person").unwrap();
        person.set("name", "Ada").unwrap();

        let (ticket, body) = person.prepare_save(&resolver, &config).unwrap();
        assert!(ticket.insert);
        assert_eq!(person.lifecycle(), Lifecycle::Attached);
        assert_eq!(body["id"], person.id().unwrap().to_string().as_str());
        assert_eq!(body["name"], "Ada");
        assert_eq!(body["tags"], json!([]));
        assert!(body.get("version").is_none());

        assert!(person.confirm_save(1, &ticket));
        assert!(!person.is_dirty());

        person.set("name", "Grace").unwrap();
        let (ticket, body) = person.prepare_save(&resolver, &config).unwrap();
        assert!(!ticket.insert);
        assert_eq!(body["version"], 1);
        assert!(body.get("tags").is_none());
        assert!(body.get("acl").is_none());
    }

    #[test]
    fn failed_serialization_leaves_state_untouched() {
        let metamodel = metamodel();
        let resolver = DetachedResolver::new(&metamodel);
        let config = Config::default();
        let person = Entity::new(&metamodel, "Person").unwrap();
        person.set("score", f64::NAN).unwrap();

        let err = person.prepare_save(&resolver, &config).unwrap_err();
        assert!(matches!(err, OrmError::Conversion { .. }));
        assert_eq!(person.lifecycle(), Lifecycle::Transient);
        assert!(person.id().is_none());
    }

    #[test]
    fn apply_load_reconciles_and_resolves() {
        let metamodel = metamodel();
        let resolver = DetachedResolver::new(&metamodel);
        let config = Config::default();
        let id = EntityId::new();
        let friend_id = EntityId::new();
        let person = Entity::hollow(&metamodel, "Person", id).unwrap();
        let tags = person.get("tags").unwrap();

        let json = json!({
            "id": id.to_string(),
            "version": 3,
            "name": "Ada",
            "tags": ["a", "b"],
            "friend": format_ref("Person", friend_id),
            "acl": {"read": [], "write": []},
        });
        assert!(person.apply_load(&json, 0, &resolver, &config).unwrap());

        assert!(person.is_loaded());
        assert_eq!(person.version(), Some(3));
        assert!(!person.is_dirty());
        assert_eq!(person.get("tags").unwrap(), tags);
        assert_eq!(tags.as_set().unwrap().len(), 2);
        let friend = person.get("friend").unwrap();
        let friend = friend.as_entity().unwrap();
        assert_eq!(friend.id(), Some(friend_id));
        assert!(!friend.is_loaded());

        let older = json!({"version": 2, "name": "Old"});
        assert!(!person.apply_load(&older, 0, &resolver, &config).unwrap());
        assert_eq!(person.get("name").unwrap(), Value::from("Ada"));
    }

    #[test]
    fn apply_load_keeps_attributes_mutated_after_the_mark() {
        let metamodel = metamodel();
        let resolver = DetachedResolver::new(&metamodel);
        let config = Config::default();
        let person = Entity::new(&metamodel, "Person").unwrap();
        person.set("name", "Ada").unwrap();
        person.mark_persistent();
        person.get("tags").unwrap().as_set().unwrap().add("old").unwrap();

        let mark = person.mutation_mark();
        person.set("name", "Grace").unwrap();
        let json = json!({"version": 1, "name": "Ada", "tags": ["x"]});
        assert!(person.apply_load(&json, mark, &resolver, &config).unwrap());

        assert_eq!(person.get("name").unwrap(), Value::from("Grace"));
        assert_eq!(person.dirty_attributes(), ["name"]);
        let tags = person.get("tags").unwrap();
        assert!(tags.as_set().unwrap().has(&Value::from("x")));
        assert_eq!(tags.as_set().unwrap().len(), 1);
    }

    #[test]
    fn json_export_and_import() {
        let metamodel = metamodel();
        let person = Entity::new(&metamodel, "Person").unwrap();
        person.set("name", "Ada").unwrap();
        person.mark_persistent();

        let exported = person.to_json().unwrap();
        assert_eq!(exported["name"], "Ada");
        assert_eq!(exported["acl"], json!({"read": [], "write": []}));

        let imported = Entity::from_json(&metamodel, "Person", &exported).unwrap();
        assert_eq!(imported, person);
        assert!(!imported.ptr_eq(&person));
        assert_eq!(imported.lifecycle(), Lifecycle::Transient);
        assert!(imported.is_attribute_dirty("name"));

        let versioned = json!({"id": person.id().unwrap().to_string(), "version": 4, "name": "Ada"});
        let loaded = Entity::from_json(&metamodel, "Person", &versioned).unwrap();
        assert!(loaded.lifecycle().is_persistent());
        assert!(!loaded.is_dirty());
    }

    #[test]
    fn equality_by_identity_or_id() {
        let metamodel = metamodel();
        let a = Entity::new(&metamodel, "Person").unwrap();
        let b = Entity::new(&metamodel, "Person").unwrap();
        assert_eq!(a, a.clone());
        assert_ne!(a, b);

        let id = EntityId::new();
        let c = Entity::hollow(&metamodel, "Person", id).unwrap();
        let d = Entity::hollow(&metamodel, "Person", id).unwrap();
        assert_eq!(c, d);
        assert_eq!(c.to_string(), format_ref("Person", id));
    }

    #[test]
    fn weak_handles() {
        let metamodel = metamodel();
        let person = Entity::new(&metamodel, "Person").unwrap();
        let weak = person.downgrade();
        assert!(weak.upgrade().unwrap().ptr_eq(&person));
        drop(person);
        assert!(weak.upgrade().is_none());
    }
}
