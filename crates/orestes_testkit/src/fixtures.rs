//! Test fixtures: a small domain model and ready-made sessions.
//!
//! The model:
//!
//! ```text
//! Person   { name: String, age: Number, born: Date, tags: Set<String>,
//!            nicknames: List<String>, scores: Map<String,Number>,
//!            address: Address, friends: List<Person>,
//!            ratings: Map<Person,Number> }
//! Employee : Person { company: String }
//! Address  (embeddable) { street: String, city: String }
//! User     { username: String }
//! Role     { title: String, members: Set<User> }
//! ```

use crate::manual::ManualTransport;
use crate::server::MemoryServer;
use orestes_core::{
    Attribute, Config, EntityManager, EntityManagerFactory, ManagedType, Metamodel, OrmResult,
    Type,
};
use std::sync::Arc;

/// The `Address` embeddable.
pub fn address_type() -> OrmResult<ManagedType> {
    ManagedType::embeddable("Address")
        .with_attribute(Attribute::singular("street", Type::STRING))?
        .with_attribute(Attribute::singular("city", Type::STRING))
}

/// The `Person` entity.
pub fn person_type() -> OrmResult<ManagedType> {
    ManagedType::entity("Person")
        .with_attribute(Attribute::singular("name", Type::STRING))?
        .with_attribute(Attribute::singular("age", Type::NUMBER))?
        .with_attribute(Attribute::singular("born", Type::DATE))?
        .with_attribute(Attribute::set("tags", Type::STRING))?
        .with_attribute(Attribute::list("nicknames", Type::STRING))?
        .with_attribute(Attribute::map("scores", Type::STRING, Type::NUMBER))?
        .with_attribute(Attribute::singular("address", Type::embeddable("Address")))?
        .with_attribute(Attribute::list("friends", Type::entity("Person")))?
        .with_attribute(Attribute::map("ratings", Type::entity("Person"), Type::NUMBER))
}

/// The `Employee` entity, a subtype of `Person`.
pub fn employee_type() -> OrmResult<ManagedType> {
    ManagedType::entity("Employee")
        .with_supertype("Person")
        .with_attribute(Attribute::singular("company", Type::STRING))
}

/// The `User` entity, used as ACL principal.
pub fn user_type() -> OrmResult<ManagedType> {
    ManagedType::entity("User").with_attribute(Attribute::singular("username", Type::STRING))
}

/// The `Role` entity, used as ACL principal.
pub fn role_type() -> OrmResult<ManagedType> {
    ManagedType::entity("Role")
        .with_attribute(Attribute::singular("title", Type::STRING))?
        .with_attribute(Attribute::set("members", Type::entity("User")))
}

/// Every fixture type, supertypes first.
pub fn fixture_types() -> OrmResult<Vec<ManagedType>> {
    Ok(vec![
        address_type()?,
        person_type()?,
        employee_type()?,
        user_type()?,
        role_type()?,
    ])
}

/// An unsealed metamodel holding the fixture types.
pub fn fixture_metamodel() -> OrmResult<Arc<Metamodel>> {
    let metamodel = Metamodel::new();
    for managed_type in fixture_types()? {
        metamodel.add_type(managed_type)?;
    }
    Ok(Arc::new(metamodel))
}

/// A factory bootstrapped against a fresh [`MemoryServer`].
pub async fn memory_factory(
    config: Config,
) -> OrmResult<(Arc<MemoryServer>, EntityManagerFactory<MemoryServer>)> {
    let server = Arc::new(MemoryServer::with_base_path(config.base_path.clone()));
    let factory = EntityManagerFactory::connect(Arc::clone(&server), config, fixture_types()?).await?;
    Ok((server, factory))
}

/// A session over a fresh [`MemoryServer`] with default configuration.
pub async fn memory_session() -> OrmResult<(Arc<MemoryServer>, EntityManager<MemoryServer>)> {
    let (server, factory) = memory_factory(Config::default()).await?;
    Ok((server, factory.create_entity_manager()))
}

/// A session over a [`ManualTransport`], bootstrapped offline.
pub fn manual_session() -> OrmResult<(Arc<ManualTransport>, EntityManager<ManualTransport>)> {
    let transport = Arc::new(ManualTransport::new());
    let factory =
        EntityManagerFactory::offline(Arc::clone(&transport), Config::default(), fixture_types()?)?;
    Ok((transport, factory.create_entity_manager()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixture_model_is_consistent() {
        let metamodel = fixture_metamodel().unwrap();
        assert!(metamodel.is_assignable("Employee", "Person"));
        assert!(metamodel.embeddable("Address").is_some());
        let names: Vec<String> = metamodel
            .attributes("Employee")
            .unwrap()
            .iter()
            .map(|a| a.name().to_string())
            .collect();
        assert_eq!(names.first().map(String::as_str), Some("name"));
        assert_eq!(names.last().map(String::as_str), Some("company"));
    }

    #[tokio::test]
    async fn memory_factory_posts_the_model() {
        let (server, factory) = memory_factory(Config::default()).await.unwrap();
        assert_eq!(server.schema().as_array().unwrap().len(), 5);
        assert!(factory.metamodel().is_sealed());
    }
}
