//! Bootstrap of the shared metamodel and session creation.

use super::message;
use super::session::EntityManager;
use crate::config::Config;
use crate::error::{OrmError, OrmResult};
use crate::metamodel::{ManagedType, Metamodel, SchemaDocument};
use crate::transport::Transport;
use serde_json::Value as Json;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Owns the metamodel and transport shared by all sessions.
pub struct EntityManagerFactory<T: Transport> {
    transport: Arc<T>,
    metamodel: Arc<Metamodel>,
    config: Arc<Config>,
}

impl<T: Transport> EntityManagerFactory<T> {
    /// Connects to the server and bootstraps the metamodel.
    ///
    /// Fetches the server schema, posts the `defined` types the server does
    /// not know yet and registers every type. Locally defined types take
    /// precedence over server types of the same name. The metamodel is
    /// sealed afterwards unless the configuration says otherwise.
    pub async fn connect(
        transport: Arc<T>,
        config: Config,
        defined: Vec<ManagedType>,
    ) -> OrmResult<Self> {
        let request = message::get_all_schemas();
        let summary = request.to_string();
        debug!(request = %summary, "fetching schema");
        let response = transport.send(request).await?;
        let mut schema = message::expect_status(&summary, response, &[200])?.body;

        let known: BTreeSet<String> = documents(&schema)?
            .into_iter()
            .map(|document| document.class)
            .collect();
        let missing: Vec<SchemaDocument> = defined
            .iter()
            .filter(|t| !known.contains(t.name()))
            .map(SchemaDocument::from_type)
            .collect();

        if !missing.is_empty() {
            let names: Vec<&str> = missing.iter().map(|d| d.class.as_str()).collect();
            info!(types = ?names, "posting schema for new types");
            let request = message::post_all_schemas(serde_json::to_value(&missing)?);
            let summary = request.to_string();
            let response = transport.send(request).await?;
            schema = message::expect_status(&summary, response, &[200, 201])?.body;
        }

        let metamodel = Metamodel::new();
        for managed_type in defined {
            metamodel.add_type(managed_type)?;
        }
        let added = metamodel.register_schema(&schema)?;
        debug!(server_types = added.len(), "schema registered");

        Ok(Self::assemble(transport, metamodel, config))
    }

    /// Builds a factory from local type definitions without contacting the
    /// server.
    pub fn offline(transport: Arc<T>, config: Config, defined: Vec<ManagedType>) -> OrmResult<Self> {
        let metamodel = Metamodel::new();
        for managed_type in defined {
            metamodel.add_type(managed_type)?;
        }
        Ok(Self::assemble(transport, metamodel, config))
    }

    fn assemble(transport: Arc<T>, metamodel: Metamodel, config: Config) -> Self {
        if config.seal_metamodel {
            metamodel.seal();
        }
        info!(
            types = metamodel.types().len(),
            sealed = metamodel.is_sealed(),
            "entity manager factory ready"
        );
        Self {
            transport,
            metamodel: Arc::new(metamodel),
            config: Arc::new(config),
        }
    }

    /// Opens a session with an empty identity map.
    pub fn create_entity_manager(&self) -> EntityManager<T> {
        EntityManager::new(
            Arc::clone(&self.transport),
            Arc::clone(&self.metamodel),
            Arc::clone(&self.config),
        )
    }

    /// Asks the server for its API version.
    pub async fn api_version(&self) -> OrmResult<Json> {
        let request = message::api_version();
        let summary = request.to_string();
        let response = self.transport.send(request).await?;
        Ok(message::expect_status(&summary, response, &[200])?.body)
    }

    /// The shared metamodel.
    pub fn metamodel(&self) -> &Arc<Metamodel> {
        &self.metamodel
    }

    /// The shared configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The shared transport.
    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }
}

fn documents(schema: &Json) -> OrmResult<Vec<SchemaDocument>> {
    serde_json::from_value(schema.clone()).map_err(|e| OrmError::invalid_schema(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metamodel::{Attribute, Type};
    use crate::transport::{Method, MockTransport, Response};
    use serde_json::json;

    fn person() -> ManagedType {
        ManagedType::entity("Person")
            .with_attribute(Attribute::singular("name", Type::STRING))
            .unwrap()
    }

    #[tokio::test]
    async fn connect_posts_missing_types() {
        let transport = Arc::new(MockTransport::new());
        let server = json!([{"class": "Role", "fields": [{"name": "title", "type": "String"}]}]);
        transport.push_response(Response::ok(server));
        transport.push_response(Response::ok(json!([
            {"class": "Role", "fields": [{"name": "title", "type": "String"}]},
            {"class": "Person", "fields": [{"name": "name", "type": "String"}]},
        ])));

        let factory = EntityManagerFactory::connect(Arc::clone(&transport), Config::default(), vec![person()])
            .await
            .unwrap();

        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].method, Method::Post);
        assert_eq!(requests[1].path, "/schema");
        assert_eq!(requests[1].body.as_ref().unwrap()[0]["class"], "Person");

        let metamodel = factory.metamodel();
        assert!(metamodel.entity("Person").is_some());
        assert!(metamodel.entity("Role").is_some());
        assert!(metamodel.is_sealed());
    }

    #[tokio::test]
    async fn connect_skips_post_when_server_knows_everything() {
        let transport = Arc::new(MockTransport::new());
        transport.push_response(Response::ok(json!([
            {"class": "Person", "fields": [{"name": "nickname", "type": "String"}]},
        ])));

        let factory = EntityManagerFactory::connect(
            Arc::clone(&transport),
            Config::default().seal_metamodel(false),
            vec![person()],
        )
        .await
        .unwrap();

        assert_eq!(transport.requests().len(), 1);
        let metamodel = factory.metamodel();
        assert!(!metamodel.is_sealed());
        assert!(metamodel.attribute("Person", "name").is_ok());
        assert!(metamodel.attribute("Person", "nickname").is_err());
    }

    #[tokio::test]
    async fn connect_fails_on_unreachable_server() {
        let transport = Arc::new(MockTransport::new());
        transport.push_response(Response::status(503));
        let result = EntityManagerFactory::connect(transport, Config::default(), vec![]).await;
        assert!(matches!(result, Err(OrmError::Communication { status: 503, .. })));
    }

    #[tokio::test]
    async fn api_version_requires_ok() {
        let transport = Arc::new(MockTransport::new());
        let factory = EntityManagerFactory::offline(Arc::clone(&transport), Config::default(), vec![person()])
            .unwrap();

        transport.push_response(Response::ok(json!({"version": "2.1"})));
        assert_eq!(factory.api_version().await.unwrap()["version"], "2.1");

        transport.push_response(Response::status(500));
        assert!(factory.api_version().await.unwrap_err().is_communication());
    }

    #[test]
    fn sessions_share_the_metamodel() {
        let factory =
            EntityManagerFactory::offline(Arc::new(MockTransport::new()), Config::default(), vec![person()])
                .unwrap();
        let first = factory.create_entity_manager();
        let second = factory.create_entity_manager();
        assert!(Arc::ptr_eq(first.metamodel(), second.metamodel()));

        let entity = first.create("Person").unwrap();
        assert!(!second.contains(&entity));
        assert!(matches!(
            factory.metamodel().add_type(ManagedType::entity("Late")),
            Err(OrmError::MetamodelSealed)
        ));
    }
}
