//! In-memory document server.
//!
//! [`MemoryServer`] answers the REST calls of the object mapper directly
//! from memory, so sessions can be exercised end to end without a network.
//!
//! | request | behavior |
//! |---------|----------|
//! | `GET /version` | `200 {"version": ..}` |
//! | `GET /schema` | `200` stored type documents |
//! | `POST /schema` | stores unknown documents, `200` full list |
//! | `POST /db/T` | `409` if the id exists, else stored at version 1 |
//! | `PUT /db/T/id` | merges the partial body, bumps the version |
//! | `GET /db/T/id` | `200` document or `404` |
//! | `DELETE /db/T/id` | `204` or `404` |

use orestes_core::{EntityId, Method, OrmError, OrmResult, Request, Response, Transport};
use parking_lot::Mutex;
use serde_json::{json, Map as JsonMap, Value as Json};
use std::collections::{BTreeMap, VecDeque};
use std::future::Future;
use tracing::debug;

/// Version reported by `GET /version`.
pub const SERVER_VERSION: &str = "orestes-memory/1";

/// A fault injected before the next request is handled.
#[derive(Debug, Clone)]
enum Fault {
    Status(u16),
    Transport(String),
}

/// Key of a stored object: type name and id.
type ObjectKey = (String, String);

/// A document database held in memory.
#[derive(Debug)]
pub struct MemoryServer {
    base_path: String,
    schema: Mutex<Vec<Json>>,
    objects: Mutex<BTreeMap<ObjectKey, JsonMap<String, Json>>>,
    faults: Mutex<VecDeque<Fault>>,
    requests: Mutex<Vec<Request>>,
}

impl Default for MemoryServer {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryServer {
    /// Creates an empty server serving objects under `/db`.
    pub fn new() -> Self {
        Self::with_base_path("/db")
    }

    /// Creates an empty server serving objects under `base_path`.
    pub fn with_base_path(base_path: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into().trim_end_matches('/').to_string(),
            schema: Mutex::new(Vec::new()),
            objects: Mutex::new(BTreeMap::new()),
            faults: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Preloads type documents, as if another client had posted them.
    #[must_use]
    pub fn with_schema(self, documents: Json) -> Self {
        if let Json::Array(documents) = documents {
            self.schema.lock().extend(documents);
        }
        self
    }

    /// Stores an object directly. Missing `id` and `version` are filled in.
    ///
    /// Returns the id.
    pub fn seed(&self, type_name: &str, document: Json) -> EntityId {
        let mut object = match document {
            Json::Object(object) => object,
            _ => JsonMap::new(),
        };
        let id = object
            .get("id")
            .and_then(Json::as_str)
            .and_then(EntityId::parse)
            .unwrap_or_default();
        object.insert("id".to_string(), Json::String(id.to_string()));
        object.entry("version").or_insert(json!(1));
        self.objects
            .lock()
            .insert((type_name.to_string(), id.to_string()), object);
        id
    }

    /// The stored document of an object.
    pub fn object(&self, type_name: &str, id: EntityId) -> Option<Json> {
        self.objects
            .lock()
            .get(&(type_name.to_string(), id.to_string()))
            .cloned()
            .map(Json::Object)
    }

    /// Number of stored objects.
    pub fn object_count(&self) -> usize {
        self.objects.lock().len()
    }

    /// Stored type documents.
    pub fn schema(&self) -> Json {
        Json::Array(self.schema.lock().clone())
    }

    /// Requests received so far, in arrival order.
    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().clone()
    }

    /// Answers the next request with `status` without handling it.
    pub fn fail_next_with_status(&self, status: u16) {
        self.faults.lock().push_back(Fault::Status(status));
    }

    /// Fails the next request at the transport level.
    pub fn fail_next_with_transport_error(&self, message: impl Into<String>) {
        self.faults.lock().push_back(Fault::Transport(message.into()));
    }

    /// Handles one request.
    pub fn handle(&self, request: Request) -> OrmResult<Response> {
        self.requests.lock().push(request.clone());
        if let Some(fault) = self.faults.lock().pop_front() {
            debug!(%request, ?fault, "injected fault");
            return match fault {
                Fault::Status(status) => Ok(Response::new(status, json!({"message": "injected"}))),
                Fault::Transport(message) => Err(OrmError::transport(message)),
            };
        }

        let response = match (request.method, request.path.as_str()) {
            (Method::Get, "/version") => Response::ok(json!({ "version": SERVER_VERSION })),
            (Method::Get, "/schema") => Response::ok(self.schema()),
            (Method::Post, "/schema") => self.post_schema(request.body.as_ref()),
            (method, path) => match self.object_path(path) {
                Some((type_name, None)) if method == Method::Post => {
                    self.insert(type_name, request.body.as_ref())
                }
                Some((type_name, Some(id))) => match method {
                    Method::Get => self.get(type_name, id),
                    Method::Put => self.update(type_name, id, request.body.as_ref()),
                    Method::Delete => self.delete(type_name, id),
                    Method::Post => error(405, "method not allowed"),
                },
                _ => error(404, "no such resource"),
            },
        };
        debug!(%request, status = response.status, "handled");
        Ok(response)
    }

    fn object_path<'a>(&self, path: &'a str) -> Option<(&'a str, Option<&'a str>)> {
        let rest = path.strip_prefix(self.base_path.as_str())?.strip_prefix('/')?;
        match rest.split_once('/') {
            Some((type_name, id)) if !type_name.is_empty() && !id.is_empty() => {
                Some((type_name, Some(id)))
            }
            Some(_) => None,
            None if rest.is_empty() => None,
            None => Some((rest, None)),
        }
    }

    fn post_schema(&self, body: Option<&Json>) -> Response {
        let Some(Json::Array(documents)) = body else {
            return error(400, "schema must be a list");
        };
        let mut schema = self.schema.lock();
        for document in documents {
            let class = document.get("class");
            if !schema.iter().any(|known| known.get("class") == class) {
                schema.push(document.clone());
            }
        }
        Response::ok(Json::Array(schema.clone()))
    }

    fn insert(&self, type_name: &str, body: Option<&Json>) -> Response {
        let Some(Json::Object(body)) = body else {
            return error(400, "object body required");
        };
        let id = match body.get("id").and_then(Json::as_str) {
            Some(text) => match EntityId::parse(text) {
                Some(id) => id,
                None => return error(400, "invalid id"),
            },
            None => EntityId::new(),
        };

        let mut objects = self.objects.lock();
        let key = (type_name.to_string(), id.to_string());
        if objects.contains_key(&key) {
            return error(409, "object already exists");
        }
        let mut object = body.clone();
        object.insert("id".to_string(), Json::String(id.to_string()));
        object.insert("version".to_string(), json!(1));
        objects.insert(key, object);
        Response::ok(json!({ "id": id.to_string(), "version": 1 }))
    }

    fn update(&self, type_name: &str, id: &str, body: Option<&Json>) -> Response {
        let Some(Json::Object(body)) = body else {
            return error(400, "object body required");
        };
        let mut objects = self.objects.lock();
        let object = objects
            .entry((type_name.to_string(), id.to_string()))
            .or_default();
        let version = object.get("version").and_then(Json::as_u64).unwrap_or(0) + 1;
        for (name, value) in body {
            object.insert(name.clone(), value.clone());
        }
        object.insert("id".to_string(), Json::String(id.to_string()));
        object.insert("version".to_string(), json!(version));
        Response::ok(json!({ "id": id, "version": version }))
    }

    fn get(&self, type_name: &str, id: &str) -> Response {
        match self.objects.lock().get(&(type_name.to_string(), id.to_string())) {
            Some(object) => Response::ok(Json::Object(object.clone())),
            None => error(404, "object not found"),
        }
    }

    fn delete(&self, type_name: &str, id: &str) -> Response {
        match self.objects.lock().remove(&(type_name.to_string(), id.to_string())) {
            Some(_) => Response::status(204),
            None => error(404, "object not found"),
        }
    }
}

fn error(status: u16, message: &str) -> Response {
    Response::new(status, json!({ "message": message }))
}

impl Transport for MemoryServer {
    fn send(&self, request: Request) -> impl Future<Output = OrmResult<Response>> + Send {
        std::future::ready(self.handle(request))
    }
}
