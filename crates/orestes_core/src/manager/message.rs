//! Request construction and response interpretation for each REST call.

use crate::config::Config;
use crate::entity::EntityId;
use crate::error::{OrmError, OrmResult};
use crate::transport::{Request, Response};
use serde_json::Value as Json;

/// `GET /version`.
pub(crate) fn api_version() -> Request {
    Request::get("/version")
}

/// `GET /schema`.
pub(crate) fn get_all_schemas() -> Request {
    Request::get("/schema")
}

/// `POST /schema` with the documents the server lacks.
pub(crate) fn post_all_schemas(documents: Json) -> Request {
    Request::post("/schema", documents)
}

/// `POST /db/<Type>`: first save of a transient entity.
pub(crate) fn insert_object(config: &Config, type_name: &str, body: Json) -> Request {
    Request::post(type_path(config, type_name), body)
}

/// `PUT /db/<Type>/<id>`.
pub(crate) fn update_object(config: &Config, type_name: &str, id: EntityId, body: Json) -> Request {
    Request::put(object_path(config, type_name, id), body)
}

/// `GET /db/<Type>/<id>`.
pub(crate) fn get_object(config: &Config, type_name: &str, id: EntityId) -> Request {
    Request::get(object_path(config, type_name, id))
}

/// `DELETE /db/<Type>/<id>`.
pub(crate) fn delete_object(config: &Config, type_name: &str, id: EntityId) -> Request {
    Request::delete(object_path(config, type_name, id))
}

fn type_path(config: &Config, type_name: &str) -> String {
    format!("{}/{type_name}", config.base_path.trim_end_matches('/'))
}

fn object_path(config: &Config, type_name: &str, id: EntityId) -> String {
    format!("{}/{id}", type_path(config, type_name))
}

/// Fails with `Communication` unless the status is one of `accepted`.
pub(crate) fn expect_status(summary: &str, response: Response, accepted: &[u16]) -> OrmResult<Response> {
    if accepted.contains(&response.status) {
        return Ok(response);
    }
    let detail = response
        .body
        .get("message")
        .and_then(Json::as_str)
        .map(|m| format!(": {m}"))
        .unwrap_or_default();
    Err(OrmError::communication(response.status, format!("{summary}{detail}")))
}

/// Reads the version from a save acknowledgement `{id, version}`.
pub(crate) fn ack_version(summary: &str, body: &Json) -> OrmResult<u64> {
    body.get("version")
        .and_then(Json::as_u64)
        .ok_or_else(|| OrmError::conversion(format!("{summary}: acknowledgement carries no version")))
}
