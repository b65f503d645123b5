//! Transport layer abstraction.
//!
//! The runtime never talks HTTP itself. Every round trip goes through a
//! [`Transport`], which lets applications plug in their HTTP client and
//! tests plug in an in-memory server.

use crate::error::{OrmError, OrmResult};
use parking_lot::Mutex;
use serde_json::Value as Json;
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;

/// HTTP method of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// `GET`
    Get,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `DELETE`
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        })
    }
}

/// A request to the server.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// HTTP method.
    pub method: Method,
    /// Path below the server root, e.g. `/db/Person/<id>`.
    pub path: String,
    /// JSON body.
    pub body: Option<Json>,
}

impl Request {
    /// Creates a request without body.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
        }
    }

    /// `GET path`.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    /// `POST path` with a body.
    pub fn post(path: impl Into<String>, body: Json) -> Self {
        Self::new(Method::Post, path).with_body(body)
    }

    /// `PUT path` with a body.
    pub fn put(path: impl Into<String>, body: Json) -> Self {
        Self::new(Method::Put, path).with_body(body)
    }

    /// `DELETE path`.
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    /// Attaches a body.
    #[must_use]
    pub fn with_body(mut self, body: Json) -> Self {
        self.body = Some(body);
        self
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

/// A response from the server.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// HTTP status code.
    pub status: u16,
    /// JSON body, `Null` if there was none.
    pub body: Json,
}

impl Response {
    /// Creates a response.
    pub fn new(status: u16, body: Json) -> Self {
        Self { status, body }
    }

    /// `200 OK` with a body.
    pub fn ok(body: Json) -> Self {
        Self::new(200, body)
    }

    /// A response without body.
    pub fn status(status: u16) -> Self {
        Self::new(status, Json::Null)
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Carries requests to the server.
///
/// Implementations may complete requests in any order. A transport-level
/// failure is reported as [`OrmError::Transport`]; non-success statuses are
/// returned as responses and interpreted by the caller.
pub trait Transport: Send + Sync {
    /// Sends a request and waits for its response.
    fn send(&self, request: Request) -> impl Future<Output = OrmResult<Response>> + Send;
}

impl<T: Transport> Transport for std::sync::Arc<T> {
    fn send(&self, request: Request) -> impl Future<Output = OrmResult<Response>> + Send {
        (**self).send(request)
    }
}

/// A queued reply of [`MockTransport`].
#[derive(Debug, Clone)]
enum MockReply {
    Respond(Response),
    Fail(String),
}

/// A transport answering from a queue of canned replies.
///
/// Requests are recorded for inspection. An empty queue fails the request
/// with a transport error.
#[derive(Debug, Default)]
pub struct MockTransport {
    replies: Mutex<VecDeque<MockReply>>,
    requests: Mutex<Vec<Request>>,
}

impl MockTransport {
    /// Creates a mock transport with no replies queued.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a response.
    pub fn push_response(&self, response: Response) {
        self.replies.lock().push_back(MockReply::Respond(response));
    }

    /// Queues a transport failure.
    pub fn push_failure(&self, message: impl Into<String>) {
        self.replies.lock().push_back(MockReply::Fail(message.into()));
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().clone()
    }

    /// The most recent request.
    pub fn last_request(&self) -> Option<Request> {
        self.requests.lock().last().cloned()
    }
}

impl Transport for MockTransport {
    fn send(&self, request: Request) -> impl Future<Output = OrmResult<Response>> + Send {
        let summary = request.to_string();
        self.requests.lock().push(request);
        let reply = match self.replies.lock().pop_front() {
            Some(MockReply::Respond(response)) => Ok(response),
            Some(MockReply::Fail(message)) => Err(OrmError::transport(message)),
            None => Err(OrmError::transport(format!("no mock response for {summary}"))),
        };
        std::future::ready(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn mock_transport_replays_in_order() {
        let transport = MockTransport::new();
        transport.push_response(Response::ok(json!({"v": 1})));
        transport.push_failure("connection reset");

        let first = transport.send(Request::get("/version")).await.unwrap();
        assert_eq!(first.body["v"], 1);

        let err = transport.send(Request::delete("/db/A/1")).await.unwrap_err();
        assert!(err.is_communication());

        let err = transport.send(Request::get("/schema")).await.unwrap_err();
        assert!(err.to_string().contains("GET /schema"));

        assert_eq!(transport.requests().len(), 3);
        assert_eq!(transport.last_request().unwrap().path, "/schema");
    }

    #[test]
    fn response_status() {
        assert!(Response::status(204).is_success());
        assert!(!Response::status(404).is_success());
        assert_eq!(
            Request::put("/db/A/1", json!({})).to_string(),
            "PUT /db/A/1"
        );
    }
}
