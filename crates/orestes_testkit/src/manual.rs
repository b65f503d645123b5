//! A transport whose responses are released by the test.
//!
//! Every request sent through [`ManualTransport`] parks until the test
//! answers it. Answering pending requests in a different order than they
//! were sent reproduces out-of-order network completion deterministically.

use orestes_core::{OrmError, OrmResult, Request, Response, Transport};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use tokio::sync::{oneshot, Notify};

/// A request waiting for its response.
#[derive(Debug)]
pub struct PendingRequest {
    request: Request,
    reply: oneshot::Sender<OrmResult<Response>>,
}

impl PendingRequest {
    /// The parked request.
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Completes the request with `response`.
    pub fn respond(self, response: Response) {
        // The sender may have been dropped with its future; nothing to do then.
        let _ = self.reply.send(Ok(response));
    }

    /// Fails the request at the transport level.
    pub fn fail(self, message: impl Into<String>) {
        let _ = self.reply.send(Err(OrmError::transport(message)));
    }
}

/// Transport that parks requests until the test answers them.
#[derive(Debug, Default)]
pub struct ManualTransport {
    pending: Mutex<VecDeque<PendingRequest>>,
    arrived: Notify,
}

impl ManualTransport {
    /// Creates a transport with nothing pending.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of requests waiting for an answer.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Takes the oldest pending request, if any.
    pub fn try_next(&self) -> Option<PendingRequest> {
        self.pending.lock().pop_front()
    }

    /// Waits for the next request to arrive and takes it.
    pub async fn next_request(&self) -> PendingRequest {
        loop {
            if let Some(pending) = self.try_next() {
                return pending;
            }
            self.arrived.notified().await;
        }
    }
}

impl Transport for ManualTransport {
    fn send(&self, request: Request) -> impl Future<Output = OrmResult<Response>> + Send {
        let (reply, response) = oneshot::channel();
        self.pending.lock().push_back(PendingRequest { request, reply });
        self.arrived.notify_one();
        async move {
            response
                .await
                .map_err(|_| OrmError::transport("request abandoned by the test"))?
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn responses_complete_in_any_order() {
        let transport = Arc::new(ManualTransport::new());

        let first = tokio::spawn({
            let transport = Arc::clone(&transport);
            async move { transport.send(Request::get("/first")).await }
        });
        let a = transport.next_request().await;
        let second = tokio::spawn({
            let transport = Arc::clone(&transport);
            async move { transport.send(Request::get("/second")).await }
        });
        let b = transport.next_request().await;
        assert_eq!(a.request().path, "/first");
        assert_eq!(b.request().path, "/second");

        b.respond(Response::ok(json!(2)));
        assert_eq!(second.await.unwrap().unwrap().body, json!(2));
        a.fail("reset");
        assert!(first.await.unwrap().is_err());
        assert_eq!(transport.pending_count(), 0);
    }

    #[tokio::test]
    async fn dropped_request_is_an_error() {
        let transport = ManualTransport::new();
        let future = transport.send(Request::get("/version"));
        drop(transport.try_next());
        assert!(future.await.unwrap_err().is_communication());
    }
}
