//! Server-sent-events sessions.
//!
//! Each SSE connection owns a session: an inbound queue of raw JSON-RPC
//! messages POSTed by the client, a worker task that handles them one at
//! a time, and an outbound queue drained into the event stream.  The
//! session is unregistered when the event stream is dropped.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex, PoisonError};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures_core::Stream;
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::mcp::McpServer;

const QUEUE_DEPTH: usize = 64;

/// Path clients POST session messages to.
pub(crate) fn endpoint_for(id: Uuid) -> String {
    format!("/mcp?sessionId={id}")
}

/// Live sessions, keyed by id.
#[derive(Clone, Default)]
pub(crate) struct SessionRegistry {
    inner: Arc<Mutex<HashMap<Uuid, mpsc::Sender<String>>>>,
}

impl SessionRegistry {
    /// Register a session and spawn its worker.  Returns the id, the
    /// outbound receiver, and a guard that unregisters on drop.
    pub(crate) fn open(&self, mcp: McpServer) -> (Uuid, mpsc::Receiver<String>, SessionGuard) {
        let id = Uuid::new_v4();
        let (inbound_tx, mut inbound_rx) = mpsc::channel::<String>(QUEUE_DEPTH);
        let (outbound_tx, outbound_rx) = mpsc::channel::<String>(QUEUE_DEPTH);

        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, inbound_tx);

        tokio::spawn(async move {
            while let Some(text) = inbound_rx.recv().await {
                let Some(reply) = mcp.handle_text(&text).await else {
                    continue;
                };
                if outbound_tx.send(reply).await.is_err() {
                    break;
                }
            }
            debug!(session = %id, "session worker stopped");
        });

        let guard = SessionGuard {
            id,
            registry: self.clone(),
        };
        (id, outbound_rx, guard)
    }

    pub(crate) fn sender(&self, id: &Uuid) -> Option<mpsc::Sender<String>> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    fn remove(&self, id: &Uuid) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Unregisters its session when dropped.
pub(crate) struct SessionGuard {
    id: Uuid,
    registry: SessionRegistry,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.registry.remove(&self.id);
        info!(session = %self.id, "SSE session closed");
    }
}

/// Event stream for a freshly opened session: one `endpoint` event naming
/// the POST URL, then one `message` event per response.
pub(crate) fn session_stream(
    id: Uuid,
    mut outbound: mpsc::Receiver<String>,
    guard: SessionGuard,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = async_stream::stream! {
        let _guard = guard;
        yield Ok(Event::default().event("endpoint").data(endpoint_for(id)));
        while let Some(message) = outbound.recv().await {
            yield Ok(Event::default().event("message").data(message));
        }
    };
    Sse::new(stream).keep_alive(KeepAlive::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::testing;

    #[tokio::test]
    async fn worker_answers_in_arrival_order() {
        let registry = SessionRegistry::default();
        let (id, mut outbound, _guard) = registry.open(testing::server());
        let tx = registry.sender(&id).unwrap();

        for n in 1..=3 {
            tx.send(format!(r#"{{"jsonrpc":"2.0","id":{n},"method":"ping"}}"#))
                .await
                .unwrap();
        }
        for n in 1..=3 {
            let reply: serde_json::Value =
                serde_json::from_str(&outbound.recv().await.unwrap()).unwrap();
            assert_eq!(reply["id"], n);
        }
    }

    #[tokio::test]
    async fn dropping_the_guard_unregisters() {
        let registry = SessionRegistry::default();
        let (id, _outbound, guard) = registry.open(testing::server());
        assert_eq!(registry.len(), 1);
        drop(guard);
        assert!(registry.sender(&id).is_none());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn endpoint_carries_session_id() {
        let id = Uuid::nil();
        assert_eq!(
            endpoint_for(id),
            "/mcp?sessionId=00000000-0000-0000-0000-000000000000"
        );
    }
}
