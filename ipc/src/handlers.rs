use crate::envelope::{CorrelationId, Envelope};
use crate::errors::BusError;
use crate::transport::Transport;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

/// Produces the reply for an unsolicited inbound request of one message type.
///
/// The bus runs each invocation as its own task, so a handler may take as long
/// as it needs (spawn processes, touch the filesystem) before answering
/// through `reply`. A handler that never answers leaves the caller waiting.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    async fn handle(&self, detail: Value, reply: Reply);
}

#[async_trait]
impl<F, Fut> Handler for F
where
    F: Fn(Value, Reply) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    async fn handle(&self, detail: Value, reply: Reply) {
        (self)(detail, reply).await
    }
}

/// Answer handle for one inbound request.
///
/// Using it consumes it, so a request gets at most one reply.
pub struct Reply {
    id: CorrelationId,
    kind: String,
    transport: Option<Arc<dyn Transport>>,
}

impl Reply {
    pub(crate) fn new(id: CorrelationId, kind: String, transport: Arc<dyn Transport>) -> Self {
        Self {
            id,
            kind,
            transport: Some(transport),
        }
    }

    pub fn id(&self) -> &CorrelationId {
        &self.id
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Sends `{id, type, detail}` back to the requester.
    pub async fn send(mut self, detail: Value) -> Result<(), BusError> {
        let Some(transport) = self.transport.take() else {
            return Ok(());
        };
        let envelope = Envelope::new(self.id.clone(), self.kind.clone(), detail);
        debug!(id = %self.id, kind = %self.kind, "Sending reply");
        transport.send_envelope(envelope).await?;
        Ok(())
    }

    /// Replies with a `null` detail.
    pub async fn ack(self) -> Result<(), BusError> {
        self.send(Value::Null).await
    }
}

impl Drop for Reply {
    fn drop(&mut self) {
        if self.transport.is_some() {
            warn!(id = %self.id, kind = %self.kind, "Request dropped without a reply; the caller will keep waiting");
        }
    }
}

impl fmt::Debug for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reply")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("answered", &self.transport.is_none())
            .finish()
    }
}

/// Message type name to handler. A later registration replaces an earlier one.
#[derive(Default)]
pub struct HandlerTable {
    handlers: HashMap<String, Arc<dyn Handler>>,
}

impl HandlerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when an existing handler was replaced
    pub fn insert(&mut self, kind: String, handler: Arc<dyn Handler>) -> bool {
        self.handlers.insert(kind, handler).is_some()
    }

    pub fn remove(&mut self, kind: &str) -> bool {
        self.handlers.remove(kind).is_some()
    }

    pub fn get(&self, kind: &str) -> Option<Arc<dyn Handler>> {
        self.handlers.get(kind).cloned()
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.handlers.contains_key(kind)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for HandlerTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.handlers.keys()).finish()
    }
}
