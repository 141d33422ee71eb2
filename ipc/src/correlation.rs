use crate::envelope::CorrelationId;
use crate::errors::BusError;
use indexmap::IndexMap;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::debug;

/// Receiving half of a pending request; completes with the reply detail.
pub type Waiter = oneshot::Receiver<Value>;

/// Requests this side has issued and is still waiting on, in issue order.
///
/// Each entry owns the single-use completion handle for its id, so an id is
/// pending exactly as long as someone can still be woken for it. Removal
/// happens at the moment of first resolution, which makes a second
/// resolution of the same id a no-op.
#[derive(Debug, Default)]
pub struct CorrelationRegistry {
    pending: IndexMap<CorrelationId, oneshot::Sender<Value>>,
}

impl CorrelationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a waiter for `id`. An id that is still pending cannot be registered again.
    pub fn register(&mut self, id: CorrelationId) -> Result<Waiter, BusError> {
        if self.pending.contains_key(&id) {
            return Err(BusError::DuplicateId(id));
        }
        let (responder, waiter) = oneshot::channel();
        self.pending.insert(id, responder);
        Ok(waiter)
    }

    /// Wakes the waiter for `id` with `detail` and forgets the id.
    ///
    /// Returns `false` for ids that are not pending (stray or duplicate replies).
    pub fn resolve(&mut self, id: &CorrelationId, detail: Value) -> bool {
        let Some(responder) = self.pending.shift_remove(id) else {
            return false;
        };
        if responder.send(detail).is_err() {
            debug!(%id, "Reply arrived after the caller stopped waiting");
        }
        true
    }

    /// Forgets `id` without waking anyone.
    pub fn cancel(&mut self, id: &CorrelationId) -> bool {
        self.pending.shift_remove(id).is_some()
    }

    /// Drops every pending waiter; their callers observe a closed bus.
    pub fn abandon_all(&mut self) -> usize {
        let count = self.pending.len();
        self.pending.clear();
        count
    }

    pub fn contains(&self, id: &CorrelationId) -> bool {
        self.pending.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Pending ids, oldest first
    pub fn ids(&self) -> Vec<CorrelationId> {
        self.pending.keys().cloned().collect()
    }
}
