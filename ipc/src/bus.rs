use crate::correlation::{CorrelationRegistry, Waiter};
use crate::envelope::{CorrelationId, Envelope};
use crate::errors::BusError;
use crate::handlers::{Handler, HandlerTable, Reply};
use crate::transport::{InboundEnvelopes, Transport};
use serde_json::Value;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// What the bus did with one inbound envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// The id was pending here: the envelope was a reply and woke its caller
    Resolved,
    /// The id was unknown and a handler for the type was started
    Handled,
    /// Neither a pending id nor a registered type; ignored
    Dropped,
}

/// One side of the request/reply channel.
///
/// Cloning is cheap and every clone drives the same bus. Outbound requests
/// get a fresh id and a waiter; inbound envelopes go through [`dispatch`],
/// which treats an envelope as a reply when its id is pending here and as a
/// request otherwise.
///
/// The dispatch loop only holds a weak reference: once the last clone is
/// dropped the loop stops and the transport is released.
///
/// [`dispatch`]: MessageBus::dispatch
pub struct MessageBus<T: Transport> {
    inner: Arc<BusInner<T>>,
}

struct BusInner<T> {
    transport: Arc<T>,
    registry: Mutex<CorrelationRegistry>,
    handlers: RwLock<HandlerTable>,
    dispatch_task: std::sync::Mutex<Option<JoinHandle<()>>>,
    // `true` whenever no dispatch loop is running
    stopped: Arc<watch::Sender<bool>>,
}

impl<T> BusInner<T> {
    fn abort_dispatch(&self) {
        let task = match self.dispatch_task.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(task) = task {
            task.abort();
        }
        self.stopped.send_replace(true);
    }
}

impl<T> Drop for BusInner<T> {
    fn drop(&mut self) {
        self.abort_dispatch();
    }
}

impl<T: Transport> Clone for MessageBus<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Transport> MessageBus<T> {
    /// Creates a bus that sends through `transport`. Nothing is received until
    /// [`attach`](Self::attach) hands it the inbound half.
    pub fn new(transport: T) -> Self {
        let (stopped, _) = watch::channel(true);
        Self {
            inner: Arc::new(BusInner {
                transport: Arc::new(transport),
                registry: Mutex::new(CorrelationRegistry::new()),
                handlers: RwLock::new(HandlerTable::new()),
                dispatch_task: std::sync::Mutex::new(None),
                stopped: Arc::new(stopped),
            }),
        }
    }

    /// Creates a bus and immediately starts dispatching `inbound`.
    pub async fn start(transport: T, inbound: InboundEnvelopes) -> Self {
        let bus = Self::new(transport);
        bus.attach(inbound).await;
        bus
    }

    /// Starts the dispatch loop over `inbound`.
    ///
    /// Envelopes are dispatched one at a time in arrival order. When the
    /// inbound side closes, every caller still waiting gets [`BusError::Closed`].
    pub async fn attach(&self, mut inbound: InboundEnvelopes) {
        self.inner.abort_dispatch();

        let weak: Weak<BusInner<T>> = Arc::downgrade(&self.inner);
        let stopped = Arc::clone(&self.inner.stopped);
        let transport = self.inner.transport.name();
        stopped.send_replace(false);

        let task = tokio::spawn(async move {
            while let Some(envelope) = inbound.recv().await {
                let Some(inner) = weak.upgrade() else {
                    debug!(transport, "Bus dropped, dispatch loop stopped");
                    break;
                };
                MessageBus { inner }.dispatch(envelope).await;
            }
            if let Some(inner) = weak.upgrade() {
                let abandoned = inner.registry.lock().await.abandon_all();
                info!(transport, abandoned, "Inbound channel closed, dispatch loop stopped");
            }
            stopped.send_replace(true);
        });

        match self.inner.dispatch_task.lock() {
            Ok(mut slot) => *slot = Some(task),
            Err(poisoned) => *poisoned.into_inner() = Some(task),
        }
    }

    /// Sends a request and waits for its reply detail.
    ///
    /// There is no deadline: if the peer never answers, the returned future
    /// never completes. Use [`send_timeout`](Self::send_timeout) to bound the wait.
    pub async fn send(
        &self,
        kind: impl Into<String>,
        detail: Value,
    ) -> Result<Value, BusError> {
        let (_id, waiter) = self.request(kind.into(), detail).await?;
        waiter.await.map_err(|_| BusError::Closed)
    }

    /// Like [`send`](Self::send), but gives up after `deadline`. The pending
    /// entry is removed, so a late reply is treated as unmatched.
    pub async fn send_timeout(
        &self,
        kind: impl Into<String>,
        detail: Value,
        deadline: Duration,
    ) -> Result<Value, BusError> {
        let (id, mut waiter) = self.request(kind.into(), detail).await?;
        match tokio::time::timeout(deadline, &mut waiter).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(BusError::Closed),
            Err(_) => match self.expire(&id, &mut waiter).await {
                Some(reply) => Ok(reply),
                None => {
                    warn!(%id, ?deadline, "Request timed out");
                    Err(BusError::Timeout {
                        id,
                        after: deadline,
                    })
                }
            },
        }
    }

    /// Drops the pending entry for `id` after its deadline. A reply resolved
    /// between the deadline and this call is still handed back.
    async fn expire(&self, id: &CorrelationId, waiter: &mut Waiter) -> Option<Value> {
        if self.inner.registry.lock().await.cancel(id) {
            return None;
        }
        waiter.try_recv().ok()
    }

    /// Sends a request without waiting for (or expecting) a reply.
    pub async fn notify(
        &self,
        kind: impl Into<String>,
        detail: Value,
    ) -> Result<CorrelationId, BusError> {
        let id = CorrelationId::generate();
        let envelope = Envelope::new(id.clone(), kind, detail);
        self.inner.transport.send_envelope(envelope).await?;
        Ok(id)
    }

    async fn request(
        &self,
        kind: String,
        detail: Value,
    ) -> Result<(CorrelationId, Waiter), BusError> {
        let id = CorrelationId::generate();
        // Registered before sending so that even an immediate reply finds it.
        let waiter = self.inner.registry.lock().await.register(id.clone())?;

        debug!(%id, %kind, "Sending request");
        let envelope = Envelope::new(id.clone(), kind, detail);
        if let Err(e) = self.inner.transport.send_envelope(envelope).await {
            self.inner.registry.lock().await.cancel(&id);
            return Err(e.into());
        }
        Ok((id, waiter))
    }

    /// Registers the handler for unsolicited requests of type `kind`.
    /// Returns `true` if it replaced an earlier handler.
    pub async fn on<H: Handler>(&self, kind: impl Into<String>, handler: H) -> bool {
        let kind = kind.into();
        let replaced = self
            .inner
            .handlers
            .write()
            .await
            .insert(kind.clone(), Arc::new(handler));
        if replaced {
            debug!(%kind, "Replaced existing handler");
        }
        replaced
    }

    /// Removes the handler for `kind`, if any.
    pub async fn off(&self, kind: &str) -> bool {
        self.inner.handlers.write().await.remove(kind)
    }

    /// Routes one inbound envelope.
    #[instrument(skip(self, envelope), fields(id = %envelope.id, kind = %envelope.kind))]
    pub async fn dispatch(&self, envelope: Envelope) -> Dispatch {
        let Envelope { id, kind, detail } = envelope;

        {
            let mut registry = self.inner.registry.lock().await;
            if registry.contains(&id) {
                registry.resolve(&id, detail);
                debug!("Resolved pending request");
                return Dispatch::Resolved;
            }
        }

        let handler = self.inner.handlers.read().await.get(&kind);
        let Some(handler) = handler else {
            debug!("No pending request or handler, dropping envelope");
            return Dispatch::Dropped;
        };

        let transport: Arc<dyn Transport> = self.inner.transport.clone();
        let reply = Reply::new(id, kind, transport);
        tokio::spawn(async move {
            handler.handle(detail, reply).await;
        });
        Dispatch::Handled
    }

    pub async fn pending_count(&self) -> usize {
        self.inner.registry.lock().await.len()
    }

    /// Ids still waiting for a reply, oldest first
    pub async fn pending_ids(&self) -> Vec<CorrelationId> {
        self.inner.registry.lock().await.ids()
    }

    /// Resolves once no dispatch loop is running, i.e. the peer went away or
    /// the bus was shut down. Dropping this future has no effect on the loop.
    pub async fn closed(&self) {
        let mut stopped = self.inner.stopped.subscribe();
        while !*stopped.borrow_and_update() {
            if stopped.changed().await.is_err() {
                break;
            }
        }
    }

    /// Stops dispatching and fails every outstanding `send` with [`BusError::Closed`].
    pub async fn shutdown(&self) {
        self.inner.abort_dispatch();
        let abandoned = self.inner.registry.lock().await.abandon_all();
        info!(abandoned, "Message bus shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ChannelTransport;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn echo(detail: Value, reply: Reply) -> impl std::future::Future<Output = ()> + Send {
        async move {
            let _ = reply.send(detail).await;
        }
    }

    async fn connected_buses() -> (MessageBus<ChannelTransport>, MessageBus<ChannelTransport>) {
        let ((a, a_inbound), (b, b_inbound)) = ChannelTransport::pair(16);
        (
            MessageBus::start(a, a_inbound).await,
            MessageBus::start(b, b_inbound).await,
        )
    }

    #[tokio::test]
    async fn test_round_trip() {
        let (a, b) = connected_buses().await;
        b.on("echo", echo).await;

        let details = [
            json!(null),
            json!(42),
            json!("text"),
            json!({ "nested": [1, 2, { "x": true }] }),
        ];
        for detail in details {
            assert_eq!(a.send("echo", detail.clone()).await.unwrap(), detail);
        }
        assert_eq!(a.pending_count().await, 0);
    }

    #[tokio::test]
    async fn test_both_sides_can_request() {
        let (a, b) = connected_buses().await;
        a.on("from-b", echo).await;
        b.on("from-a", echo).await;

        assert_eq!(a.send("from-a", json!(1)).await.unwrap(), json!(1));
        assert_eq!(b.send("from-b", json!(2)).await.unwrap(), json!(2));
    }

    #[tokio::test]
    async fn test_dispatch_outcomes() {
        let ((a, a_inbound), (_b, _b_inbound)) = ChannelTransport::pair(16);
        let bus = MessageBus::new(a);
        drop(a_inbound);
        bus.on("known", echo).await;

        let unknown = Envelope::new("nobody".into(), "unknown", json!(1));
        assert_eq!(bus.dispatch(unknown).await, Dispatch::Dropped);

        let request = Envelope::new("fresh".into(), "known", json!(1));
        assert_eq!(bus.dispatch(request).await, Dispatch::Handled);
    }

    #[tokio::test]
    async fn test_pending_reply_wins_over_handler() {
        let ((a, _a_inbound), (_b, mut b_inbound)) = ChannelTransport::pair(16);
        let bus = MessageBus::new(a);
        let invoked = Arc::new(AtomicUsize::new(0));
        let counter = invoked.clone();
        bus.on("same-type", move |_detail: Value, _reply: Reply| {
            counter.fetch_add(1, Ordering::SeqCst);
            async {}
        })
        .await;

        let caller = bus.clone();
        let call = tokio::spawn(async move { caller.send("same-type", json!("ask")).await });
        let request = b_inbound.recv().await.unwrap();

        let outcome = bus
            .dispatch(Envelope::new(request.id, "same-type", json!("answer")))
            .await;
        assert_eq!(outcome, Dispatch::Resolved);
        assert_eq!(call.await.unwrap().unwrap(), json!("answer"));
        assert_eq!(invoked.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_last_handler_wins() {
        let (a, b) = connected_buses().await;
        let first = |_detail: Value, reply: Reply| async move {
            let _ = reply.send(json!("first")).await;
        };
        let second = |_detail: Value, reply: Reply| async move {
            let _ = reply.send(json!("second")).await;
        };
        assert!(!b.on("t", first).await);
        assert!(b.on("t", second).await);

        assert_eq!(a.send("t", Value::Null).await.unwrap(), json!("second"));
    }

    #[tokio::test]
    async fn test_off_unregisters() {
        let (a, b) = connected_buses().await;
        b.on("t", echo).await;
        assert!(b.off("t").await);
        assert!(!b.off("t").await);

        let result = a.send_timeout("t", json!(1), Duration::from_millis(50)).await;
        assert!(matches!(result, Err(BusError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_timeout_clears_pending_entry() {
        let ((a, a_inbound), (_b, mut b_inbound)) = ChannelTransport::pair(16);
        let bus = MessageBus::start(a, a_inbound).await;

        let result = bus
            .send_timeout("slow", Value::Null, Duration::from_millis(20))
            .await;
        let Err(BusError::Timeout { id, .. }) = result else {
            panic!("expected timeout, got {:?}", result);
        };
        assert_eq!(bus.pending_count().await, 0);

        // The late reply is now unmatched and has nowhere to go.
        let request = b_inbound.recv().await.unwrap();
        assert_eq!(request.id, id);
        let late = Envelope::new(id, "slow", json!("late"));
        assert_eq!(bus.dispatch(late).await, Dispatch::Dropped);
    }

    #[tokio::test]
    async fn test_send_fails_when_transport_closed() {
        let ((a, _a_inbound), (_b, b_inbound)) = ChannelTransport::pair(16);
        drop(b_inbound);
        let bus = MessageBus::new(a);

        let result = bus.send("t", Value::Null).await;
        assert!(matches!(result, Err(BusError::Transport(_))));
        assert_eq!(bus.pending_count().await, 0);
    }

    #[tokio::test]
    async fn test_notify_registers_nothing() {
        let ((a, _a_inbound), (_b, mut b_inbound)) = ChannelTransport::pair(16);
        let bus = MessageBus::new(a);

        let id = bus.notify("fire", json!("forget")).await.unwrap();
        assert_eq!(bus.pending_count().await, 0);
        assert_eq!(b_inbound.recv().await.unwrap().id, id);
    }

    #[tokio::test]
    async fn test_shutdown_releases_waiters() {
        let ((a, a_inbound), (_b, mut b_inbound)) = ChannelTransport::pair(16);
        let bus = MessageBus::start(a, a_inbound).await;

        let caller = bus.clone();
        let call = tokio::spawn(async move { caller.send("never", Value::Null).await });
        b_inbound.recv().await.unwrap();
        assert_eq!(bus.pending_count().await, 1);

        bus.shutdown().await;
        assert!(matches!(call.await.unwrap(), Err(BusError::Closed)));
    }

    #[tokio::test]
    async fn test_peer_disconnect_releases_waiters() {
        let ((a, a_inbound), (b, mut b_inbound)) = ChannelTransport::pair(16);
        let bus = MessageBus::start(a, a_inbound).await;

        let caller = bus.clone();
        let call = tokio::spawn(async move { caller.send("never", Value::Null).await });
        b_inbound.recv().await.unwrap();

        // Dropping the peer's sender closes our inbound queue.
        drop(b);
        bus.closed().await;
        assert!(matches!(call.await.unwrap(), Err(BusError::Closed)));
    }

    #[tokio::test]
    async fn test_shutdown_after_abandoned_closed_wait() {
        let (a, b) = connected_buses().await;
        b.on("ping", echo).await;

        tokio::select! {
            _ = b.closed() => panic!("peer is still connected"),
            _ = tokio::time::sleep(Duration::from_millis(20)) => b.shutdown().await,
        }

        let result = a
            .send_timeout("ping", json!("after shutdown"), Duration::from_millis(200))
            .await;
        assert!(result.is_err(), "handler answered after shutdown: {:?}", result);
        b.closed().await;
    }

    #[tokio::test]
    async fn test_dropping_bus_releases_transport() {
        let ((a, a_inbound), (_peer, mut peer_inbound)) = ChannelTransport::pair(16);
        let bus = MessageBus::start(a, a_inbound).await;
        bus.on("t", echo).await;

        drop(bus);
        let closed = tokio::time::timeout(Duration::from_secs(1), peer_inbound.recv()).await;
        assert!(matches!(closed, Ok(None)));
    }

    #[tokio::test]
    async fn test_dropping_one_side_stops_the_other() {
        let (a, b) = connected_buses().await;
        b.on("t", echo).await;

        drop(a);
        tokio::time::timeout(Duration::from_secs(1), b.closed())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_reply_racing_the_deadline_is_kept() {
        let ((a, _a_inbound), (_b, _b_inbound)) = ChannelTransport::pair(4);
        let bus = MessageBus::new(a);

        let id = CorrelationId::from("late");
        let mut waiter = bus.inner.registry.lock().await.register(id.clone()).unwrap();
        bus.inner
            .registry
            .lock()
            .await
            .resolve(&id, json!("just in time"));
        assert_eq!(bus.expire(&id, &mut waiter).await, Some(json!("just in time")));

        let other = CorrelationId::from("other");
        let mut other_waiter = bus.inner.registry.lock().await.register(other.clone()).unwrap();
        assert_eq!(bus.expire(&other, &mut other_waiter).await, None);
        assert_eq!(bus.pending_count().await, 0);
    }
}
