//! Streaming engine
//!
//! [`StreamingEngine`] is the composition root of the streaming side: it
//! owns the transport and the subscription registry, performs the
//! handshake, and routes decoded inbound frames to per-subscription
//! consumers.
//!
//! # Design
//!
//! - Outbound frames are written to an unbounded channel drained by a
//!   writer task, so `subscribe`/`unsubscribe`/`send_raw` never suspend;
//!   frames are sent in call order.
//! - Inbound events are consumed by a read loop stopped via a
//!   [`CancellationToken`]. All engine state (connection state, registry,
//!   outbound sender) lives behind one mutex and is never held across an
//!   await point.
//! - Subscription callbacks run synchronously with message receipt, on
//!   the read loop. A slow callback back-pressures the consumer side;
//!   callbacks must not block indefinitely.
//!
//! # Failure semantics
//!
//! Parse failures on snapshots or deltas are logged and non-fatal.
//! Transport errors are fatal to the channel; the engine never
//! reconnects on its own.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::StreamExt;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::config::ClientConfig;
use crate::error::{Result, ZetaError};
use crate::stream::delta;
use crate::stream::events::{EventListeners, ListenerId, StreamEvent};
use crate::stream::frame::{self, FrameKind};
use crate::stream::registry::{SubscriptionCallback, SubscriptionRegistry, SubscriptionUpdate};
use crate::stream::transport::websocket::WebSocketTransport;
use crate::stream::transport::{StreamTransport, TransportEvent};

/// Origin header sent with the websocket upgrade.
pub const WEB_ORIGIN: &str = "https://app.traderepublic.com";

/// Lifecycle state of the streaming channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection attempted yet.
    Init,
    /// Transport is being established; the handshake has not completed.
    Opening,
    /// Handshake sent; subscriptions may be opened.
    Open,
    /// A transport error occurred. Terminal until the next `connect`.
    Failed,
    /// The channel closed. Terminal until the next `connect`.
    Closed,
}

/// Everything the engine mutates, guarded as one unit.
struct EngineInner {
    state: ConnectionState,
    registry: SubscriptionRegistry,
    transport: Option<Arc<dyn StreamTransport>>,
    outbound_tx: Option<mpsc::UnboundedSender<String>>,
    cancellation: Option<CancellationToken>,
}

/// The streaming subscription engine.
///
/// Obtained from [`Client::streaming`](crate::client::Client::streaming)
/// after login. One engine drives one channel at a time; after a failure
/// or close, `connect` may be called again for a fresh session.
pub struct StreamingEngine {
    websocket_url: Url,
    locale: String,
    client_version: String,
    connect_timeout: Duration,
    cookies: Vec<String>,
    inner: Arc<Mutex<EngineInner>>,
    listeners: Arc<EventListeners>,
}

impl std::fmt::Debug for StreamingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingEngine")
            .field("websocket_url", &self.websocket_url.as_str())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl StreamingEngine {
    /// Build an engine carrying the given session cookies.
    pub(crate) fn new(config: &ClientConfig, cookies: Vec<String>) -> Self {
        Self {
            websocket_url: config.websocket_url.clone(),
            locale: config.language.clone(),
            client_version: config.client_version.clone(),
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
            cookies,
            inner: Arc::new(Mutex::new(EngineInner {
                state: ConnectionState::Init,
                registry: SubscriptionRegistry::new(),
                transport: None,
                outbound_tx: None,
                cancellation: None,
            })),
            listeners: Arc::new(EventListeners::new()),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.lock_inner().state
    }

    /// Register an event listener for `open`/`message`/`error`/`close`.
    /// Delivery is synchronous with the transport callback.
    pub fn on_event(
        &self,
        listener: impl Fn(&StreamEvent) + Send + Sync + 'static,
    ) -> ListenerId {
        self.listeners.add(listener)
    }

    /// Unregister a listener previously added with [`Self::on_event`].
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    /// Open the streaming channel against the configured endpoint.
    ///
    /// Suspends until the transport reports open and the handshake frame
    /// has been enqueued, or until the connect timeout elapses.
    ///
    /// # Errors
    ///
    /// - [`ZetaError::Misuse`] if no session cookies are present or a
    ///   channel is already opening/open.
    /// - [`ZetaError::Transport`] if the upgrade or handshake fails.
    pub async fn connect(&self) -> Result<()> {
        let url = self.websocket_url.clone();
        self.connect_to(&url).await
    }

    /// Open the streaming channel against an explicit endpoint.
    pub async fn connect_to(&self, url: &Url) -> Result<()> {
        self.check_connect_preconditions()?;
        let headers = vec![
            ("Cookie".to_string(), self.cookies.join("; ")),
            ("Origin".to_string(), WEB_ORIGIN.to_string()),
        ];
        let transport = WebSocketTransport::connect(url, &headers).await?;
        self.connect_with(Arc::new(transport)).await
    }

    /// Open the channel over a caller-supplied transport.
    ///
    /// The transport's event stream must begin with
    /// [`TransportEvent::Open`] once the channel is established. This is
    /// the seam used by tests and by integrators bringing their own
    /// transport.
    pub async fn connect_with(&self, transport: Arc<dyn StreamTransport>) -> Result<()> {
        self.check_connect_preconditions()?;

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel::<String>();
        let cancellation = CancellationToken::new();
        {
            let mut inner = self.lock_inner();
            // Re-check under the lock: two racing connect calls must not
            // both pass the precondition.
            if matches!(inner.state, ConnectionState::Opening | ConnectionState::Open) {
                return Err(
                    ZetaError::Misuse("streaming channel is already connected".to_string()).into(),
                );
            }
            inner.state = ConnectionState::Opening;
            inner.registry = SubscriptionRegistry::new();
            inner.transport = Some(Arc::clone(&transport));
            inner.outbound_tx = Some(outbound_tx.clone());
            inner.cancellation = Some(cancellation.clone());
        }

        let (open_tx, open_rx) = oneshot::channel::<std::result::Result<(), String>>();

        tokio::spawn(writer_task(
            outbound_rx,
            Arc::clone(&transport),
            cancellation.clone(),
            Arc::clone(&self.inner),
            Arc::clone(&self.listeners),
        ));

        tokio::spawn(read_loop(
            transport,
            Arc::clone(&self.inner),
            Arc::clone(&self.listeners),
            outbound_tx,
            cancellation.clone(),
            open_tx,
            frame::connect_frame(&self.locale, &self.client_version),
        ));

        match tokio::time::timeout(self.connect_timeout, open_rx).await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(reason))) => Err(ZetaError::Transport(reason).into()),
            Ok(Err(_)) => {
                Err(ZetaError::Transport("channel ended before open".to_string()).into())
            }
            Err(_) => {
                cancellation.cancel();
                self.lock_inner().state = ConnectionState::Failed;
                Err(ZetaError::Transport("connect timed out".to_string()).into())
            }
        }
    }

    /// Close the channel. Hard cancel: the registry is emptied and
    /// evicted consumers receive no further calls, in particular no
    /// synthetic close.
    pub async fn disconnect(&self) -> Result<()> {
        let (cancellation, transport) = {
            let mut inner = self.lock_inner();
            inner.state = ConnectionState::Closed;
            inner.registry.clear();
            inner.outbound_tx = None;
            (inner.cancellation.take(), inner.transport.take())
        };
        if let Some(token) = cancellation {
            token.cancel();
        }
        if let Some(transport) = transport {
            let _ = transport.close().await;
        }
        self.listeners.emit(&StreamEvent::Close(None));
        Ok(())
    }

    /// Subscribe to an opaque topic.
    ///
    /// Allocates the next identifier, installs the consumer, and
    /// enqueues the subscribe frame. Does not suspend.
    ///
    /// # Errors
    ///
    /// Returns [`ZetaError::Misuse`] unless the channel is open.
    pub fn subscribe(
        &self,
        topic: Value,
        callback: impl Fn(SubscriptionUpdate) + Send + Sync + 'static,
    ) -> Result<u64> {
        let mut inner = self.lock_inner();
        require_open(&inner.state, "subscribe")?;
        let id = inner.registry.allocate_id();
        inner
            .registry
            .install(id, topic.clone(), Arc::new(callback) as SubscriptionCallback)?;
        enqueue(&inner, frame::sub_frame(id, &topic))?;
        Ok(id)
    }

    /// Subscribe under a caller-chosen identifier.
    ///
    /// # Errors
    ///
    /// Returns [`ZetaError::Misuse`] unless the channel is open, or when
    /// the id is reserved or already in use.
    pub fn subscribe_with_id(
        &self,
        id: u64,
        topic: Value,
        callback: impl Fn(SubscriptionUpdate) + Send + Sync + 'static,
    ) -> Result<()> {
        let mut inner = self.lock_inner();
        require_open(&inner.state, "subscribe_with_id")?;
        inner
            .registry
            .install(id, topic.clone(), Arc::new(callback) as SubscriptionCallback)?;
        enqueue(&inner, frame::sub_frame(id, &topic))?;
        Ok(())
    }

    /// Signal the server to end a subscription. Cooperative: the local
    /// entry stays installed until the server's close frame arrives, so
    /// in-flight snapshots and deltas still route.
    pub fn unsubscribe(&self, id: u64, topic: &Value) -> Result<()> {
        let inner = self.lock_inner();
        require_open(&inner.state, "unsubscribe")?;
        enqueue(&inner, frame::unsub_frame(id, topic))
    }

    /// Enqueue a raw frame on the channel. Escape hatch for frames the
    /// SDK does not model.
    pub fn send_raw(&self, raw: impl Into<String>) -> Result<()> {
        let inner = self.lock_inner();
        require_open(&inner.state, "send")?;
        enqueue(&inner, raw.into())
    }

    /// Number of live subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.lock_inner().registry.len()
    }

    fn check_connect_preconditions(&self) -> Result<()> {
        if self.cookies.is_empty() {
            return Err(
                ZetaError::Misuse("connect requires non-empty session cookies".to_string()).into(),
            );
        }
        let inner = self.lock_inner();
        if matches!(inner.state, ConnectionState::Opening | ConnectionState::Open) {
            return Err(
                ZetaError::Misuse("streaming channel is already connected".to_string()).into(),
            );
        }
        Ok(())
    }

    fn lock_inner(&self) -> std::sync::MutexGuard<'_, EngineInner> {
        self.inner.lock().expect("engine state lock poisoned")
    }
}

/// Misuse check shared by the synchronous send paths.
fn require_open(state: &ConnectionState, operation: &str) -> Result<()> {
    if *state != ConnectionState::Open {
        return Err(ZetaError::Misuse(format!(
            "{operation} requires an open streaming channel (state: {state:?})"
        ))
        .into());
    }
    Ok(())
}

/// Enqueue a frame on the outbound channel.
fn enqueue(inner: &EngineInner, frame: String) -> Result<()> {
    let tx = inner
        .outbound_tx
        .as_ref()
        .ok_or_else(|| ZetaError::Transport("outbound channel is gone".to_string()))?;
    tx.send(frame)
        .map_err(|_| ZetaError::Transport("outbound channel closed".to_string()).into())
}

/// Drain the outbound channel into the transport, preserving call order.
/// A send failure is fatal to the channel.
async fn writer_task(
    mut outbound_rx: mpsc::UnboundedReceiver<String>,
    transport: Arc<dyn StreamTransport>,
    cancellation: CancellationToken,
    inner: Arc<Mutex<EngineInner>>,
    listeners: Arc<EventListeners>,
) {
    loop {
        tokio::select! {
            biased;

            _ = cancellation.cancelled() => break,

            maybe_frame = outbound_rx.recv() => {
                let Some(frame) = maybe_frame else { break };
                if let Err(e) = transport.send(frame).await {
                    tracing::warn!("streaming send failed: {e}");
                    inner.lock().expect("engine state lock poisoned").state =
                        ConnectionState::Failed;
                    listeners.emit(&StreamEvent::Error(e.to_string()));
                    break;
                }
            }
        }
    }
}

/// Consume transport events until cancellation or close.
#[allow(clippy::too_many_arguments)]
async fn read_loop(
    transport: Arc<dyn StreamTransport>,
    inner: Arc<Mutex<EngineInner>>,
    listeners: Arc<EventListeners>,
    outbound_tx: mpsc::UnboundedSender<String>,
    cancellation: CancellationToken,
    open_tx: oneshot::Sender<std::result::Result<(), String>>,
    handshake: String,
) {
    let mut events = transport.events();
    let mut open_tx = Some(open_tx);

    loop {
        tokio::select! {
            biased;

            _ = cancellation.cancelled() => break,

            maybe_event = events.next() => {
                let Some(event) = maybe_event else {
                    // Stream ended without an explicit close event.
                    handle_closed(None, &inner, &listeners, &mut open_tx);
                    break;
                };
                match event {
                    TransportEvent::Open => {
                        // The handshake goes through the same outbound
                        // channel as everything else, so it is on the
                        // wire before any subscribe that observes the
                        // Open state below.
                        let _ = outbound_tx.send(handshake.clone());
                        inner.lock().expect("engine state lock poisoned").state =
                            ConnectionState::Open;
                        listeners.emit(&StreamEvent::Open);
                        if let Some(tx) = open_tx.take() {
                            let _ = tx.send(Ok(()));
                        }
                    }
                    TransportEvent::Message(raw) => {
                        listeners.emit(&StreamEvent::Message(raw.clone()));
                        handle_frame(&raw, &inner);
                    }
                    TransportEvent::Error(error) => {
                        inner.lock().expect("engine state lock poisoned").state =
                            ConnectionState::Failed;
                        listeners.emit(&StreamEvent::Error(error.clone()));
                        if let Some(tx) = open_tx.take() {
                            let _ = tx.send(Err(error));
                        }
                    }
                    TransportEvent::Closed(reason) => {
                        handle_closed(reason, &inner, &listeners, &mut open_tx);
                        break;
                    }
                }
            }
        }
    }
}

/// Transition to `Closed` and discard the registry; evicted entries will
/// never be seen again.
fn handle_closed(
    reason: Option<String>,
    inner: &Arc<Mutex<EngineInner>>,
    listeners: &Arc<EventListeners>,
    open_tx: &mut Option<oneshot::Sender<std::result::Result<(), String>>>,
) {
    {
        let mut inner = inner.lock().expect("engine state lock poisoned");
        inner.state = ConnectionState::Closed;
        inner.registry.clear();
        inner.outbound_tx = None;
    }
    listeners.emit(&StreamEvent::Close(reason.clone()));
    if let Some(tx) = open_tx.take() {
        let _ = tx.send(Err(format!(
            "channel closed before open: {}",
            reason.unwrap_or_else(|| "(no reason)".to_string())
        )));
    }
}

/// Decode one inbound frame and route it through the registry.
///
/// This is extracted from the loop body to keep `read_loop` readable and
/// to allow direct unit testing of the routing logic.
fn handle_frame(raw: &str, inner: &Arc<Mutex<EngineInner>>) {
    let frame = match frame::decode(raw) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::warn!("dropping malformed frame: {e}");
            return;
        }
    };

    // Registry presence is the gate: frames for unknown ids (including
    // anything the server sends for the reserved handshake id) drop
    // silently, which makes unsubscribe safe against in-flight traffic.
    let Some((callback, last)) = inner
        .lock()
        .expect("engine state lock poisoned")
        .registry
        .lookup(frame.id)
    else {
        tracing::debug!(id = frame.id, "dropping frame for unknown subscription");
        return;
    };

    match frame.kind {
        FrameKind::Snapshot => match serde_json::from_str::<Value>(&frame.payload) {
            Ok(document) => {
                inner
                    .lock()
                    .expect("engine state lock poisoned")
                    .registry
                    .set_last(frame.id, frame.payload);
                callback(SubscriptionUpdate::Data(document));
            }
            Err(e) => {
                tracing::warn!(id = frame.id, "unparseable snapshot payload: {e}");
            }
        },
        FrameKind::Delta => {
            let Some(last) = last else {
                tracing::warn!(id = frame.id, "delta received before any snapshot; dropping");
                return;
            };
            let next_text = match delta::apply(&last, &frame.payload) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(id = frame.id, "delta apply failed: {e}");
                    return;
                }
            };
            // The reconstructed text replaces the stored snapshot before
            // the parse attempt; a parse failure skips the callback but
            // does not revert the text.
            inner
                .lock()
                .expect("engine state lock poisoned")
                .registry
                .set_last(frame.id, next_text.clone());
            match serde_json::from_str::<Value>(&next_text) {
                Ok(document) => callback(SubscriptionUpdate::Data(document)),
                Err(e) => {
                    tracing::warn!(id = frame.id, "document unparseable after delta: {e}");
                }
            }
        }
        FrameKind::Close => {
            callback(SubscriptionUpdate::Closed);
            inner
                .lock()
                .expect("engine state lock poisoned")
                .registry
                .remove(frame.id);
        }
    }
}
