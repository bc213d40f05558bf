//! Websocket implementation of [`StreamTransport`]
//!
//! Wraps `tokio-tungstenite` and adapts the socket to the engine's
//! event-stream contract. The upgrade request carries the session
//! cookies and the web origin; both are required by the broker backend
//! before it will accept the channel.
//!
//! The socket is split after the upgrade: the write half sits behind an
//! async mutex for `send`/`close`, the read half is drained by a
//! background task that translates websocket messages into
//! [`TransportEvent`]s. Binary frames are ignored; the protocol is
//! line-oriented text end to end.

use std::pin::Pin;
use std::sync::Arc;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, Stream, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::error::{Result, ZetaError};
use crate::stream::transport::{StreamTransport, TransportEvent};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

/// Production transport over a secure websocket.
pub struct WebSocketTransport {
    write: Arc<Mutex<WsSink>>,
    event_rx: Arc<Mutex<mpsc::UnboundedReceiver<TransportEvent>>>,
}

impl std::fmt::Debug for WebSocketTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketTransport").finish_non_exhaustive()
    }
}

impl WebSocketTransport {
    /// Perform the websocket upgrade against `url` with the given extra
    /// headers and return a connected transport.
    ///
    /// The returned transport's event stream begins with
    /// [`TransportEvent::Open`].
    ///
    /// # Arguments
    ///
    /// * `url` - The websocket endpoint (`wss://…`).
    /// * `headers` - Upgrade-time headers; the engine passes `Cookie`
    ///   and `Origin` here.
    ///
    /// # Errors
    ///
    /// Returns [`ZetaError::Transport`] if the upgrade request cannot be
    /// built or the handshake fails.
    pub async fn connect(url: &Url, headers: &[(String, String)]) -> Result<Self> {
        let mut request = url.as_str().into_client_request().map_err(|e| {
            ZetaError::Transport(format!("failed to build websocket request: {e}"))
        })?;

        for (name, value) in headers {
            let name: tokio_tungstenite::tungstenite::http::HeaderName =
                name.parse().map_err(|_| {
                    ZetaError::Transport(format!("invalid upgrade header name: {name}"))
                })?;
            let value = value.parse().map_err(|_| {
                ZetaError::Transport(format!("invalid upgrade header value for {name}"))
            })?;
            request.headers_mut().insert(name, value);
        }

        tracing::debug!(url = %url, "opening websocket");
        let (socket, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| ZetaError::Transport(format!("websocket handshake failed: {e}")))?;

        let (write, read) = socket.split();

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        // The upgrade already succeeded, so the channel is open from the
        // consumer's point of view before the read task observes traffic.
        let _ = event_tx.send(TransportEvent::Open);

        tokio::spawn(read_task(read, event_tx));

        Ok(Self {
            write: Arc::new(Mutex::new(write)),
            event_rx: Arc::new(Mutex::new(event_rx)),
        })
    }
}

/// Drain the read half, translating websocket messages into transport
/// events until the socket ends.
async fn read_task(mut read: SplitStream<WsStream>, event_tx: mpsc::UnboundedSender<TransportEvent>) {
    while let Some(item) = read.next().await {
        match item {
            Ok(Message::Text(text)) => {
                if event_tx.send(TransportEvent::Message(text.to_string())).is_err() {
                    return;
                }
            }
            Ok(Message::Close(frame)) => {
                let reason = frame.map(|f| format!("{}: {}", f.code, f.reason));
                let _ = event_tx.send(TransportEvent::Closed(reason));
                return;
            }
            // Ping/pong are handled by tungstenite; binary frames are
            // outside the protocol.
            Ok(_) => {}
            Err(e) => {
                let _ = event_tx.send(TransportEvent::Error(e.to_string()));
                return;
            }
        }
    }
    let _ = event_tx.send(TransportEvent::Closed(None));
}

#[async_trait::async_trait]
impl StreamTransport for WebSocketTransport {
    async fn send(&self, text: String) -> Result<()> {
        let mut write = self.write.lock().await;
        write
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| ZetaError::Transport(format!("websocket send failed: {e}")).into())
    }

    async fn close(&self) -> Result<()> {
        let mut write = self.write.lock().await;
        write
            .send(Message::Close(None))
            .await
            .map_err(|e| ZetaError::Transport(format!("websocket close failed: {e}")).into())
    }

    fn events(&self) -> Pin<Box<dyn Stream<Item = TransportEvent> + Send + '_>> {
        let rx = Arc::clone(&self.event_rx);
        Box::pin(futures::stream::unfold(rx, |rx| async move {
            let mut guard = rx.lock().await;
            let item = guard.recv().await?;
            drop(guard);
            Some((item, rx))
        }))
    }
}
