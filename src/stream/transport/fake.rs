//! In-process fake transport for streaming-engine tests
//!
//! Provides [`FakeStreamTransport`] and [`FakeTransportHandle`], an
//! in-process pair that replaces the websocket in tests.
//!
//! # Channel wiring
//!
//! From the engine's perspective:
//!
//! - "outbound" = frames the engine sends = what the test reads via
//!   `handle.outbound_rx`.
//! - "events" = what the engine receives = what the test injects via the
//!   handle's helpers (`open`, `server_frame`, `fail`, `close`).
//!
//! ```text
//! engine send() ------> outbound_tx ----> outbound_rx (handle reads)
//! handle.server_frame -> event_tx ------> events()    (engine reads)
//! ```

use std::pin::Pin;
use std::sync::Arc;

use futures::Stream;
use tokio::sync::{mpsc, Mutex};

use crate::error::Result;
use crate::stream::transport::{StreamTransport, TransportEvent};

/// In-process fake transport for use in tests.
///
/// Implements the full [`StreamTransport`] trait over in-memory
/// channels, so tests can drive the engine without a network.
#[derive(Debug)]
pub struct FakeStreamTransport {
    outbound_tx: mpsc::UnboundedSender<String>,
    event_rx: Arc<Mutex<mpsc::UnboundedReceiver<TransportEvent>>>,
}

/// The test-side handle for a [`FakeStreamTransport`].
#[derive(Debug)]
pub struct FakeTransportHandle {
    /// Receives frames the engine sent via [`StreamTransport::send`].
    pub outbound_rx: mpsc::UnboundedReceiver<String>,
    /// Injects transport events into the engine's event stream.
    pub event_tx: mpsc::UnboundedSender<TransportEvent>,
}

impl FakeStreamTransport {
    /// Create a new `(FakeStreamTransport, FakeTransportHandle)` pair.
    ///
    /// No events are queued; tests call [`FakeTransportHandle::open`]
    /// to simulate the channel establishing.
    pub fn new() -> (Self, FakeTransportHandle) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let transport = Self {
            outbound_tx,
            event_rx: Arc::new(Mutex::new(event_rx)),
        };
        let handle = FakeTransportHandle {
            outbound_rx,
            event_tx,
        };
        (transport, handle)
    }
}

impl FakeTransportHandle {
    /// Simulate the channel opening.
    pub fn open(&self) {
        self.event_tx
            .send(TransportEvent::Open)
            .expect("fake transport event channel closed");
    }

    /// Inject an inbound server frame.
    pub fn server_frame(&self, line: impl Into<String>) {
        self.event_tx
            .send(TransportEvent::Message(line.into()))
            .expect("fake transport event channel closed");
    }

    /// Inject a transport error.
    pub fn fail(&self, error: impl Into<String>) {
        self.event_tx
            .send(TransportEvent::Error(error.into()))
            .expect("fake transport event channel closed");
    }

    /// Simulate the peer closing the channel.
    pub fn close(&self, reason: Option<String>) {
        self.event_tx
            .send(TransportEvent::Closed(reason))
            .expect("fake transport event channel closed");
    }
}

#[async_trait::async_trait]
impl StreamTransport for FakeStreamTransport {
    /// Record the outbound frame so the test can read it via
    /// [`FakeTransportHandle::outbound_rx`].
    async fn send(&self, text: String) -> Result<()> {
        self.outbound_tx.send(text).map_err(|e| {
            anyhow::anyhow!(crate::error::ZetaError::Transport(format!(
                "fake transport outbound channel closed: {e}"
            )))
        })
    }

    /// Dropping the outbound sender ends the test's `outbound_rx`.
    async fn close(&self) -> Result<()> {
        Ok(())
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

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::time::Duration;

    /// `send()` delivers the frame to `handle.outbound_rx` in order.
    #[tokio::test]
    async fn test_send_delivers_to_handle() {
        let (transport, mut handle) = FakeStreamTransport::new();

        transport.send("sub 1 {}".to_string()).await.unwrap();
        transport.send("sub 2 {}".to_string()).await.unwrap();

        assert_eq!(handle.outbound_rx.recv().await.unwrap(), "sub 1 {}");
        assert_eq!(handle.outbound_rx.recv().await.unwrap(), "sub 2 {}");
    }

    /// Injected events come out of `events()` in order.
    #[tokio::test]
    async fn test_injected_events_arrive_in_order() {
        let (transport, handle) = FakeStreamTransport::new();

        handle.open();
        handle.server_frame("1 A {}");
        handle.close(Some("bye".to_string()));

        let mut events = transport.events();
        assert_eq!(events.next().await.unwrap(), TransportEvent::Open);
        assert_eq!(
            events.next().await.unwrap(),
            TransportEvent::Message("1 A {}".to_string())
        );
        assert_eq!(
            events.next().await.unwrap(),
            TransportEvent::Closed(Some("bye".to_string()))
        );
    }

    /// `send()` fails once the handle is dropped.
    #[tokio::test]
    async fn test_send_fails_after_handle_dropped() {
        let (transport, handle) = FakeStreamTransport::new();
        drop(handle);
        assert!(transport.send("x".to_string()).await.is_err());
    }

    /// The event stream stays pending while no event is queued.
    #[tokio::test]
    async fn test_event_stream_initially_pending() {
        let (transport, _handle) = FakeStreamTransport::new();
        let mut events = transport.events();
        let result = tokio::time::timeout(Duration::from_millis(50), events.next()).await;
        assert!(result.is_err(), "expected timeout on empty event stream");
    }

    /// The fake satisfies the `StreamTransport` trait object bound.
    #[test]
    fn test_fake_transport_is_object_safe() {
        let (transport, _handle) = FakeStreamTransport::new();
        let _boxed: Box<dyn StreamTransport> = Box::new(transport);
    }
}
