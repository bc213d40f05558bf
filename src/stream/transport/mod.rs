//! Streaming transport abstraction and implementations
//!
//! This module defines the [`StreamTransport`] trait the engine consumes.
//! Concrete implementations live in submodules:
//!
//! - [`websocket::WebSocketTransport`] -- production transport over a
//!   secure websocket, carrying the session cookies and origin as
//!   upgrade headers.
//! - [`fake::FakeStreamTransport`] -- in-process fake used in tests
//!   (cfg(test) only).
//!
//! # Design
//!
//! The trait is intentionally minimal: a full-duplex text-frame channel.
//! Callers `send` complete frame strings and consume a stream of
//! [`TransportEvent`]s for everything inbound (open, message, error,
//! close). The engine never inspects binary frames and must not assume
//! the channel is usable after an error or close event.

use std::pin::Pin;

use futures::Stream;

use crate::error::Result;

/// An inbound event from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The channel is open and ready for frames.
    Open,
    /// A complete inbound text frame.
    Message(String),
    /// An opaque transport-level error. The channel must be considered
    /// dead.
    Error(String),
    /// The channel closed, with the peer's close reason when available.
    Closed(Option<String>),
}

/// Abstraction over the full-duplex text-frame channel the streaming
/// engine drives.
///
/// Implementations exist for websockets and, in tests, an in-process
/// fake. The engine owns its transport exclusively; no caller may send
/// on the underlying channel directly.
#[async_trait::async_trait]
pub trait StreamTransport: Send + Sync + std::fmt::Debug {
    /// Send a complete text frame to the peer.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::ZetaError::Transport`] if the underlying
    /// channel has failed or closed.
    async fn send(&self, text: String) -> Result<()>;

    /// Close the channel. Best-effort; subsequent sends fail.
    async fn close(&self) -> Result<()>;

    /// Returns the stream of inbound [`TransportEvent`]s.
    ///
    /// The stream yields `Open` once when the channel is established,
    /// then `Message` items, and finally `Error` and/or `Closed`, after
    /// which it ends.
    fn events(&self) -> Pin<Box<dyn Stream<Item = TransportEvent> + Send + '_>>;
}

pub mod websocket;

#[cfg(test)]
pub mod fake;
