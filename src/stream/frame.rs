//! Line-frame codec for the streaming channel
//!
//! Frames are ASCII lines delimited on single spaces:
//!
//! | Direction | Frame       | Grammar                 |
//! |-----------|-------------|-------------------------|
//! | outbound  | Connect     | `connect 31 <json>`     |
//! | outbound  | Subscribe   | `sub <id> <json>`       |
//! | outbound  | Unsubscribe | `unsub <id> <json>`     |
//! | inbound   | Server      | `<id> <kind> <payload>` |
//!
//! Inbound `kind` is one of `A` (snapshot), `D` (delta), `C` (close).
//! `A` and `D` carry a payload; `C` carries none. The decoder splits on
//! the first two spaces only, so payloads keep embedded spaces verbatim.

use serde_json::Value;

use crate::error::ZetaError;

/// Identifier reserved for the handshake frame. Never allocated to a
/// data subscription.
pub const RESERVED_CONNECT_ID: u64 = 31;

/// Platform identifier sent in the handshake payload.
pub const PLATFORM_ID: &str = "webtrading";

/// Client identifier sent in the handshake payload.
pub const CLIENT_ID: &str = "app.traderepublic.com";

/// Kind discriminator of an inbound server frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// `A` — full JSON snapshot for a subscription.
    Snapshot,
    /// `D` — textual patch relative to the previous snapshot text.
    Delta,
    /// `C` — server-initiated close of a single subscription.
    Close,
}

impl FrameKind {
    /// The single-letter wire form of this kind.
    pub fn as_wire(self) -> &'static str {
        match self {
            FrameKind::Snapshot => "A",
            FrameKind::Delta => "D",
            FrameKind::Close => "C",
        }
    }
}

/// A decoded inbound frame: `(id, kind, payload)`.
///
/// `payload` is everything after the second space, unmodified; it is
/// empty for `C` frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundFrame {
    /// Subscription identifier the frame belongs to.
    pub id: u64,
    /// Frame kind discriminator.
    pub kind: FrameKind,
    /// Raw payload text, verbatim.
    pub payload: String,
}

/// Encode the handshake frame sent exactly once when the transport opens.
///
/// # Examples
///
/// ```
/// use zetatrade::stream::frame::connect_frame;
///
/// let frame = connect_frame("en", "3.151.3");
/// assert!(frame.starts_with("connect 31 {"));
/// ```
pub fn connect_frame(locale: &str, client_version: &str) -> String {
    let payload = serde_json::json!({
        "locale": locale,
        "platformId": PLATFORM_ID,
        "clientId": CLIENT_ID,
        "clientVersion": client_version,
    });
    format!("connect {RESERVED_CONNECT_ID} {payload}")
}

/// Encode a subscribe frame for `id` with the caller's opaque topic.
pub fn sub_frame(id: u64, topic: &Value) -> String {
    format!("sub {id} {topic}")
}

/// Encode an unsubscribe frame. The topic is echoed alongside the id.
pub fn unsub_frame(id: u64, topic: &Value) -> String {
    format!("unsub {id} {topic}")
}

/// Decode an inbound server frame into `(id, kind, payload)`.
///
/// The line is split on the first two spaces only; everything after the
/// second space is the payload, preserved verbatim (JSON payloads embed
/// spaces). `C` frames have no payload and decode with an empty one.
///
/// # Errors
///
/// Returns [`ZetaError::Protocol`] when the id is not a decimal integer,
/// the kind token is missing, or the kind is not one of `A`, `D`, `C`.
pub fn decode(line: &str) -> Result<InboundFrame, ZetaError> {
    let mut parts = line.splitn(3, ' ');

    let id_token = parts.next().unwrap_or("");
    let id: u64 = id_token
        .parse()
        .map_err(|_| ZetaError::Protocol(format!("frame id is not numeric: {id_token:?}")))?;

    let kind = match parts.next() {
        Some("A") => FrameKind::Snapshot,
        Some("D") => FrameKind::Delta,
        Some("C") => FrameKind::Close,
        Some(other) => {
            return Err(ZetaError::Protocol(format!("unknown frame kind: {other:?}")));
        }
        None => {
            return Err(ZetaError::Protocol(format!("frame has no kind: {line:?}")));
        }
    };

    let payload = parts.next().unwrap_or("").to_string();

    Ok(InboundFrame { id, kind, payload })
}
