//! Streaming subscription engine
//!
//! The streaming side of the SDK: a single long-lived text-frame channel
//! carrying many concurrent subscriptions. Each subscription yields an
//! initial JSON snapshot followed by textual patch updates that are
//! applied to the raw snapshot text.
//!
//! # Module Layout
//!
//! - `transport` -- the [`StreamTransport`](transport::StreamTransport)
//!   trait and implementations (websocket, test fake)
//! - `frame`     -- line-frame codec (`connect`/`sub`/`unsub` out,
//!   `(id, kind, payload)` in)
//! - `delta`     -- pure textual delta patcher
//! - `registry`  -- id allocation and id → consumer routing
//! - `events`    -- lifecycle event bus
//! - `engine`    -- the [`StreamingEngine`] composition root

pub mod delta;
pub mod engine;
pub mod events;
pub mod frame;
pub mod registry;
pub mod transport;

pub use engine::{ConnectionState, StreamingEngine};
pub use events::{ListenerId, StreamEvent};
pub use registry::{SubscriptionCallback, SubscriptionUpdate};
