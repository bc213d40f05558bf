//! ZetaTrade - Unofficial async client SDK for the Zeta retail-broker API
//!
//! This library provides a client for the broker's two surfaces: a small
//! authenticated REST facade (phone/PIN + OTP login and a handful of
//! read-only endpoints) and a long-lived streaming channel carrying many
//! concurrent subscriptions, each yielding an initial JSON snapshot
//! followed by textual patch updates.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `client`: Top-level facade: login flow, REST getters, streaming handle
//! - `auth`:   Login session state machine and ECDSA request signing
//! - `rest`:   REST request execution and Set-Cookie extraction
//! - `stream`: The streaming subscription engine (transport, framing,
//!   delta patching, id routing)
//! - `config`: Endpoint and behaviour configuration
//! - `error`:  Error types and result aliases
//!
//! # Example
//!
//! ```no_run
//! use zetatrade::Client;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut client = Client::new(Some("en"))?;
//!     client.login_with_cookies(vec!["session=abc".to_string()])?;
//!
//!     let streaming = client.streaming()?;
//!     streaming.connect().await?;
//!     let id = streaming.subscribe(
//!         serde_json::json!({"type": "ticker", "id": "US0378331005.LSX"}),
//!         |update| println!("{update:?}"),
//!     )?;
//!     println!("subscribed as {id}");
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod rest;
pub mod stream;

// Re-export commonly used types
pub use auth::{DeviceKeyPair, LoginChallenge, SessionManager};
pub use client::Client;
pub use config::ClientConfig;
pub use error::{Result, ZetaError};
pub use stream::{ConnectionState, StreamEvent, StreamingEngine, SubscriptionUpdate};
