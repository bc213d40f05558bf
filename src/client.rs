//! Top-level client facade
//!
//! [`Client`] ties the pieces together: configuration, the two-step
//! login flow, the read-only REST endpoints, and construction of the
//! streaming engine once a session exists.
//!
//! # Example
//!
//! ```no_run
//! use zetatrade::Client;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut client = Client::new(Some("en"))?;
//!     let challenge = client.initiate_login("+4915501234567", "1234").await?;
//!     println!("OTP sent via {:?}, {}s left", challenge.two_factor, challenge.countdown_in_seconds);
//!
//!     client.complete_login("9876").await?;
//!
//!     let streaming = client.streaming()?;
//!     streaming.connect().await?;
//!     streaming.subscribe(
//!         serde_json::json!({"type": "ticker", "id": "US0378331005.LSX"}),
//!         |update| println!("{update:?}"),
//!     )?;
//!     Ok(())
//! }
//! ```

use serde_json::{json, Value};

use crate::auth::session::{LoginChallenge, SessionManager};
use crate::auth::sign::DeviceKeyPair;
use crate::config::ClientConfig;
use crate::error::{Result, ZetaError};
use crate::rest::{cookies, RestClient};
use crate::stream::StreamingEngine;

/// Client for the broker's REST facade and streaming channel.
pub struct Client {
    config: ClientConfig,
    rest: RestClient,
    session: SessionManager,
    device_keys: Option<DeviceKeyPair>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("language", &self.config.language)
            .field("authenticated", &self.is_authenticated())
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Create a client, optionally overriding the default language.
    pub fn new(language: Option<&str>) -> Result<Self> {
        let config = match language {
            Some(language) => ClientConfig::new(language)?,
            None => ClientConfig::default(),
        };
        Self::with_config(config)
    }

    /// Create a client from an explicit configuration.
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let rest = RestClient::new(&config)?;
        Ok(Self {
            config,
            rest,
            session: SessionManager::new(),
            device_keys: None,
        })
    }

    /// Attach device-pairing keys. Subsequent REST calls are signed with
    /// `X-Zeta-Timestamp` / `X-Zeta-Signature` headers. The web-login
    /// flow itself is never signed.
    pub fn with_device_keys(mut self, keys: DeviceKeyPair) -> Self {
        self.device_keys = Some(keys);
        self
    }

    /// Start the login flow: post phone number and PIN, receive an OTP
    /// challenge.
    ///
    /// On success the client is awaiting the OTP; call
    /// [`Client::complete_login`] with it.
    pub async fn initiate_login(&mut self, phone_number: &str, pin: &str) -> Result<LoginChallenge> {
        let payload = json!({"phoneNumber": phone_number, "pin": pin});
        let response = self
            .rest
            .post("/api/v1/auth/web/login", &payload, &[], None)
            .await?;

        let initial_cookies = cookies::extract_cookies(&response);
        let challenge: LoginChallenge = response.json().await?;

        self.session
            .begin_challenge(challenge.process_id.clone(), initial_cookies);
        Ok(challenge)
    }

    /// Finish the login flow with the one-time password.
    ///
    /// # Errors
    ///
    /// Returns [`ZetaError::Misuse`] (before any I/O) when no login was
    /// initiated or the initiation yielded no cookies.
    pub async fn complete_login(&mut self, otp: &str) -> Result<()> {
        let (path, initial_cookies) = {
            let (process_id, initial_cookies) = self.session.challenge()?;
            (
                format!("/api/v1/auth/web/login/{process_id}/{otp}"),
                initial_cookies.to_vec(),
            )
        };

        let response = self
            .rest
            .post(&path, &json!({}), &initial_cookies, None)
            .await?;

        let session_cookies = cookies::extract_cookies(&response);
        self.session.authenticate(session_cookies)
    }

    /// Bypass the login flow by adopting a pre-existing cookie sequence
    /// (e.g. restored by the caller from its own storage).
    ///
    /// # Errors
    ///
    /// Returns [`ZetaError::Misuse`] when the list is empty.
    pub fn login_with_cookies(&mut self, cookies: Vec<String>) -> Result<()> {
        self.session.adopt_cookies(cookies)
    }

    /// Whether session cookies are currently held.
    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    /// The current session cookies. Empty when not authenticated.
    /// Persisting them between runs is the caller's concern.
    pub fn session_cookies(&self) -> &[String] {
        self.session.session_cookies().unwrap_or(&[])
    }

    /// End the session: best-effort logout against the backend, then
    /// drop the local credentials. The local state is cleared even when
    /// the server call fails (the session may already be dead).
    pub async fn logout(&mut self) -> Result<()> {
        if let Some(cookies) = self.session.session_cookies() {
            let cookies = cookies.to_vec();
            if let Err(e) = self
                .rest
                .post("/api/v1/auth/web/logout", &json!({}), &cookies, None)
                .await
            {
                tracing::warn!("server logout failed, clearing local session anyway: {e}");
            }
        }
        self.session.logout();
        Ok(())
    }

    /// Build a streaming engine carrying the current session cookies.
    ///
    /// # Errors
    ///
    /// Returns [`ZetaError::Misuse`] when not authenticated.
    pub fn streaming(&self) -> Result<StreamingEngine> {
        let cookies = self
            .session
            .session_cookies()
            .ok_or_else(|| ZetaError::Misuse("streaming requires login".to_string()))?;
        Ok(StreamingEngine::new(&self.config, cookies.to_vec()))
    }

    // -----------------------------------------------------------------
    // Read-only REST endpoints
    // -----------------------------------------------------------------

    /// Account information (`/api/v2/auth/account`).
    pub async fn account_info(&self) -> Result<Value> {
        self.authed_get("/api/v2/auth/account").await
    }

    /// Currently trending stocks (`/api/v1/ranking/trendingStocks`).
    pub async fn trending_stocks(&self) -> Result<Value> {
        self.authed_get("/api/v1/ranking/trendingStocks").await
    }

    /// Tax exemption orders (`/api/v1/taxes/exemptionorders`).
    pub async fn tax_exemption_orders(&self) -> Result<Value> {
        self.authed_get("/api/v1/taxes/exemptionorders").await
    }

    /// Personal details (`/api/v1/customer/personal-details`).
    pub async fn personal_details(&self) -> Result<Value> {
        self.authed_get("/api/v1/customer/personal-details").await
    }

    /// Payment methods (`/api/v2/payment/methods`).
    pub async fn payment_methods(&self) -> Result<Value> {
        self.authed_get("/api/v2/payment/methods").await
    }

    /// Tax residencies (`/api/v1/country/taxresidency`).
    pub async fn tax_residencies(&self) -> Result<Value> {
        self.authed_get("/api/v1/country/taxresidency").await
    }

    /// Tax information (`/api/v1/taxes/information`).
    pub async fn tax_information(&self) -> Result<Value> {
        self.authed_get("/api/v1/taxes/information").await
    }

    /// All documents (`/api/v1/documents/all`).
    pub async fn documents(&self) -> Result<Value> {
        self.authed_get("/api/v1/documents/all").await
    }

    /// GET an authenticated endpoint and return the opaque JSON body.
    /// Payload shape validation is the caller's concern.
    async fn authed_get(&self, path: &str) -> Result<Value> {
        let cookies = self
            .session
            .session_cookies()
            .ok_or_else(|| ZetaError::Misuse(format!("{path} requires login")))?;
        let response = self
            .rest
            .get(path, cookies, self.device_keys.as_ref())
            .await?;
        Ok(response.json().await?)
    }
}
