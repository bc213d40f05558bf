//! Client configuration
//!
//! Configuration for the REST facade and the streaming channel. The
//! defaults target the production broker backend; integration tests
//! override the URLs to point at local fixtures.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, ZetaError};

/// Default REST host.
pub const DEFAULT_API_BASE_URL: &str = "https://api.traderepublic.com";

/// Default streaming websocket endpoint.
pub const DEFAULT_WEBSOCKET_URL: &str = "wss://api.traderepublic.com";

/// Default `Accept-Language` / handshake locale.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Client version advertised in the streaming handshake payload.
pub const DEFAULT_CLIENT_VERSION: &str = "3.151.3";

/// Configuration for a [`Client`](crate::client::Client).
///
/// # Examples
///
/// ```
/// use zetatrade::config::ClientConfig;
///
/// let config = ClientConfig::new("de").unwrap();
/// assert_eq!(config.language, "de");
/// config.validate().unwrap();
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL for all REST paths.
    pub api_base_url: Url,

    /// Websocket endpoint for the streaming channel.
    pub websocket_url: Url,

    /// Language tag used for `Accept-Language` and the handshake locale.
    pub language: String,

    /// Dotted client version advertised in the handshake payload.
    pub client_version: String,

    /// Per-request timeout for REST calls, in seconds.
    pub request_timeout_secs: u64,

    /// Timeout for establishing the streaming channel (websocket upgrade
    /// plus handshake frame), in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            // Compiled-in constants parse unconditionally.
            api_base_url: Url::parse(DEFAULT_API_BASE_URL).expect("default api url is valid"),
            websocket_url: Url::parse(DEFAULT_WEBSOCKET_URL).expect("default ws url is valid"),
            language: DEFAULT_LANGUAGE.to_string(),
            client_version: DEFAULT_CLIENT_VERSION.to_string(),
            request_timeout_secs: 30,
            connect_timeout_secs: 30,
        }
    }
}

impl ClientConfig {
    /// Create a configuration with the default endpoints and the given
    /// language tag.
    ///
    /// # Errors
    ///
    /// Returns [`ZetaError::Config`] if the language tag is empty.
    pub fn new(language: impl Into<String>) -> Result<Self> {
        let language = language.into();
        let config = Self {
            language,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ZetaError::Config`] when:
    /// - `language` or `client_version` is empty
    /// - a timeout is zero
    /// - `websocket_url` does not use a websocket scheme
    pub fn validate(&self) -> Result<()> {
        if self.language.trim().is_empty() {
            return Err(ZetaError::Config("language must not be empty".to_string()).into());
        }
        if self.client_version.trim().is_empty() {
            return Err(ZetaError::Config("client_version must not be empty".to_string()).into());
        }
        if self.request_timeout_secs == 0 || self.connect_timeout_secs == 0 {
            return Err(ZetaError::Config("timeouts must be non-zero".to_string()).into());
        }
        match self.websocket_url.scheme() {
            "ws" | "wss" => {}
            other => {
                return Err(ZetaError::Config(format!(
                    "websocket_url scheme must be ws or wss, got {other}"
                ))
                .into());
            }
        }
        Ok(())
    }
}
