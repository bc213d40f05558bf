//! REST request execution
//!
//! [`RestClient`] composes absolute URLs under the broker base host,
//! carries the session cookies as a single `Cookie` header, and wraps
//! non-2xx responses into [`ZetaError::Api`] with status, status text,
//! and body. When a device key pair is supplied, the request is signed
//! and the `X-Zeta-Timestamp` / `X-Zeta-Signature` headers are attached
//! (the web-login flow never is).

use reqwest::header::{ACCEPT_LANGUAGE, CONTENT_TYPE, COOKIE};
use reqwest::Method;
use serde_json::Value;
use url::Url;

use crate::auth::sign::{self, DeviceKeyPair};
use crate::config::ClientConfig;
use crate::error::{Result, ZetaError};

pub mod cookies;

/// Header carrying the millisecond timestamp of a signed request.
pub const HEADER_TIMESTAMP: &str = "X-Zeta-Timestamp";

/// Header carrying the base64 DER signature of a signed request.
pub const HEADER_SIGNATURE: &str = "X-Zeta-Signature";

/// Thin wrapper over `reqwest` for the broker's REST facade.
#[derive(Debug, Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base_url: Url,
    language: String,
}

impl RestClient {
    /// Build a client from the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ZetaError::Config`] if the underlying HTTP client
    /// cannot be constructed.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ZetaError::Config(format!("failed to build http client: {e}")))?;
        Ok(Self {
            http,
            base_url: config.api_base_url.clone(),
            language: config.language.clone(),
        })
    }

    /// Execute a GET. No body is sent.
    pub async fn get(
        &self,
        path: &str,
        cookies: &[String],
        signer: Option<&DeviceKeyPair>,
    ) -> Result<reqwest::Response> {
        self.execute(Method::GET, path, None, cookies, signer).await
    }

    /// Execute a POST with a JSON body.
    pub async fn post(
        &self,
        path: &str,
        payload: &Value,
        cookies: &[String],
        signer: Option<&DeviceKeyPair>,
    ) -> Result<reqwest::Response> {
        self.execute(Method::POST, path, Some(payload), cookies, signer)
            .await
    }

    /// Compose and send one request.
    ///
    /// # Errors
    ///
    /// - [`ZetaError::Api`] for any non-2xx response, carrying status,
    ///   status text, and the body text. A 401 from an expired session
    ///   is reported verbatim; retry policy belongs to the caller.
    /// - [`ZetaError::Http`] for connection-level failures.
    async fn execute(
        &self,
        method: Method,
        path: &str,
        payload: Option<&Value>,
        cookies: &[String],
        signer: Option<&DeviceKeyPair>,
    ) -> Result<reqwest::Response> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| ZetaError::Config(format!("invalid request path {path:?}: {e}")))?;

        let mut request = self
            .http
            .request(method, url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT_LANGUAGE, &self.language);

        if !cookies.is_empty() {
            request = request.header(COOKIE, cookies.join("; "));
        }

        if let Some(keys) = signer {
            // GET endpoints sign the empty object, matching what the
            // backend reconstructs for bodyless requests.
            let empty = Value::Object(serde_json::Map::new());
            let body = payload.unwrap_or(&empty);
            let signed = sign::sign_payload(keys.signing_key(), body)?;
            request = request
                .header(HEADER_TIMESTAMP, &signed.timestamp)
                .header(HEADER_SIGNATURE, &signed.signature);
        }

        if let Some(payload) = payload {
            request = request.json(payload);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let status_text = status.canonical_reason().unwrap_or("").to_string();
            let body = response.text().await.unwrap_or_default();
            return Err(ZetaError::Api {
                status: status.as_u16(),
                status_text,
                body,
            }
            .into());
        }
        Ok(response)
    }
}
