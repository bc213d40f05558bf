//! Login session state machine
//!
//! The broker uses a two-step login: `initiate` posts phone number and
//! PIN and opens an OTP challenge; `complete` posts the OTP and
//! establishes the session cookies. [`SessionManager`] holds the state
//! between the steps and the cookies afterwards; the HTTP itself is
//! executed by [`RestClient`](crate::rest::RestClient) under the
//! [`Client`](crate::client::Client) facade.
//!
//! Misuse (completing a login that was never initiated, adopting an
//! empty cookie list) fails synchronously, before any I/O.

use serde::Deserialize;

use crate::error::{Result, ZetaError};

/// Server response to a login initiation.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginChallenge {
    /// Opaque identifier of the pending login process.
    #[serde(rename = "processId")]
    pub process_id: String,

    /// Seconds until the OTP expires.
    #[serde(rename = "countdownInSeconds", default)]
    pub countdown_in_seconds: u64,

    /// Which second-factor channel the server chose (e.g. SMS or app).
    #[serde(rename = "2fa", default)]
    pub two_factor: Option<String>,
}

/// Where the login flow currently stands.
#[derive(Debug)]
enum SessionState {
    LoggedOut,
    AwaitingOtp {
        process_id: String,
        initial_cookies: Vec<String>,
    },
    Authenticated {
        cookies: Vec<String>,
    },
}

/// Holds login-flow state and the session cookies.
///
/// Cookies are opaque `name=value` strings, immutable once set, carried
/// verbatim on REST calls and the streaming upgrade. They are created by
/// OTP completion (or adopted via [`SessionManager::adopt_cookies`]) and
/// destroyed by [`SessionManager::logout`].
#[derive(Debug)]
pub struct SessionManager {
    state: SessionState,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionManager {
    /// Create a logged-out session.
    pub fn new() -> Self {
        Self {
            state: SessionState::LoggedOut,
        }
    }

    /// Record a freshly initiated login challenge. Restarting a pending
    /// flow is allowed; the previous challenge is discarded.
    pub fn begin_challenge(&mut self, process_id: String, initial_cookies: Vec<String>) {
        self.state = SessionState::AwaitingOtp {
            process_id,
            initial_cookies,
        };
    }

    /// The pending challenge's process id and initial cookies.
    ///
    /// # Errors
    ///
    /// Returns [`ZetaError::Misuse`] when no login has been initiated or
    /// the initiation yielded no cookies. Checked before any I/O.
    pub fn challenge(&self) -> Result<(&str, &[String])> {
        match &self.state {
            SessionState::AwaitingOtp {
                process_id,
                initial_cookies,
            } => {
                if initial_cookies.is_empty() {
                    return Err(ZetaError::Misuse(
                        "login initiation yielded no cookies; cannot complete".to_string(),
                    )
                    .into());
                }
                Ok((process_id.as_str(), initial_cookies.as_slice()))
            }
            _ => Err(ZetaError::Misuse(
                "complete_login called before initiate_login".to_string(),
            )
            .into()),
        }
    }

    /// Transition to authenticated with the session cookies the server
    /// set on OTP completion.
    ///
    /// # Errors
    ///
    /// Returns [`ZetaError::Protocol`] when the cookie list is empty;
    /// a session without cookies cannot authenticate anything.
    pub fn authenticate(&mut self, cookies: Vec<String>) -> Result<()> {
        if cookies.is_empty() {
            return Err(ZetaError::Protocol(
                "login completion carried no session cookies".to_string(),
            )
            .into());
        }
        self.state = SessionState::Authenticated { cookies };
        Ok(())
    }

    /// Bypass the login flow by adopting a pre-existing cookie sequence.
    ///
    /// # Errors
    ///
    /// Returns [`ZetaError::Misuse`] when the list is empty.
    pub fn adopt_cookies(&mut self, cookies: Vec<String>) -> Result<()> {
        if cookies.is_empty() {
            return Err(
                ZetaError::Misuse("login_with_cookies requires a non-empty list".to_string())
                    .into(),
            );
        }
        self.state = SessionState::Authenticated { cookies };
        Ok(())
    }

    /// Whether session cookies are currently held.
    pub fn is_authenticated(&self) -> bool {
        matches!(self.state, SessionState::Authenticated { .. })
    }

    /// The session cookies, when authenticated.
    pub fn session_cookies(&self) -> Option<&[String]> {
        match &self.state {
            SessionState::Authenticated { cookies } => Some(cookies.as_slice()),
            _ => None,
        }
    }

    /// Drop all credentials and return to logged-out.
    pub fn logout(&mut self) {
        self.state = SessionState::LoggedOut;
    }
}
