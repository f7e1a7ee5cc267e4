//! Authentication — credentials, session tokens, session providers.
//!
//! The broker's web login is a two-step exchange: phone number + PIN start a
//! login process, and the verification code sent to the user's device
//! completes it. The result is the `tr_session` cookie, which the WS client
//! injects into every subscribe body.
//!
//! The token is never printed: [`SessionToken`]'s `Debug` is redacted and the
//! raw value is only reachable through [`SessionToken::expose`].

#[cfg(feature = "native")]
pub mod client;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AuthError;

// ============================================================================
// Session token
// ============================================================================

/// Opaque session token.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Raw token value, for injection into requests.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(***)")
    }
}

// ============================================================================
// Credentials
// ============================================================================

/// Login credentials.
#[derive(Clone)]
pub struct Credentials {
    pub phone_number: String,
    pub pin: String,
}

impl Credentials {
    pub fn new(phone_number: impl Into<String>, pin: impl Into<String>) -> Self {
        Self {
            phone_number: phone_number.into(),
            pin: pin.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("phone_number", &self.phone_number)
            .field("pin", &"***")
            .finish()
    }
}

// ============================================================================
// Session providers
// ============================================================================

/// Anything that can yield a session token.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn session(&self) -> Result<SessionToken, AuthError>;
}

/// A provider for an already known token.
#[derive(Debug, Clone)]
pub struct StaticSession(SessionToken);

impl StaticSession {
    pub fn new(token: SessionToken) -> Self {
        Self(token)
    }
}

#[async_trait]
impl SessionProvider for StaticSession {
    async fn session(&self) -> Result<SessionToken, AuthError> {
        Ok(self.0.clone())
    }
}

// ============================================================================
// Wire types
// ============================================================================

/// Body of `POST /api/v1/auth/web/login`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub phone_number: String,
    pub pin: String,
}

impl From<&Credentials> for LoginRequest {
    fn from(c: &Credentials) -> Self {
        Self {
            phone_number: c.phone_number.clone(),
            pin: c.pin.clone(),
        }
    }
}

/// Response to the login request: the process awaiting a verification code.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub process_id: String,
    #[serde(default)]
    pub countdown_in_seconds: Option<u64>,
    #[serde(default, rename = "2fa")]
    pub two_factor: Option<String>,
}

/// A login waiting for its verification code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginChallenge {
    pub process_id: String,
    /// Seconds until the code expires, when the server reports it.
    pub countdown_secs: Option<u64>,
    /// Delivery channel of the code (e.g. `SMS`, `APP`).
    pub channel: Option<String>,
}

impl From<LoginResponse> for LoginChallenge {
    fn from(r: LoginResponse) -> Self {
        Self {
            process_id: r.process_id,
            countdown_secs: r.countdown_in_seconds,
            channel: r.two_factor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_token_debug_is_redacted() {
        let token = SessionToken::new("super-secret");
        assert_eq!(format!("{:?}", token), "SessionToken(***)");
        assert_eq!(token.expose(), "super-secret");
    }

    #[test]
    fn test_credentials_debug_hides_pin() {
        let creds = Credentials::new("+4912345", "9876");
        let text = format!("{:?}", creds);
        assert!(text.contains("+4912345"));
        assert!(!text.contains("9876"));
    }

    #[test]
    fn test_login_wire_shapes() {
        let body = serde_json::to_value(LoginRequest::from(&Credentials::new("+49", "0000"))).unwrap();
        assert_eq!(body, serde_json::json!({"phoneNumber": "+49", "pin": "0000"}));

        let resp: LoginResponse = serde_json::from_str(
            r#"{"processId":"p-1","countdownInSeconds":30,"2fa":"SMS"}"#,
        )
        .unwrap();
        let challenge = LoginChallenge::from(resp);
        assert_eq!(challenge.process_id, "p-1");
        assert_eq!(challenge.countdown_secs, Some(30));
        assert_eq!(challenge.channel.as_deref(), Some("SMS"));
    }

    #[tokio::test]
    async fn test_static_session() {
        let provider = StaticSession::new(SessionToken::new("t"));
        assert_eq!(provider.session().await.unwrap().expose(), "t");
    }
}
