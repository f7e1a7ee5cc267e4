//! Web login over HTTP.

use async_trait::async_trait;

use crate::auth::{
    Credentials, LoginChallenge, LoginRequest, LoginResponse, SessionProvider, SessionToken,
};
use crate::error::{AuthError, HttpError};
use crate::http::{ApiHttp, RetryPolicy};
use crate::network;

/// Performs the two-step web login.
#[derive(Clone)]
pub struct AuthClient {
    http: ApiHttp,
}

impl AuthClient {
    pub fn new(api_url: &str) -> Result<Self, AuthError> {
        Ok(Self {
            http: ApiHttp::new(api_url)?,
        })
    }

    /// Start a login; the server sends a verification code to the user.
    pub async fn start_login(&self, credentials: &Credentials) -> Result<LoginChallenge, AuthError> {
        let response = self
            .http
            .post::<LoginResponse, _>(
                "/api/v1/auth/web/login",
                &LoginRequest::from(credentials),
                RetryPolicy::None,
            )
            .await
            .map_err(|e| match e {
                HttpError::Unauthorized | HttpError::BadRequest(_) => {
                    AuthError::LoginFailed(e.to_string())
                }
                other => AuthError::Http(other),
            })?;

        let challenge = LoginChallenge::from(response.body);
        tracing::info!(
            "Login started, verification code sent via {}",
            challenge.channel.as_deref().unwrap_or("unknown channel")
        );
        Ok(challenge)
    }

    /// Complete a login with the verification code and extract the session.
    pub async fn complete_login(
        &self,
        challenge: &LoginChallenge,
        code: &str,
    ) -> Result<SessionToken, AuthError> {
        let path = format!(
            "/api/v1/auth/web/login/{}/{}",
            challenge.process_id,
            code.trim()
        );
        let response = self
            .http
            .post::<serde_json::Value, _>(&path, &serde_json::json!({}), RetryPolicy::None)
            .await
            .map_err(|e| match e {
                HttpError::Unauthorized | HttpError::BadRequest(_) | HttpError::NotFound(_) => {
                    AuthError::VerificationFailed(e.to_string())
                }
                other => AuthError::Http(other),
            })?;

        let token = response
            .cookie(network::SESSION_COOKIE)
            .filter(|v| !v.is_empty())
            .ok_or(AuthError::MissingSession)?;
        tracing::info!("Login completed");
        Ok(SessionToken::new(token))
    }
}

/// Source of the verification code (a terminal prompt, a test stub).
pub trait CodePrompt: Send + Sync {
    fn verification_code(&self, challenge: &LoginChallenge) -> Result<String, AuthError>;
}

impl<F> CodePrompt for F
where
    F: Fn(&LoginChallenge) -> Result<String, AuthError> + Send + Sync,
{
    fn verification_code(&self, challenge: &LoginChallenge) -> Result<String, AuthError> {
        self(challenge)
    }
}

/// [`SessionProvider`] that runs the full interactive login.
pub struct InteractiveLogin<P> {
    auth: AuthClient,
    credentials: Credentials,
    prompt: P,
}

impl<P: CodePrompt> InteractiveLogin<P> {
    pub fn new(auth: AuthClient, credentials: Credentials, prompt: P) -> Self {
        Self {
            auth,
            credentials,
            prompt,
        }
    }
}

#[async_trait]
impl<P: CodePrompt> SessionProvider for InteractiveLogin<P> {
    async fn session(&self) -> Result<SessionToken, AuthError> {
        let challenge = self.auth.start_login(&self.credentials).await?;
        let code = self.prompt.verification_code(&challenge)?;
        self.auth.complete_login(&challenge, &code).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_is_a_code_prompt() {
        let prompt = |c: &LoginChallenge| Ok::<_, AuthError>(format!("code-for-{}", c.process_id));
        let challenge = LoginChallenge {
            process_id: "p1".into(),
            countdown_secs: None,
            channel: None,
        };
        assert_eq!(prompt.verification_code(&challenge).unwrap(), "code-for-p1");
    }
}
