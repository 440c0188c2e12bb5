use anyhow::Result;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info_span, warn, Instrument};

use super::{backend_error_message, client, endpoint_url, BackendConfig, API_KEY_HEADER};
use crate::gate::{
    IdentityProvider, Identity, ProviderError, Session, SessionHub, SessionSubscription,
    SignInError,
};

#[derive(Deserialize)]
struct UserResponse {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    user: UserResponse,
}

/// Map a failed password grant onto the closed set of sign-in failures.
fn classify_sign_in_failure(status: StatusCode, message: &str) -> SignInError {
    let lowered = message.to_lowercase();
    if status == StatusCode::TOO_MANY_REQUESTS
        || lowered.contains("too many requests")
        || lowered.contains("rate limit")
    {
        SignInError::RateLimited
    } else if lowered.contains("invalid login credentials") {
        SignInError::InvalidCredentials
    } else if lowered.contains("email not confirmed") {
        SignInError::EmailNotConfirmed
    } else if status.is_server_error() {
        SignInError::Unavailable(format!("{status}, {message}"))
    } else {
        SignInError::Rejected(format!("{status}, {message}"))
    }
}

/// Identity provider speaking the hosted backend's `/auth/v1` API.
///
/// The current session lives in a [`SessionHub`]; sign-in and sign-out publish to
/// it, so subscribers see every change made through this adapter.
#[derive(Debug)]
pub struct HttpIdentityProvider {
    config: BackendConfig,
    client: Client,
    hub: SessionHub,
    token_url: String,
    user_url: String,
    logout_url: String,
}

impl HttpIdentityProvider {
    /// # Errors
    /// Returns an error if the backend URL is invalid or the HTTP client cannot be built.
    pub fn new(config: BackendConfig) -> Result<Self> {
        let token_url = endpoint_url(config.url(), "/auth/v1/token")?;
        let user_url = endpoint_url(config.url(), "/auth/v1/user")?;
        let logout_url = endpoint_url(config.url(), "/auth/v1/logout")?;

        Ok(Self {
            config,
            client: client()?,
            hub: SessionHub::new(),
            token_url,
            user_url,
            logout_url,
        })
    }

    /// The session store shared with [`super::HttpAdminDirectory`].
    #[must_use]
    pub fn hub(&self) -> &SessionHub {
        &self.hub
    }
}

impl IdentityProvider for HttpIdentityProvider {
    async fn current_session(&self) -> Result<Option<Session>, ProviderError> {
        let Some(session) = self.hub.current() else {
            return Ok(None);
        };

        let span = info_span!("auth.user", http.method = "GET", url = %self.user_url);
        let response = self
            .client
            .get(&self.user_url)
            .header(API_KEY_HEADER, self.config.anon_key())
            .bearer_auth(session.access_token())
            .send()
            .instrument(span)
            .await
            .map_err(|err| ProviderError(err.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            debug!("stored session rejected by the backend");
            self.hub.publish(None);
            return Ok(None);
        }
        if !status.is_success() {
            let json_response: Value = response.json().await.unwrap_or(Value::Null);
            return Err(ProviderError(format!(
                "{} - {}, {}",
                self.user_url,
                status,
                backend_error_message(&json_response)
            )));
        }

        let user: UserResponse = response
            .json()
            .await
            .map_err(|err| ProviderError(err.to_string()))?;
        let email = user.email.unwrap_or_else(|| session.user.email.clone());
        Ok(Some(Session::new(
            Identity::new(user.id, &email),
            SecretString::from(session.access_token().to_string()),
        )))
    }

    fn subscribe(&self) -> SessionSubscription {
        self.hub.subscribe()
    }

    async fn sign_in(&self, email: &str, password: &SecretString) -> Result<Session, SignInError> {
        let span = info_span!("auth.sign_in", http.method = "POST", url = %self.token_url);
        let response = self
            .client
            .post(&self.token_url)
            .query(&[("grant_type", "password")])
            .header(API_KEY_HEADER, self.config.anon_key())
            .json(&json!({
                "email": email,
                "password": password.expose_secret(),
            }))
            .send()
            .instrument(span)
            .await
            .map_err(|err| SignInError::Unavailable(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let json_response: Value = response.json().await.unwrap_or(Value::Null);
            return Err(classify_sign_in_failure(
                status,
                backend_error_message(&json_response),
            ));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|err| SignInError::Unavailable(err.to_string()))?;
        let user_email = token.user.email.as_deref().unwrap_or(email);
        let session = Session::new(
            Identity::new(token.user.id, user_email),
            SecretString::from(token.access_token),
        );

        self.hub.publish(Some(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        let Some(session) = self.hub.current() else {
            return Ok(());
        };

        let span = info_span!("auth.sign_out", http.method = "POST", url = %self.logout_url);
        let response = self
            .client
            .post(&self.logout_url)
            .header(API_KEY_HEADER, self.config.anon_key())
            .bearer_auth(session.access_token())
            .send()
            .instrument(span)
            .await
            .map_err(|err| ProviderError(err.to_string()))?;

        let status = response.status();
        // An expired or unknown token means the backend already forgot the session.
        let already_gone = status == StatusCode::UNAUTHORIZED || status == StatusCode::NOT_FOUND;
        if !status.is_success() && !already_gone {
            let json_response: Value = response.json().await.unwrap_or(Value::Null);
            warn!("sign-out rejected: {status}");
            return Err(ProviderError(format!(
                "{} - {}, {}",
                self.logout_url,
                status,
                backend_error_message(&json_response)
            )));
        }

        self.hub.publish(None);
        Ok(())
    }
}
