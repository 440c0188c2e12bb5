//! Admin login flow.
//!
//! Flow Overview:
//! 1) Normalize the email (trim + lowercase) and validate both fields locally.
//! 2) Refuse early while the email is throttled.
//! 3) Sign in with the identity provider.
//! 4) Verify the email against the `admins` allow-list.
//!
//! Each stage exits early on failure. Failed sign-ins and "not an admin" outcomes
//! consume one attempt; validation errors and infrastructure faults never do.

use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

use super::config::AuthConfig;
use super::provider::{AdminDirectory, AdminLookup, IdentityProvider, ProviderError, SignInError};
use super::rate_limit::{RateLimitDecision, RateLimiter};
use super::types::{normalize_email, valid_email, AdminRecord};

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldErrors {
    pub email: Option<String>,
    pub password: Option<String>,
}

impl FieldErrors {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.password.is_none()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LoginError {
    #[error("login form is invalid")]
    Validation(FieldErrors),
    #[error("too many login attempts, retry in {}s", .remaining.as_secs())]
    RateLimited { remaining: Duration },
    #[error("sign-in failed: {0}")]
    Credentials(SignInError),
    #[error("signed in identity is not an admin")]
    NotAdmin,
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
    #[error("admin verification failed: {0}")]
    ServerError(String),
}

impl LoginError {
    /// Message shown to the user. Provider text never leaks through.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(_) => "Please fix the highlighted fields.".to_string(),
            Self::RateLimited { remaining } => {
                let minutes = remaining.as_millis().div_ceil(60_000);
                format!("Too many attempts. Try again in {minutes} min.")
            }
            Self::Credentials(SignInError::InvalidCredentials) => {
                "Invalid email or password.".to_string()
            }
            Self::Credentials(SignInError::EmailNotConfirmed) => {
                "Please confirm your email.".to_string()
            }
            Self::Credentials(SignInError::RateLimited) => {
                "Too many login attempts. Try later.".to_string()
            }
            Self::Credentials(_) => "Login failed. Please try again.".to_string(),
            Self::NotAdmin => "You are not an authorized admin.".to_string(),
            Self::Unavailable(_) => "Network error. Please try again.".to_string(),
            Self::ServerError(_) => "Server error. Please try again.".to_string(),
        }
    }

    /// Whether this outcome consumed one attempt for the email.
    #[must_use]
    pub fn counts_as_attempt(&self) -> bool {
        matches!(self, Self::Credentials(_) | Self::NotAdmin)
    }
}

/// Raw form input.
#[derive(Clone, Debug)]
pub struct LoginRequest {
    pub email: String,
    pub password: SecretString,
}

impl LoginRequest {
    #[must_use]
    pub fn new(email: impl Into<String>, password: SecretString) -> Self {
        Self {
            email: email.into(),
            password,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoginSuccess {
    pub admin: AdminRecord,
    /// Where to navigate next: the dashboard.
    pub redirect: String,
}

fn validate(email: &str, password: &SecretString) -> FieldErrors {
    let mut errors = FieldErrors::default();

    if email.is_empty() {
        errors.email = Some("Email is required".to_string());
    } else if !valid_email(email) {
        errors.email = Some("Invalid email".to_string());
    }

    let password = password.expose_secret();
    if password.is_empty() {
        errors.password = Some("Password is required".to_string());
    } else if password.chars().count() < MIN_PASSWORD_LEN {
        errors.password = Some("Password must be at least 6 characters".to_string());
    }

    errors
}

pub struct LoginFlow<P, D> {
    provider: Arc<P>,
    directory: Arc<D>,
    limiter: Arc<dyn RateLimiter>,
    config: AuthConfig,
}

impl<P, D> LoginFlow<P, D>
where
    P: IdentityProvider,
    D: AdminDirectory,
{
    /// `limiter` is the process-wide attempt tracker; share one instance between flows.
    pub fn new(
        provider: Arc<P>,
        directory: Arc<D>,
        limiter: Arc<dyn RateLimiter>,
        config: AuthConfig,
    ) -> Self {
        Self {
            provider,
            directory,
            limiter,
            config,
        }
    }

    /// Run one login submission.
    ///
    /// # Errors
    /// Returns the first stage that failed, see [`LoginError`].
    #[instrument(skip_all, fields(email = tracing::field::Empty))]
    pub async fn submit(&self, request: &LoginRequest) -> Result<LoginSuccess, LoginError> {
        let email = normalize_email(&request.email);
        tracing::Span::current().record("email", email.as_str());

        let errors = validate(&email, &request.password);
        if !errors.is_empty() {
            debug!("login form rejected locally");
            return Err(LoginError::Validation(errors));
        }

        if let RateLimitDecision::Limited { remaining } = self.limiter.check_email(&email) {
            warn!(remaining_secs = remaining.as_secs(), "login throttled");
            return Err(LoginError::RateLimited { remaining });
        }

        let result = self.authenticate(&email, &request.password).await;
        if let Err(err) = &result {
            if err.counts_as_attempt() {
                self.limiter.record_failure(&email);
            }
        }
        result
    }

    /// Sign in, then confirm the identity is on the allow-list.
    async fn authenticate(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<LoginSuccess, LoginError> {
        if let Err(err) = self.provider.sign_in(email, password).await {
            if err.is_infrastructure() {
                error!("sign-in transport failure: {err}");
                return Err(LoginError::Unavailable(err.to_string()));
            }
            warn!("sign-in failed: {err}");
            return Err(LoginError::Credentials(err));
        }

        match self.directory.lookup_admin_by_email(email).await {
            Ok(AdminLookup::Found(admin)) => {
                info!("admin login succeeded");
                Ok(LoginSuccess {
                    admin,
                    redirect: self.config.dashboard_path().to_string(),
                })
            }
            Ok(AdminLookup::NotFound) => {
                warn!("signed in identity is not on the admin allow-list");
                self.sign_out_quietly().await;
                Err(LoginError::NotAdmin)
            }
            Err(err) => {
                error!("Admin check error: {err}");
                if self.config.sign_out_on_lookup_error() {
                    self.sign_out_quietly().await;
                }
                Err(LoginError::ServerError(err.to_string()))
            }
        }
    }

    async fn sign_out_quietly(&self) {
        if let Err(err) = self.provider.sign_out().await {
            warn!("sign-out after failed login did not complete: {err}");
        }
    }
}

/// Explicit sign-out from the dashboard.
///
/// # Errors
/// Returns the provider error when the session could not be invalidated.
#[instrument(skip_all)]
pub async fn sign_out_admin<P>(provider: &P, config: &AuthConfig) -> Result<String, ProviderError>
where
    P: IdentityProvider,
{
    provider.sign_out().await?;
    info!("admin signed out");
    Ok(config.home_path().to_string())
}
