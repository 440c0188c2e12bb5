//! Login form state: field values, per-field errors and a banner. Errors clear
//! themselves after `ERROR_DISPLAY_DURATION` and on any edit.

use secrecy::SecretString;
use std::time::Duration;
use tokio::time::Instant;

use super::login::{FieldErrors, LoginError, LoginFlow, LoginRequest, LoginSuccess};
use super::provider::{AdminDirectory, IdentityProvider};

/// How long an error stays visible.
pub const ERROR_DISPLAY_DURATION: Duration = Duration::from_secs(5);

#[derive(Clone, Debug)]
struct Shown<T> {
    value: T,
    shown_at: Instant,
}

impl<T> Shown<T> {
    fn now(value: T) -> Self {
        Self {
            value,
            shown_at: Instant::now(),
        }
    }

    fn visible(&self) -> Option<&T> {
        (self.shown_at.elapsed() < ERROR_DISPLAY_DURATION).then_some(&self.value)
    }
}

#[derive(Debug, Default)]
pub struct LoginForm {
    email: String,
    password: SecretString,
    errors: Option<Shown<FieldErrors>>,
    banner: Option<Shown<String>>,
    submitting: bool,
}

impl LoginForm {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_email(&mut self, email: impl Into<String>) {
        self.email = email.into();
        self.clear_errors();
    }

    pub fn set_password(&mut self, password: SecretString) {
        self.password = password;
        self.clear_errors();
    }

    fn clear_errors(&mut self) {
        self.errors = None;
        self.banner = None;
    }

    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Per-field messages, empty once `ERROR_DISPLAY_DURATION` has passed.
    #[must_use]
    pub fn field_errors(&self) -> FieldErrors {
        self.errors
            .as_ref()
            .and_then(Shown::visible)
            .cloned()
            .unwrap_or_default()
    }

    #[must_use]
    pub fn banner(&self) -> Option<&str> {
        self.banner
            .as_ref()
            .and_then(Shown::visible)
            .map(String::as_str)
    }

    #[must_use]
    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    #[must_use]
    pub fn request(&self) -> LoginRequest {
        LoginRequest::new(self.email.clone(), self.password.clone())
    }

    /// Submit the current values through `flow`, updating errors and the banner.
    ///
    /// # Errors
    /// Passes through the flow's [`LoginError`].
    pub async fn submit<P, D>(
        &mut self,
        flow: &LoginFlow<P, D>,
    ) -> Result<LoginSuccess, LoginError>
    where
        P: IdentityProvider,
        D: AdminDirectory,
    {
        self.submitting = true;
        self.clear_errors();
        let result = flow.submit(&self.request()).await;
        self.submitting = false;

        match &result {
            Ok(_) => {}
            Err(LoginError::Validation(errors)) => {
                self.errors = Some(Shown::now(errors.clone()));
            }
            Err(err) => self.banner = Some(Shown::now(err.user_message())),
        }

        result
    }
}
