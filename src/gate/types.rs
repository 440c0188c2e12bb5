//! Identities, sessions and allow-list records.

use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Normalize an email for allow-list lookups and throttling keys.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
#[must_use]
pub fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

/// The authenticated subject as reported by the identity provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub email: String,
}

impl Identity {
    /// The email is stored normalized so lookups never depend on provider casing.
    #[must_use]
    pub fn new(id: impl Into<String>, email: &str) -> Self {
        Self {
            id: id.into(),
            email: normalize_email(email),
        }
    }
}

/// An authenticated session. The access token never shows up in `Debug` output.
#[derive(Clone, Debug)]
pub struct Session {
    pub user: Identity,
    access_token: SecretString,
}

impl Session {
    #[must_use]
    pub fn new(user: Identity, access_token: SecretString) -> Self {
        Self { user, access_token }
    }

    #[must_use]
    pub fn access_token(&self) -> &str {
        self.access_token.expose_secret()
    }
}

/// A row of the `admins` allow-list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminRecord {
    pub id: Uuid,
    pub email: String,
}
