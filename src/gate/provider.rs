//! Contracts for the hosted identity provider and the `admins` record store.

use secrecy::SecretString;
use std::future::Future;

use super::subscription::SessionSubscription;
use super::types::{AdminRecord, Session};

/// Classified sign-in failure. Adapters map raw provider responses into these kinds.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SignInError {
    #[error("invalid login credentials")]
    InvalidCredentials,
    #[error("email not confirmed")]
    EmailNotConfirmed,
    #[error("provider rate limit reached")]
    RateLimited,
    #[error("sign-in rejected: {0}")]
    Rejected(String),
    /// Transport or server fault; says nothing about the credentials.
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

impl SignInError {
    #[must_use]
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("identity provider error: {0}")]
pub struct ProviderError(pub String);

/// Allow-list lookup failure, distinct from "no row found".
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    #[error("admin lookup failed: {0}")]
    Query(String),
    #[error("admin lookup matched {0} rows")]
    Ambiguous(usize),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AdminLookup {
    Found(AdminRecord),
    NotFound,
}

pub trait IdentityProvider: Send + Sync {
    /// One-shot fetch of the current session.
    fn current_session(
        &self,
    ) -> impl Future<Output = Result<Option<Session>, ProviderError>> + Send;

    /// Register for session change notifications.
    fn subscribe(&self) -> SessionSubscription;

    fn sign_in(
        &self,
        email: &str,
        password: &SecretString,
    ) -> impl Future<Output = Result<Session, SignInError>> + Send;

    /// Invalidate the current session. Signing out without a session is a no-op.
    fn sign_out(&self) -> impl Future<Output = Result<(), ProviderError>> + Send;
}

pub trait AdminDirectory: Send + Sync {
    fn lookup_admin_by_email(
        &self,
        email: &str,
    ) -> impl Future<Output = Result<AdminLookup, LookupError>> + Send;
}
