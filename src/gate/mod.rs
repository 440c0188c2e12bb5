//! Admin authentication and authorization gate.
//!
//! Components, leaves first:
//!
//! - [`AttemptTracker`]: in-memory failed-login throttle (5 attempts per 15 minutes).
//! - [`SessionObserver`]: follows the identity provider's current session.
//! - [`AdminGate`]: session check + `admins` allow-list lookup guarding the dashboard.
//! - [`LoginFlow`]: validation, throttle, sign-in and allow-list verification.
//!
//! The identity provider and the record store are consumed through the
//! [`IdentityProvider`] and [`AdminDirectory`] traits.

mod attempts;
mod config;
mod form;
mod guard;
mod login;
mod observer;
pub(crate) mod provider;
mod rate_limit;
mod subscription;
mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use attempts::{AttemptTracker, MAX_ATTEMPTS, RATE_LIMIT_WINDOW};
pub use config::AuthConfig;
pub use form::{LoginForm, ERROR_DISPLAY_DURATION};
pub use guard::{AdminGate, DenyReason, GateState, LOOKUP_ERROR_MESSAGE, SESSION_ERROR_MESSAGE};
pub use login::{sign_out_admin, FieldErrors, LoginError, LoginFlow, LoginRequest, LoginSuccess};
pub use observer::{SessionObserver, SessionState};
pub use provider::{
    AdminDirectory, AdminLookup, IdentityProvider, LookupError, ProviderError, SignInError,
};
pub use rate_limit::{NoopRateLimiter, RateLimitDecision, RateLimiter};
pub use subscription::{SessionHub, SessionSubscription};
pub use types::{normalize_email, valid_email, AdminRecord, Identity, Session};
