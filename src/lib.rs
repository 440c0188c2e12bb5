//! # storefront-gate (Admin access for the storefront dashboard)
//!
//! The storefront keeps users, content and files in a hosted backend. This crate
//! owns the small amount of logic that decides who may reach the admin dashboard.
//!
//! ## Login
//!
//! A login normalizes and validates the form, consults the in-memory attempt
//! tracker, signs in against the identity provider and finally checks the `admins`
//! allow-list. Failed sign-ins and "not an admin" outcomes consume one attempt;
//! after five attempts within fifteen minutes further logins are refused locally.
//!
//! - **Per process:** the attempt tracker lives in memory only and is not shared
//!   between processes or persisted across restarts.
//!
//! ## Admin gate
//!
//! The gate follows the current session and re-runs the allow-list lookup on every
//! session change. A session without an allow-list row is signed out; a failing
//! lookup is reported as retryable and leaves the session untouched.

pub mod backend;
pub mod cli;
pub mod gate;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
