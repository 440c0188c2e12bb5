//! HTTP adapters for the hosted auth and REST backend.
//!
//! - [`HttpIdentityProvider`]: password sign-in, session check and sign-out under
//!   `/auth/v1`.
//! - [`HttpAdminDirectory`]: the `admins` allow-list under `/rest/v1`.
//!
//! Both send the project's anonymous key in the `apikey` header.

mod directory;
mod identity;

pub use directory::HttpAdminDirectory;
pub use identity::HttpIdentityProvider;

use anyhow::{anyhow, Result};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::APP_USER_AGENT;

pub(crate) const API_KEY_HEADER: &str = "apikey";

#[derive(Clone, Debug)]
pub struct BackendConfig {
    url: String,
    anon_key: SecretString,
}

impl BackendConfig {
    #[must_use]
    pub fn new(url: String, anon_key: SecretString) -> Self {
        Self { url, anon_key }
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub fn anon_key(&self) -> &str {
        self.anon_key.expose_secret()
    }
}

pub(crate) fn client() -> Result<Client> {
    Ok(Client::builder().user_agent(APP_USER_AGENT).build()?)
}

/// `path` is appended to any base path of `url`, so a backend served under a prefix
/// keeps it.
///
/// # Errors
/// Returns an error if `url` cannot be parsed, has no host, or uses an unsupported scheme.
pub fn endpoint_url(url: &str, path: &str) -> Result<String> {
    let url = Url::parse(url)?;

    let scheme = url.scheme();

    let host = url
        .host()
        .ok_or_else(|| anyhow!("Error parsing URL: no host specified"))?
        .to_owned();

    let port = match url.port() {
        Some(p) => p,
        None => match scheme {
            "http" => 80,
            "https" => 443,
            _ => return Err(anyhow!("Error parsing URL: unsupported scheme {scheme}")),
        },
    };

    let base = url.path().trim_end_matches('/');

    let endpoint_url = format!("{scheme}://{host}:{port}{base}{path}");

    debug!("endpoint URL: {}", endpoint_url);

    Ok(endpoint_url)
}

/// Error text from an auth or REST error body, empty when there is none.
pub(crate) fn backend_error_message(json_response: &Value) -> &str {
    ["error_description", "msg", "message", "error"]
        .iter()
        .find_map(|key| json_response.get(key).and_then(Value::as_str))
        .unwrap_or("")
}
