use anyhow::Result;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info_span, Instrument};

use super::{backend_error_message, client, endpoint_url, BackendConfig, API_KEY_HEADER};
use crate::gate::{AdminDirectory, AdminLookup, AdminRecord, LookupError, SessionHub};

/// `admins` allow-list read through the backend's REST interface.
///
/// Requests carry the signed-in user's token when there is one, the anonymous key
/// otherwise, so row-level policies apply as they would for the dashboard.
#[derive(Debug)]
pub struct HttpAdminDirectory {
    config: BackendConfig,
    client: Client,
    hub: SessionHub,
    admins_url: String,
}

impl HttpAdminDirectory {
    /// # Errors
    /// Returns an error if the backend URL is invalid or the HTTP client cannot be built.
    pub fn new(config: BackendConfig, hub: SessionHub) -> Result<Self> {
        let admins_url = endpoint_url(config.url(), "/rest/v1/admins")?;
        Ok(Self {
            config,
            client: client()?,
            hub,
            admins_url,
        })
    }
}

impl AdminDirectory for HttpAdminDirectory {
    async fn lookup_admin_by_email(&self, email: &str) -> Result<AdminLookup, LookupError> {
        let bearer = self.hub.current().map_or_else(
            || self.config.anon_key().to_string(),
            |session| session.access_token().to_string(),
        );

        let email_filter = format!("eq.{email}");
        let span = info_span!("rest.admins", http.method = "GET", url = %self.admins_url);
        let response = self
            .client
            .get(&self.admins_url)
            .query(&[("select", "id,email"), ("email", email_filter.as_str())])
            .header(API_KEY_HEADER, self.config.anon_key())
            .bearer_auth(bearer)
            .send()
            .instrument(span)
            .await
            .map_err(|err| LookupError::Query(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let json_response: Value = response.json().await.unwrap_or(Value::Null);
            return Err(LookupError::Query(format!(
                "{} - {}, {}",
                self.admins_url,
                status,
                backend_error_message(&json_response)
            )));
        }

        let mut rows: Vec<AdminRecord> = response
            .json()
            .await
            .map_err(|err| LookupError::Query(err.to_string()))?;
        debug!(rows = rows.len(), "admins lookup answered");

        match rows.len() {
            0 => Ok(AdminLookup::NotFound),
            1 => Ok(rows
                .pop()
                .map_or(AdminLookup::NotFound, AdminLookup::Found)),
            n => Err(LookupError::Ambiguous(n)),
        }
    }
}
