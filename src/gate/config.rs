//! Gate and login configuration.

const DEFAULT_LOGIN_PATH: &str = "/admin-login";
const DEFAULT_DASHBOARD_PATH: &str = "/admin";
const DEFAULT_HOME_PATH: &str = "/";

#[derive(Clone, Debug)]
pub struct AuthConfig {
    login_path: String,
    dashboard_path: String,
    home_path: String,
    sign_out_on_lookup_error: bool,
}

impl AuthConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            dashboard_path: DEFAULT_DASHBOARD_PATH.to_string(),
            home_path: DEFAULT_HOME_PATH.to_string(),
            sign_out_on_lookup_error: false,
        }
    }

    #[must_use]
    pub fn with_login_path(mut self, path: String) -> Self {
        self.login_path = path;
        self
    }

    #[must_use]
    pub fn with_dashboard_path(mut self, path: String) -> Self {
        self.dashboard_path = path;
        self
    }

    #[must_use]
    pub fn with_home_path(mut self, path: String) -> Self {
        self.home_path = path;
        self
    }

    /// Sign out when the allow-list lookup fails during login instead of leaving
    /// the provider session in place.
    #[must_use]
    pub fn with_sign_out_on_lookup_error(mut self, enabled: bool) -> Self {
        self.sign_out_on_lookup_error = enabled;
        self
    }

    #[must_use]
    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    #[must_use]
    pub fn dashboard_path(&self) -> &str {
        &self.dashboard_path
    }

    #[must_use]
    pub fn home_path(&self) -> &str {
        &self.home_path
    }

    #[must_use]
    pub fn sign_out_on_lookup_error(&self) -> bool {
        self.sign_out_on_lookup_error
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::new()
    }
}
