use secrecy::SecretString;

use crate::backend::BackendConfig;

#[derive(Debug, Clone)]
pub struct GlobalArgs {
    pub backend_url: String,
    pub anon_key: SecretString,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(backend_url: String) -> Self {
        Self {
            backend_url,
            anon_key: SecretString::default(),
        }
    }

    pub fn set_anon_key(&mut self, anon_key: SecretString) {
        self.anon_key = anon_key;
    }

    #[must_use]
    pub fn backend(&self) -> BackendConfig {
        BackendConfig::new(self.backend_url.clone(), self.anon_key.clone())
    }
}
