//! In-memory collaborators with call counters for unit tests.

use secrecy::SecretString;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::Notify;
use uuid::Uuid;

use super::provider::{
    AdminDirectory, AdminLookup, IdentityProvider, LookupError, ProviderError, SignInError,
};
use super::subscription::{SessionHub, SessionSubscription};
use super::types::{normalize_email, AdminRecord, Identity, Session};

pub(crate) fn session_for(email: &str) -> Session {
    Session::new(
        Identity::new(format!("user-{}", normalize_email(email)), email),
        SecretString::from("access-token".to_string()),
    )
}

pub(crate) fn admin_record(email: &str) -> AdminRecord {
    AdminRecord {
        id: Uuid::new_v4(),
        email: normalize_email(email),
    }
}

#[derive(Default)]
pub(crate) struct FakeIdentityProvider {
    hub: SessionHub,
    passwords: Mutex<HashMap<String, String>>,
    sign_in_failure: Mutex<Option<SignInError>>,
    fetch_failure: Mutex<Option<ProviderError>>,
    fetch_held: AtomicBool,
    fetch_release: Notify,
    fetch_calls: AtomicUsize,
    sign_in_calls: AtomicUsize,
    sign_out_calls: AtomicUsize,
}

impl FakeIdentityProvider {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn hub(&self) -> &SessionHub {
        &self.hub
    }

    pub(crate) fn with_user(self, email: &str, password: &str) -> Self {
        self.passwords
            .lock()
            .unwrap()
            .insert(normalize_email(email), password.to_string());
        self
    }

    /// Every sign-in fails with `error` regardless of the credentials.
    pub(crate) fn fail_sign_in(&self, error: SignInError) {
        *self.sign_in_failure.lock().unwrap() = Some(error);
    }

    pub(crate) fn fail_fetch(&self, error: ProviderError) {
        *self.fetch_failure.lock().unwrap() = Some(error);
    }

    pub(crate) fn clear_fetch_failure(&self) {
        *self.fetch_failure.lock().unwrap() = None;
    }

    /// Park `current_session` until `release_fetch`.
    pub(crate) fn hold_fetch(&self) {
        self.fetch_held.store(true, Ordering::SeqCst);
    }

    pub(crate) fn release_fetch(&self) {
        self.fetch_held.store(false, Ordering::SeqCst);
        self.fetch_release.notify_waiters();
    }

    pub(crate) fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn sign_in_calls(&self) -> usize {
        self.sign_in_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn sign_out_calls(&self) -> usize {
        self.sign_out_calls.load(Ordering::SeqCst)
    }
}

impl IdentityProvider for FakeIdentityProvider {
    async fn current_session(&self) -> Result<Option<Session>, ProviderError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        while self.fetch_held.load(Ordering::SeqCst) {
            let released = self.fetch_release.notified();
            if !self.fetch_held.load(Ordering::SeqCst) {
                break;
            }
            released.await;
        }
        let failure = self.fetch_failure.lock().unwrap().clone();
        match failure {
            Some(error) => Err(error),
            None => Ok(self.hub.current()),
        }
    }

    fn subscribe(&self) -> SessionSubscription {
        self.hub.subscribe()
    }

    async fn sign_in(&self, email: &str, password: &SecretString) -> Result<Session, SignInError> {
        use secrecy::ExposeSecret;

        self.sign_in_calls.fetch_add(1, Ordering::SeqCst);
        let failure = self.sign_in_failure.lock().unwrap().clone();
        if let Some(error) = failure {
            return Err(error);
        }

        let known = self
            .passwords
            .lock()
            .unwrap()
            .get(email)
            .is_some_and(|expected| expected == password.expose_secret());
        if !known {
            return Err(SignInError::InvalidCredentials);
        }

        let session = session_for(email);
        self.hub.publish(Some(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        if self.hub.current().is_some() {
            self.hub.publish(None);
        }
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct FakeAdminDirectory {
    admins: Mutex<HashMap<String, AdminRecord>>,
    failure: Mutex<Option<LookupError>>,
    held: AtomicBool,
    release: Notify,
    lookup_calls: AtomicUsize,
}

impl FakeAdminDirectory {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_admin(self, email: &str) -> Self {
        self.add_admin(email);
        self
    }

    pub(crate) fn add_admin(&self, email: &str) {
        let record = admin_record(email);
        self.admins.lock().unwrap().insert(record.email.clone(), record);
    }

    pub(crate) fn fail_with(&self, error: Option<LookupError>) {
        *self.failure.lock().unwrap() = error;
    }

    /// Park lookups until `release`.
    pub(crate) fn hold(&self) {
        self.held.store(true, Ordering::SeqCst);
    }

    pub(crate) fn release(&self) {
        self.held.store(false, Ordering::SeqCst);
        self.release.notify_waiters();
    }

    pub(crate) fn lookup_calls(&self) -> usize {
        self.lookup_calls.load(Ordering::SeqCst)
    }
}

impl AdminDirectory for FakeAdminDirectory {
    async fn lookup_admin_by_email(&self, email: &str) -> Result<AdminLookup, LookupError> {
        self.lookup_calls.fetch_add(1, Ordering::SeqCst);
        while self.held.load(Ordering::SeqCst) {
            let released = self.release.notified();
            if !self.held.load(Ordering::SeqCst) {
                break;
            }
            released.await;
        }
        let failure = self.failure.lock().unwrap().clone();
        if let Some(error) = failure {
            return Err(error);
        }
        Ok(self
            .admins
            .lock()
            .unwrap()
            .get(email)
            .cloned()
            .map_or(AdminLookup::NotFound, AdminLookup::Found))
    }
}
