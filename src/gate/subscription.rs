//! Session change subscriptions.
//!
//! A [`SessionHub`] holds the current session and fans every change out to its
//! listeners. Each listener owns a [`SessionSubscription`] whose release hook runs
//! exactly once, on `cancel` or on drop, whichever comes first.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::mpsc;
use tracing::debug;

use super::types::Session;

pub struct SessionSubscription {
    changes: mpsc::UnboundedReceiver<Option<Session>>,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl SessionSubscription {
    pub fn new(
        changes: mpsc::UnboundedReceiver<Option<Session>>,
        release: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            changes,
            release: Some(Box::new(release)),
        }
    }

    /// Next session change, `None` once the source is gone.
    pub async fn next(&mut self) -> Option<Option<Session>> {
        self.changes.recv().await
    }

    pub fn cancel(mut self) {
        self.release_once();
    }

    fn release_once(&mut self) {
        if let Some(release) = self.release.take() {
            self.changes.close();
            release();
        }
    }
}

impl Drop for SessionSubscription {
    fn drop(&mut self) {
        self.release_once();
    }
}

impl std::fmt::Debug for SessionSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSubscription")
            .field("released", &self.release.is_none())
            .finish()
    }
}

#[derive(Default)]
struct HubInner {
    current: Option<Session>,
    next_id: u64,
    listeners: HashMap<u64, mpsc::UnboundedSender<Option<Session>>>,
}

/// Current session plus its listeners, shared by provider adapters.
#[derive(Clone, Default)]
pub struct SessionHub {
    inner: Arc<Mutex<HubInner>>,
}

impl SessionHub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HubInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn current(&self) -> Option<Session> {
        self.lock().current.clone()
    }

    /// Replace the current session and notify every listener.
    pub fn publish(&self, session: Option<Session>) {
        let mut inner = self.lock();
        inner.current.clone_from(&session);
        inner
            .listeners
            .retain(|_, listener| listener.send(session.clone()).is_ok());
        debug!(
            listeners = inner.listeners.len(),
            signed_in = session.is_some(),
            "session change published"
        );
    }

    #[must_use]
    pub fn subscribe(&self) -> SessionSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = {
            let mut inner = self.lock();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.listeners.insert(id, tx);
            id
        };

        let hub: Weak<Mutex<HubInner>> = Arc::downgrade(&self.inner);
        SessionSubscription::new(rx, move || {
            if let Some(hub) = hub.upgrade() {
                hub.lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .listeners
                    .remove(&id);
            }
        })
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.lock().listeners.len()
    }
}

impl std::fmt::Debug for SessionHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("SessionHub")
            .field("signed_in", &inner.current.is_some())
            .field("listeners", &inner.listeners.len())
            .finish()
    }
}
