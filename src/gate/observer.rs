//! Session observer: follows the identity provider's current session.
//!
//! On activation the observer registers for change notifications and fetches the
//! current session once. The two race; whichever resolves first ends `loading` and
//! later results overwrite `user` (last write wins). Shutting down discards any
//! pending result and releases the subscription.

use std::sync::Arc;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::provider::IdentityProvider;
use super::subscription::SessionSubscription;
use super::types::Identity;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionState {
    pub loading: bool,
    pub user: Option<Identity>,
    /// Set when the initial session fetch failed before any notification arrived.
    pub fault: Option<String>,
}

impl SessionState {
    fn initial() -> Self {
        Self {
            loading: true,
            user: None,
            fault: None,
        }
    }
}

pub struct SessionObserver {
    state: watch::Receiver<SessionState>,
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl SessionObserver {
    /// Must be called from within a tokio runtime.
    pub fn activate<P>(provider: Arc<P>) -> Self
    where
        P: IdentityProvider + 'static,
    {
        let (state_tx, state_rx) = watch::channel(SessionState::initial());
        let (stop_tx, stop_rx) = oneshot::channel();

        // Subscribe before fetching so no change between the two is lost.
        let subscription = provider.subscribe();
        let task = tokio::spawn(observe(provider, subscription, state_tx, stop_rx));

        Self {
            state: state_rx,
            stop: Some(stop_tx),
            task: Some(task),
        }
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Receiver that wakes on changes after the current state.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        let mut state = self.state.clone();
        state.borrow_and_update();
        state
    }

    /// Wait until the first session result is known.
    pub async fn resolved(&self) -> SessionState {
        let mut state = self.state.clone();
        let resolved = state
            .wait_for(|current| !current.loading)
            .await
            .map(|current| (*current).clone());
        resolved.unwrap_or_else(|_| state.borrow().clone())
    }

    /// Stop observing and wait for the subscription to be released.
    pub async fn shutdown(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                warn!("session observer task failed: {err}");
            }
        }
    }
}

impl std::fmt::Debug for SessionObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionObserver")
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

fn apply(state: &watch::Sender<SessionState>, user: Option<Identity>, fault: Option<String>) {
    state.send_modify(|current| {
        current.loading = false;
        current.user = user;
        current.fault = fault;
    });
}

async fn observe<P>(
    provider: Arc<P>,
    mut subscription: SessionSubscription,
    state: watch::Sender<SessionState>,
    mut stop: oneshot::Receiver<()>,
) where
    P: IdentityProvider,
{
    let fetch = provider.current_session();
    tokio::pin!(fetch);

    let mut fetched = false;
    let mut listening = true;

    while !fetched || listening {
        tokio::select! {
            biased;
            _ = &mut stop => break,
            result = &mut fetch, if !fetched => {
                fetched = true;
                match result {
                    Ok(session) => apply(&state, session.map(|s| s.user), None),
                    // A notification already answered; a late fetch failure adds nothing.
                    Err(err) if !state.borrow().loading => {
                        debug!("ignoring late session fetch failure: {err}");
                    }
                    Err(err) => {
                        warn!("session fetch failed: {err}");
                        apply(&state, None, Some(err.to_string()));
                    }
                }
            }
            change = subscription.next(), if listening => match change {
                Some(session) => apply(&state, session.map(|s| s.user), None),
                None => listening = false,
            },
        }
    }

    subscription.cancel();
    debug!("session observer stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::testing::{session_for, FakeIdentityProvider};
    use crate::gate::ProviderError;

    #[tokio::test]
    async fn starts_loading_then_resolves_from_fetch() {
        let provider = Arc::new(FakeIdentityProvider::new());
        provider.hub().publish(Some(session_for("owner@shop.example")));

        let observer = SessionObserver::activate(provider.clone());
        assert_eq!(observer.state(), SessionState::initial());

        let state = observer.resolved().await;
        assert!(!state.loading);
        assert_eq!(
            state.user.map(|user| user.email).as_deref(),
            Some("owner@shop.example")
        );
        assert_eq!(provider.fetch_calls(), 1);
        observer.shutdown().await;
    }

    #[tokio::test]
    async fn notification_can_resolve_before_fetch() {
        let provider = Arc::new(FakeIdentityProvider::new());
        provider.hold_fetch();

        let observer = SessionObserver::activate(provider.clone());
        let mut changes = observer.subscribe();
        tokio::task::yield_now().await;

        provider.hub().publish(Some(session_for("owner@shop.example")));
        changes.changed().await.ok();
        let state = observer.state();
        assert!(!state.loading);
        assert!(state.user.is_some());
        assert_eq!(provider.fetch_calls(), 1);

        // The fetch resolving afterwards never puts the observer back into loading.
        provider.release_fetch();
        changes.changed().await.ok();
        let state = observer.state();
        assert!(!state.loading);
        assert_eq!(
            state.user.map(|user| user.email).as_deref(),
            Some("owner@shop.example")
        );
        observer.shutdown().await;
    }

    #[tokio::test]
    async fn user_follows_every_notification() {
        let provider = Arc::new(FakeIdentityProvider::new());
        let observer = SessionObserver::activate(provider.clone());
        assert!(observer.resolved().await.user.is_none());
        let mut changes = observer.subscribe();

        provider.hub().publish(Some(session_for("first@shop.example")));
        changes.changed().await.ok();
        assert_eq!(
            observer.state().user.map(|user| user.email).as_deref(),
            Some("first@shop.example")
        );

        provider.hub().publish(Some(session_for("second@shop.example")));
        changes.changed().await.ok();
        assert_eq!(
            observer.state().user.map(|user| user.email).as_deref(),
            Some("second@shop.example")
        );

        provider.hub().publish(None);
        changes.changed().await.ok();
        let state = observer.state();
        assert!(state.user.is_none());
        assert!(!state.loading);
        observer.shutdown().await;
    }

    #[tokio::test]
    async fn fetch_failure_sets_fault() {
        let provider = Arc::new(FakeIdentityProvider::new());
        provider.fail_fetch(ProviderError("connection reset".to_string()));

        let observer = SessionObserver::activate(provider.clone());
        let state = observer.resolved().await;
        assert!(state.user.is_none());
        assert!(state
            .fault
            .as_deref()
            .is_some_and(|fault| fault.contains("connection reset")));

        let mut changes = observer.subscribe();
        provider.hub().publish(Some(session_for("owner@shop.example")));
        changes.changed().await.ok();
        assert!(observer.state().fault.is_none());
        observer.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_releases_subscription_once() {
        let provider = Arc::new(FakeIdentityProvider::new());
        provider.hold_fetch();

        let observer = SessionObserver::activate(provider.clone());
        assert_eq!(provider.hub().listener_count(), 1);

        let changes = observer.subscribe();
        observer.shutdown().await;
        assert_eq!(provider.hub().listener_count(), 0);

        // Nothing reaches the torn-down observer.
        provider.release_fetch();
        provider.hub().publish(Some(session_for("owner@shop.example")));
        tokio::task::yield_now().await;
        assert!(changes.has_changed().is_err());
        assert!(changes.borrow().loading);
    }

    #[tokio::test]
    async fn dropping_observer_releases_subscription() {
        let provider = Arc::new(FakeIdentityProvider::new());
        let observer = SessionObserver::activate(provider.clone());
        observer.resolved().await;
        assert_eq!(provider.hub().listener_count(), 1);

        drop(observer);
        for _ in 0..10 {
            if provider.hub().listener_count() == 0 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(provider.hub().listener_count(), 0);
    }
}
