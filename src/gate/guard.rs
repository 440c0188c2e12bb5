//! Admin gate guarding the dashboard.
//!
//! Flow Overview:
//! 1) `PendingAuth` while the session observer is loading.
//! 2) No user: `Denied`, redirect to the login page.
//! 3) A user: `PendingAuthz` and a fresh `admins` lookup by normalized email.
//! 4) One row: `Authorized`. No row: `Denied` and the identity is signed out.
//!    Lookup failure: `Error` with a retry affordance, the session stays.
//!
//! Any session change restarts the evaluation from `PendingAuth`; a lookup started
//! for a previous session is dropped before its answer is applied.

use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::config::AuthConfig;
use super::observer::{SessionObserver, SessionState};
use super::provider::{AdminDirectory, AdminLookup, IdentityProvider, LookupError};
use super::types::AdminRecord;

pub const SESSION_ERROR_MESSAGE: &str = "Network error checking session. Please retry.";
pub const LOOKUP_ERROR_MESSAGE: &str = "Server error verifying admin. Please retry.";

const TRANSITION_BUFFER: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DenyReason {
    SignedOut,
    NotAdmin,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GateState {
    PendingAuth,
    PendingAuthz { email: String },
    Authorized { admin: AdminRecord },
    Denied { reason: DenyReason, redirect: String },
    Error { message: String },
}

impl GateState {
    /// Decision for a session snapshot.
    #[must_use]
    pub fn from_session(session: &SessionState, config: &AuthConfig) -> Self {
        if session.loading {
            return Self::PendingAuth;
        }
        if session.fault.is_some() {
            return Self::Error {
                message: SESSION_ERROR_MESSAGE.to_string(),
            };
        }
        match &session.user {
            Some(user) => Self::PendingAuthz {
                email: user.email.clone(),
            },
            None => Self::Denied {
                reason: DenyReason::SignedOut,
                redirect: config.login_path().to_string(),
            },
        }
    }

    /// Decision for an allow-list answer.
    #[must_use]
    pub fn from_lookup(result: Result<AdminLookup, LookupError>, config: &AuthConfig) -> Self {
        match result {
            Ok(AdminLookup::Found(admin)) => Self::Authorized { admin },
            Ok(AdminLookup::NotFound) => Self::Denied {
                reason: DenyReason::NotAdmin,
                redirect: config.login_path().to_string(),
            },
            Err(err) => {
                error!("Admin lookup error: {err}");
                Self::Error {
                    message: LOOKUP_ERROR_MESSAGE.to_string(),
                }
            }
        }
    }

    /// Authorized, denied and error states wait for the next session change.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            Self::Authorized { .. } | Self::Denied { .. } | Self::Error { .. }
        )
    }

    #[must_use]
    pub fn renders_protected(&self) -> bool {
        matches!(self, Self::Authorized { .. })
    }
}

struct Publisher {
    state: watch::Sender<GateState>,
    transitions: broadcast::Sender<GateState>,
}

impl Publisher {
    fn set(&self, next: GateState) {
        let changed = self.state.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next.clone();
                true
            }
        });
        if changed {
            debug!(state = ?next, "admin gate transition");
            // Nobody listening for transitions is fine.
            let _ = self.transitions.send(next);
        }
    }
}

pub struct AdminGate {
    state: watch::Receiver<GateState>,
    transitions: broadcast::Sender<GateState>,
    retry: mpsc::UnboundedSender<()>,
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl AdminGate {
    /// Start guarding: activates a session observer and evaluates every change.
    /// Must be called from within a tokio runtime.
    pub fn mount<P, D>(provider: Arc<P>, directory: Arc<D>, config: AuthConfig) -> Self
    where
        P: IdentityProvider + 'static,
        D: AdminDirectory + 'static,
    {
        let (state_tx, state_rx) = watch::channel(GateState::PendingAuth);
        let (transitions, _) = broadcast::channel(TRANSITION_BUFFER);
        let (retry_tx, retry_rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = oneshot::channel();

        let observer = SessionObserver::activate(provider.clone());
        let publisher = Publisher {
            state: state_tx,
            transitions: transitions.clone(),
        };
        let task = tokio::spawn(guard(
            observer, provider, directory, config, publisher, retry_rx, stop_rx,
        ));

        Self {
            state: state_rx,
            transitions,
            retry: retry_tx,
            stop: Some(stop_tx),
            task: Some(task),
        }
    }

    #[must_use]
    pub fn state(&self) -> GateState {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<GateState> {
        self.state.clone()
    }

    /// Every transition published from now on, in order.
    #[must_use]
    pub fn transitions(&self) -> broadcast::Receiver<GateState> {
        self.transitions.subscribe()
    }

    /// Retry affordance of `Error`: re-runs the admin lookup, or fetches the session
    /// again when the session fetch itself failed.
    pub fn retry(&self) {
        let _ = self.retry.send(());
    }

    /// Wait for the next settled state (authorized, denied or error).
    pub async fn settled(&self) -> GateState {
        let mut state = self.state.clone();
        let settled = state
            .wait_for(GateState::is_settled)
            .await
            .map(|current| (*current).clone());
        settled.unwrap_or_else(|_| state.borrow().clone())
    }

    /// Stop guarding; the observer's subscription is released before this returns.
    pub async fn unmount(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                warn!("admin gate task failed: {err}");
            }
        }
    }
}

impl std::fmt::Debug for AdminGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminGate")
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

async fn guard<P, D>(
    mut observer: SessionObserver,
    provider: Arc<P>,
    directory: Arc<D>,
    config: AuthConfig,
    publisher: Publisher,
    mut retry: mpsc::UnboundedReceiver<()>,
    mut stop: oneshot::Receiver<()>,
) where
    P: IdentityProvider + 'static,
    D: AdminDirectory,
{
    let mut sessions = observer.subscribe();

    'evaluate: loop {
        let session = sessions.borrow_and_update().clone();
        publisher.set(GateState::PendingAuth);

        let decision = GateState::from_session(&session, &config);
        if let GateState::PendingAuthz { email } = &decision {
            publisher.set(decision.clone());

            let lookup = directory.lookup_admin_by_email(email);
            let outcome = tokio::select! {
                biased;
                _ = &mut stop => break 'evaluate,
                changed = sessions.changed() => {
                    if changed.is_err() {
                        break 'evaluate;
                    }
                    debug!("session changed during admin lookup, starting over");
                    continue 'evaluate;
                }
                result = lookup => GateState::from_lookup(result, &config),
            };

            let not_admin = matches!(
                outcome,
                GateState::Denied {
                    reason: DenyReason::NotAdmin,
                    ..
                }
            );
            publisher.set(outcome);

            if not_admin {
                info!(email = %email, "signed in user is not on the admin allow-list");
                if let Err(err) = provider.sign_out().await {
                    error!("Sign out after failed admin check: {err}");
                }
            }
        } else {
            publisher.set(decision);
        }

        let refetch = tokio::select! {
            biased;
            _ = &mut stop => break 'evaluate,
            changed = sessions.changed() => {
                if changed.is_err() {
                    break 'evaluate;
                }
                false
            }
            Some(()) = retry.recv() => {
                debug!("admin gate retry requested");
                session.fault.is_some()
            }
        };

        // A failed session fetch is only answered again by a fresh observer.
        if refetch {
            observer.shutdown().await;
            observer = SessionObserver::activate(provider.clone());
            sessions = observer.subscribe();
        }
    }

    observer.shutdown().await;
}
