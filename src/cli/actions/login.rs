use anyhow::{anyhow, Result};
use secrecy::SecretString;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::backend::{HttpAdminDirectory, HttpIdentityProvider};
use crate::cli::globals::GlobalArgs;
use crate::gate::{
    sign_out_admin, AdminGate, AttemptTracker, AuthConfig, DenyReason, GateState, LoginError,
    LoginFlow, LoginRequest, RateLimiter,
};

#[derive(Debug)]
pub struct Args {
    pub globals: GlobalArgs,
    pub email: String,
    pub password: SecretString,
    pub watch: bool,
}

/// One line per gate state, as printed by the CLI.
#[must_use]
pub fn describe(state: &GateState) -> String {
    match state {
        GateState::PendingAuth => "checking session".to_string(),
        GateState::PendingAuthz { email } => format!("verifying admin {email}"),
        GateState::Authorized { admin } => format!("authorized: {}", admin.email),
        GateState::Denied {
            reason: DenyReason::SignedOut,
            redirect,
        } => format!("denied: signed out, redirect to {redirect}"),
        GateState::Denied {
            reason: DenyReason::NotAdmin,
            redirect,
        } => format!("denied: not an admin, redirect to {redirect}"),
        GateState::Error { message } => format!("error: {message}"),
    }
}

fn login_failure(err: &LoginError) -> anyhow::Error {
    match err {
        LoginError::Validation(errors) => {
            let fields: Vec<String> = [
                errors.email.as_ref().map(|msg| format!("email: {msg}")),
                errors.password.as_ref().map(|msg| format!("password: {msg}")),
            ]
            .into_iter()
            .flatten()
            .collect();
            anyhow!("{}", fields.join(", "))
        }
        _ => anyhow!("{}", err.user_message()),
    }
}

/// Report every gate transition after `settled` until `stop` resolves.
///
/// Returns the last state seen.
async fn watch_gate<F>(
    gate: &AdminGate,
    settled: GateState,
    stop: F,
    mut report: impl FnMut(&GateState),
) -> GateState
where
    F: Future<Output = ()>,
{
    let mut transitions = gate.transitions();
    let mut state = gate.state();
    if state != settled {
        report(&state);
    }

    tokio::pin!(stop);
    loop {
        tokio::select! {
            () = &mut stop => break,
            transition = transitions.recv() => match transition {
                // Consecutive states are never equal, so a repeat is the one already read.
                Ok(next) if next == state => {}
                Ok(next) => {
                    report(&next);
                    state = next;
                }
                Err(RecvError::Lagged(skipped)) => warn!("missed {skipped} gate transitions"),
                Err(RecvError::Closed) => break,
            },
        }
    }
    state
}

/// Log in, then hold the admin gate until `stop` resolves when watching.
///
/// Returns the gate state the run ended with.
///
/// # Errors
/// Returns an error if the backend URL is invalid, the login fails or the gate does
/// not authorize the session.
pub async fn run<F>(args: Args, stop: F) -> Result<GateState>
where
    F: Future<Output = ()>,
{
    let backend = args.globals.backend();
    let provider = Arc::new(HttpIdentityProvider::new(backend.clone())?);
    let directory = Arc::new(HttpAdminDirectory::new(backend, provider.hub().clone())?);
    let limiter: Arc<dyn RateLimiter> = Arc::new(AttemptTracker::new());
    let config = AuthConfig::new();

    let flow = LoginFlow::new(provider.clone(), directory.clone(), limiter, config.clone());
    let request = LoginRequest::new(args.email, args.password);
    let success = flow.submit(&request).await.map_err(|err| {
        debug!("login failed: {err}");
        login_failure(&err)
    })?;
    println!(
        "Signed in as {}, continue to {}",
        success.admin.email, success.redirect
    );

    let gate = AdminGate::mount(provider.clone(), directory, config.clone());
    let mut state = gate.settled().await;
    println!("{}", describe(&state));

    if !state.renders_protected() {
        gate.unmount().await;
        return Err(anyhow!("admin gate refused access: {}", describe(&state)));
    }

    if args.watch {
        state = watch_gate(&gate, state, stop, |next| println!("{}", describe(next))).await;

        gate.unmount().await;
        let home = sign_out_admin(provider.as_ref(), &config).await?;
        info!("signed out");
        println!("Signed out, continue to {home}");
        return Ok(state);
    }

    gate.unmount().await;
    Ok(state)
}

/// # Errors
/// Returns an error if the login or the admin gate fails.
pub async fn execute(args: Args) -> Result<()> {
    run(args, async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for Ctrl-C: {err}");
            std::future::pending::<()>().await;
        }
    })
    .await?;

    Ok(())
}
