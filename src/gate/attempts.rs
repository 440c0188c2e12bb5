//! In-memory tracker of failed login attempts.
//!
//! Flow Overview:
//! 1) Every failed sign-in or failed allow-list check records one attempt per email.
//! 2) Five attempts within the fifteen minute window lock the email out.
//! 3) Records expire lazily: the first read or write after the window drops them.
//!
//! Scope: one tracker per process. Nothing is persisted and separate processes do
//! not share counts.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use super::rate_limit::{RateLimitDecision, RateLimiter};

pub const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(15 * 60);
pub const MAX_ATTEMPTS: u32 = 5;

#[derive(Clone, Copy, Debug)]
struct LoginAttempt {
    count: u32,
    last_attempt: Instant,
}

impl LoginAttempt {
    /// The window is closed only once it has been exceeded; its last instant still counts.
    fn expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_attempt) > RATE_LIMIT_WINDOW
    }
}

#[derive(Debug, Default)]
pub struct AttemptTracker {
    attempts: Mutex<HashMap<String, LoginAttempt>>,
}

impl AttemptTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, LoginAttempt>> {
        self.attempts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// True while `email` has used up its attempts and the window is still open.
    pub fn is_rate_limited(&self, email: &str) -> bool {
        let now = Instant::now();
        let mut attempts = self.lock();
        let Some(attempt) = attempts.get(email).copied() else {
            return false;
        };

        if attempt.expired(now) {
            attempts.remove(email);
            return false;
        }

        attempt.count >= MAX_ATTEMPTS
    }

    pub fn record_attempt(&self, email: &str) {
        let now = Instant::now();
        let mut attempts = self.lock();
        let count = match attempts.get(email) {
            Some(attempt) if !attempt.expired(now) => attempt.count.saturating_add(1),
            _ => 1,
        };
        attempts.insert(
            email.to_string(),
            LoginAttempt {
                count,
                last_attempt: now,
            },
        );
        debug!(email, count, "login attempt recorded");
    }

    /// Time left until the window of the last attempt closes, zero without a record.
    pub fn remaining_time(&self, email: &str) -> Duration {
        let now = Instant::now();
        self.lock().get(email).map_or(Duration::ZERO, |attempt| {
            RATE_LIMIT_WINDOW.saturating_sub(now.saturating_duration_since(attempt.last_attempt))
        })
    }

    /// Attempts counted in the current window.
    pub fn attempt_count(&self, email: &str) -> u32 {
        let now = Instant::now();
        self.lock()
            .get(email)
            .filter(|attempt| !attempt.expired(now))
            .map_or(0, |attempt| attempt.count)
    }
}

impl RateLimiter for AttemptTracker {
    fn check_email(&self, email: &str) -> RateLimitDecision {
        if self.is_rate_limited(email) {
            RateLimitDecision::Limited {
                remaining: self.remaining_time(email),
            }
        } else {
            RateLimitDecision::Allowed
        }
    }

    fn record_failure(&self, email: &str) {
        self.record_attempt(email);
    }
}
