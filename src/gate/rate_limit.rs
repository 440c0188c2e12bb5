//! Rate limiting primitives for the admin login flow.

use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    Limited { remaining: Duration },
}

pub trait RateLimiter: Send + Sync {
    fn check_email(&self, email: &str) -> RateLimitDecision;
    /// Count one failed login or authorization outcome for `email`.
    fn record_failure(&self, email: &str);
}

#[derive(Clone, Debug)]
pub struct NoopRateLimiter;

impl RateLimiter for NoopRateLimiter {
    fn check_email(&self, _email: &str) -> RateLimitDecision {
        RateLimitDecision::Allowed
    }

    fn record_failure(&self, _email: &str) {}
}
