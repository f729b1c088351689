//! Rate limiting primitives for auth flows.
//!
//! `MemoryRateLimiter` keeps a fixed window per (scope, key, action) in process
//! memory. Limits are therefore per instance; run a shared limiter behind the
//! same trait when several instances serve one frontend.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RateLimitAction {
    Join,
    Login,
    PasswordForgot,
    PasswordReset,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    Limited,
}

pub trait RateLimiter: Send + Sync {
    fn check_ip(&self, ip: Option<&str>, action: RateLimitAction) -> RateLimitDecision;
    fn check_email(&self, email: &str, action: RateLimitAction) -> RateLimitDecision;
}

#[derive(Clone, Debug)]
pub struct NoopRateLimiter;

impl RateLimiter for NoopRateLimiter {
    fn check_ip(&self, _ip: Option<&str>, _action: RateLimitAction) -> RateLimitDecision {
        RateLimitDecision::Allowed
    }

    fn check_email(&self, _email: &str, _action: RateLimitAction) -> RateLimitDecision {
        RateLimitDecision::Allowed
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum Scope {
    Ip,
    Email,
}

#[derive(Debug)]
struct Window {
    started_at: Instant,
    count: u32,
}

#[derive(Debug)]
pub struct MemoryRateLimiter {
    window: Duration,
    max_attempts: u32,
    windows: Mutex<HashMap<(Scope, String, RateLimitAction), Window>>,
}

impl MemoryRateLimiter {
    #[must_use]
    pub fn new(window: Duration, max_attempts: u32) -> Self {
        Self {
            window,
            max_attempts: max_attempts.max(1),
            windows: Mutex::new(HashMap::new()),
        }
    }

    fn hit(&self, scope: Scope, key: &str, action: RateLimitAction) -> RateLimitDecision {
        let now = Instant::now();
        // A poisoned lock only means another request panicked mid-update; counts stay usable.
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        windows.retain(|_, entry| now.duration_since(entry.started_at) < self.window);

        let entry = windows
            .entry((scope, key.to_string(), action))
            .or_insert(Window {
                started_at: now,
                count: 0,
            });
        if entry.count >= self.max_attempts {
            return RateLimitDecision::Limited;
        }
        entry.count += 1;
        RateLimitDecision::Allowed
    }
}

impl RateLimiter for MemoryRateLimiter {
    fn check_ip(&self, ip: Option<&str>, action: RateLimitAction) -> RateLimitDecision {
        // Requests without a client IP can't be attributed; email limits still apply.
        match ip {
            Some(ip) => self.hit(Scope::Ip, ip, action),
            None => RateLimitDecision::Allowed,
        }
    }

    fn check_email(&self, email: &str, action: RateLimitAction) -> RateLimitDecision {
        self.hit(Scope::Email, email, action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_rate_limiter_allows() {
        let limiter = NoopRateLimiter;
        assert_eq!(
            limiter.check_ip(None, RateLimitAction::Join),
            RateLimitDecision::Allowed
        );
        assert_eq!(
            limiter.check_email("user@example.com", RateLimitAction::Login),
            RateLimitDecision::Allowed
        );
    }

    #[test]
    fn memory_rate_limiter_limits_after_max_attempts() {
        let limiter = MemoryRateLimiter::new(Duration::from_secs(60), 2);
        let ip = Some("10.0.0.1");
        assert_eq!(
            limiter.check_ip(ip, RateLimitAction::Login),
            RateLimitDecision::Allowed
        );
        assert_eq!(
            limiter.check_ip(ip, RateLimitAction::Login),
            RateLimitDecision::Allowed
        );
        assert_eq!(
            limiter.check_ip(ip, RateLimitAction::Login),
            RateLimitDecision::Limited
        );
    }

    #[test]
    fn memory_rate_limiter_keys_are_independent() {
        let limiter = MemoryRateLimiter::new(Duration::from_secs(60), 1);
        assert_eq!(
            limiter.check_email("a@example.com", RateLimitAction::Login),
            RateLimitDecision::Allowed
        );
        // Same email, different action.
        assert_eq!(
            limiter.check_email("a@example.com", RateLimitAction::PasswordReset),
            RateLimitDecision::Allowed
        );
        // Same action, different email.
        assert_eq!(
            limiter.check_email("b@example.com", RateLimitAction::Login),
            RateLimitDecision::Allowed
        );
        // An IP that happens to equal an email string is a separate scope.
        assert_eq!(
            limiter.check_ip(Some("a@example.com"), RateLimitAction::Login),
            RateLimitDecision::Allowed
        );
        assert_eq!(
            limiter.check_email("a@example.com", RateLimitAction::Login),
            RateLimitDecision::Limited
        );
    }

    #[test]
    fn memory_rate_limiter_window_expires() {
        let limiter = MemoryRateLimiter::new(Duration::from_millis(20), 1);
        assert_eq!(
            limiter.check_email("a@example.com", RateLimitAction::Join),
            RateLimitDecision::Allowed
        );
        assert_eq!(
            limiter.check_email("a@example.com", RateLimitAction::Join),
            RateLimitDecision::Limited
        );
        std::thread::sleep(Duration::from_millis(40));
        assert_eq!(
            limiter.check_email("a@example.com", RateLimitAction::Join),
            RateLimitDecision::Allowed
        );
    }

    #[test]
    fn memory_rate_limiter_ignores_missing_ip() {
        let limiter = MemoryRateLimiter::new(Duration::from_secs(60), 1);
        for _ in 0..3 {
            assert_eq!(
                limiter.check_ip(None, RateLimitAction::Join),
                RateLimitDecision::Allowed
            );
        }
    }
}
