//! Auth state and configuration.

use std::sync::Arc;
use std::time::Duration;

use super::rate_limit::RateLimiter;

const DEFAULT_SESSION_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;
const DEFAULT_PASSCODE_TTL_SECONDS: i64 = 15 * 60;
const DEFAULT_PASSCODE_MAX_ATTEMPTS: i32 = 5;
const DEFAULT_PASSCODE_RESEND_COOLDOWN_SECONDS: i64 = 60;
const DEFAULT_SIGNATURE_MAX_SKEW_SECONDS: i64 = 5 * 60;
const DEFAULT_RATE_LIMIT_WINDOW_SECONDS: u64 = 10 * 60;
const DEFAULT_RATE_LIMIT_MAX_ATTEMPTS: u32 = 20;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    frontend_base_url: String,
    session_ttl_seconds: i64,
    passcode_ttl_seconds: i64,
    passcode_max_attempts: i32,
    passcode_resend_cooldown_seconds: i64,
    signature_max_skew_seconds: i64,
    rate_limit_window: Duration,
    rate_limit_max_attempts: u32,
}

impl AuthConfig {
    #[must_use]
    pub fn new(frontend_base_url: String) -> Self {
        Self {
            frontend_base_url,
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            passcode_ttl_seconds: DEFAULT_PASSCODE_TTL_SECONDS,
            passcode_max_attempts: DEFAULT_PASSCODE_MAX_ATTEMPTS,
            passcode_resend_cooldown_seconds: DEFAULT_PASSCODE_RESEND_COOLDOWN_SECONDS,
            signature_max_skew_seconds: DEFAULT_SIGNATURE_MAX_SKEW_SECONDS,
            rate_limit_window: Duration::from_secs(DEFAULT_RATE_LIMIT_WINDOW_SECONDS),
            rate_limit_max_attempts: DEFAULT_RATE_LIMIT_MAX_ATTEMPTS,
        }
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_passcode_ttl_seconds(mut self, seconds: i64) -> Self {
        self.passcode_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_passcode_max_attempts(mut self, attempts: i32) -> Self {
        self.passcode_max_attempts = attempts.max(1);
        self
    }

    #[must_use]
    pub fn with_passcode_resend_cooldown_seconds(mut self, seconds: i64) -> Self {
        self.passcode_resend_cooldown_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_signature_max_skew_seconds(mut self, seconds: i64) -> Self {
        self.signature_max_skew_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_rate_limit_window_seconds(mut self, seconds: u64) -> Self {
        self.rate_limit_window = Duration::from_secs(seconds);
        self
    }

    #[must_use]
    pub fn with_rate_limit_max_attempts(mut self, attempts: u32) -> Self {
        self.rate_limit_max_attempts = attempts;
        self
    }

    pub(crate) fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    #[must_use]
    pub fn rate_limit_window(&self) -> Duration {
        self.rate_limit_window
    }

    #[must_use]
    pub fn rate_limit_max_attempts(&self) -> u32 {
        self.rate_limit_max_attempts
    }

    pub(super) fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_seconds
    }

    pub(super) fn passcode_ttl_seconds(&self) -> i64 {
        self.passcode_ttl_seconds
    }

    pub(super) fn passcode_max_attempts(&self) -> i32 {
        self.passcode_max_attempts
    }

    pub(super) fn passcode_resend_cooldown_seconds(&self) -> i64 {
        self.passcode_resend_cooldown_seconds
    }

    pub(super) fn signature_max_skew_seconds(&self) -> i64 {
        self.signature_max_skew_seconds
    }

    pub(super) fn session_cookie_secure(&self) -> bool {
        self.frontend_base_url.starts_with("https://")
    }
}

pub struct AuthState {
    config: AuthConfig,
    rate_limiter: Arc<dyn RateLimiter>,
}

impl AuthState {
    pub fn new(config: AuthConfig, rate_limiter: Arc<dyn RateLimiter>) -> Self {
        Self {
            config,
            rate_limiter,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub(super) fn rate_limiter(&self) -> &dyn RateLimiter {
        self.rate_limiter.as_ref()
    }
}
