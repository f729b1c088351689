//! Auth handlers and supporting modules.
//!
//! This module covers registration, password login, logout, password reset by
//! emailed passcode, and request authentication.
//!
//! ## Request authentication
//!
//! A request can prove its identity in two ways:
//!
//! - **Session:** the `wicket_session` cookie (or `Authorization: Bearer`),
//!   issued by join and login. Only the SHA-256 of the token is stored.
//! - **HTTP signature:** an ed25519 signature over `(request-target)` and a
//!   timestamp, made with a key registered under `/v1/auth/keys`.
//!
//! Both are resolved concurrently. When both are present they must name the
//! same identity, otherwise the request is rejected with 401. A signature that
//! fails verification is rejected outright, even next to a valid session.
//!
//! ## Password reset
//!
//! - **Passcode:** 6 digits, valid for 15 minutes, stored hashed.
//! - **Attempt Limit:** 5 wrong guesses burn the passcode.
//! - **Resend Cooldown:** one new passcode per identity per minute.
//!
//! A successful reset revokes every session of the identity.

mod credentials;
pub(crate) mod join;
mod key_storage;
pub(crate) mod keys;
pub(crate) mod login;
pub(crate) mod password;
pub(crate) mod principal;
mod rate_limit;
pub(crate) mod session;
pub(crate) mod signature;
mod state;
mod storage;
pub(crate) mod types;
mod utils;

pub use rate_limit::{
    MemoryRateLimiter, NoopRateLimiter, RateLimitAction, RateLimitDecision, RateLimiter,
};
pub use signature::SignatureError;
pub use state::{AuthConfig, AuthState};
