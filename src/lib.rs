//! # Wicket (Session & Login Service)
//!
//! `wicket` owns the login surface of a web application: joining, logging in
//! and out, resetting a forgotten password with an emailed passcode, and
//! deciding who a request belongs to.
//!
//! ## Request Authentication
//!
//! A request can prove its identity two ways, and both may be present at once:
//!
//! - **Session:** the `wicket_session` cookie (or a `Bearer` token) issued by
//!   join/login, stored server-side as a SHA-256 hash.
//! - **HTTP signature:** a draft-cavage `Signature` over selected request
//!   headers, made with an ed25519 key the identity registered earlier.
//!
//! Both lookups run concurrently. When both resolve, they must name the same
//! identity; otherwise the request is rejected with `401 Unauthorized`. A
//! signature that fails verification is never papered over by a valid session.
//!
//! ## Password Reset
//!
//! A forgotten password is replaced by proving control of the email address: a
//! six-digit passcode is mailed through the transactional outbox, accepted a
//! limited number of times before it expires, and a successful reset revokes
//! every open session of that identity.

pub mod api;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
