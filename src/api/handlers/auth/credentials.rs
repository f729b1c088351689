//! Argon2id password hashing for join, login and password reset.
//!
//! Hashes are stored as PHC strings so parameters and salt travel with the
//! hash. Hashing is CPU bound; the async wrappers move it onto the blocking
//! pool so request workers keep serving.

use anyhow::{Context, Result, anyhow};
use argon2::Argon2;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use once_cell::sync::Lazy;
use rand::rngs::OsRng;
use secrecy::{ExposeSecret, SecretString};

/// Stand-in hash for logins with an unknown email, built with the same
/// parameters as stored hashes so both failures cost one full verify.
static DUMMY_HASH: Lazy<Option<String>> =
    Lazy::new(|| hash_password("wicket-dummy-password").ok());

/// Hash a plaintext password using Argon2id with a random salt.
pub(super) fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| anyhow!("failed to hash password: {err}"))?;
    Ok(hash.to_string())
}

/// Verify a plaintext password against a stored PHC hash.
///
/// A mismatch is `Ok(false)`; a malformed stored hash is an error.
pub(super) fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|err| anyhow!("invalid password hash: {err}"))?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(err) => Err(anyhow!("failed to verify password: {err}")),
    }
}

pub(super) async fn hash_password_blocking(password: SecretString) -> Result<String> {
    tokio::task::spawn_blocking(move || hash_password(password.expose_secret()))
        .await
        .context("password hashing task failed")?
}

pub(super) async fn verify_password_blocking(password: SecretString, hash: String) -> Result<bool> {
    tokio::task::spawn_blocking(move || verify_password(password.expose_secret(), &hash))
        .await
        .context("password verification task failed")?
}

/// Verify against the stand-in hash. Never succeeds.
pub(super) async fn verify_dummy_password_blocking(password: SecretString) -> Result<bool> {
    tokio::task::spawn_blocking(move || {
        let hash = DUMMY_HASH
            .as_deref()
            .ok_or_else(|| anyhow!("dummy password hash unavailable"))?;
        verify_password(password.expose_secret(), hash).map(|_| false)
    })
    .await
    .context("password verification task failed")?
}
