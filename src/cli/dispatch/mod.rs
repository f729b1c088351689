use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::{auth, email};
use anyhow::{Context, Result};
use secrecy::SecretString;

fn required<T: Clone + Send + Sync + 'static>(matches: &clap::ArgMatches, id: &str) -> Result<T> {
    matches
        .get_one::<T>(id)
        .cloned()
        .with_context(|| format!("missing required argument: --{id}"))
}

/// # Errors
/// Returns an error if required arguments are missing.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn: String = required(matches, "dsn")?;

    Ok(Action::Server(Args {
        port,
        dsn: SecretString::from(dsn),
        frontend_base_url: required(matches, auth::ARG_FRONTEND_BASE_URL)?,
        session_ttl_seconds: required(matches, auth::ARG_SESSION_TTL_SECONDS)?,
        passcode_ttl_seconds: required(matches, auth::ARG_PASSCODE_TTL_SECONDS)?,
        passcode_max_attempts: required(matches, auth::ARG_PASSCODE_MAX_ATTEMPTS)?,
        passcode_resend_cooldown_seconds: required(
            matches,
            auth::ARG_PASSCODE_RESEND_COOLDOWN_SECONDS,
        )?,
        signature_max_skew_seconds: required(matches, auth::ARG_SIGNATURE_MAX_SKEW_SECONDS)?,
        rate_limit_window_seconds: required(matches, auth::ARG_RATE_LIMIT_WINDOW_SECONDS)?,
        rate_limit_max_attempts: required(matches, auth::ARG_RATE_LIMIT_MAX_ATTEMPTS)?,
        email_outbox_poll_seconds: required(matches, email::ARG_OUTBOX_POLL_SECONDS)?,
        email_outbox_batch_size: required(matches, email::ARG_OUTBOX_BATCH_SIZE)?,
        email_outbox_max_attempts: required(matches, email::ARG_OUTBOX_MAX_ATTEMPTS)?,
        email_outbox_backoff_base_seconds: required(
            matches,
            email::ARG_OUTBOX_BACKOFF_BASE_SECONDS,
        )?,
        email_outbox_backoff_max_seconds: required(matches, email::ARG_OUTBOX_BACKOFF_MAX_SECONDS)?,
    }))
}
