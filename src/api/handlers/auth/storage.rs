//! Database helpers for identities, sessions and password reset passcodes.

use anyhow::{Context, Result, anyhow};
use serde_json::json;
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use crate::api::email::{EmailTemplate, enqueue_email};

use super::state::AuthConfig;
use super::utils::{
    constant_time_eq, generate_passcode, generate_session_token, hash_passcode,
    hash_session_token, is_unique_violation,
};

/// Outcome when attempting to create a new identity.
#[derive(Debug)]
pub(super) enum JoinOutcome {
    Created(IdentityRecord),
    Conflict,
}

/// Outcome for a forgot-password request (always 204 to avoid account probing).
#[derive(Debug, PartialEq, Eq)]
pub(super) enum ForgotOutcome {
    Queued,
    Cooldown,
    Noop,
}

/// Outcome for a passcode-backed password reset.
#[derive(Debug, PartialEq, Eq)]
pub(super) enum ResetOutcome {
    Reset,
    Invalid,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct IdentityRecord {
    pub(crate) id: Uuid,
    pub(crate) email: String,
    pub(crate) display_name: String,
}

/// Identity plus the stored hash, needed only by login.
pub(super) struct LoginRecord {
    pub(super) identity: IdentityRecord,
    pub(super) password_hash: String,
}

/// Minimal data returned for a valid session cookie.
#[derive(Clone, Debug)]
pub(crate) struct SessionRecord {
    pub(crate) identity: IdentityRecord,
}

fn identity_from_row(row: &sqlx::postgres::PgRow) -> IdentityRecord {
    IdentityRecord {
        id: row.get("id"),
        email: row.get("email"),
        display_name: row.get("display_name"),
    }
}

/// Insert a new identity and queue its welcome email in one transaction.
pub(super) async fn insert_identity(
    pool: &PgPool,
    email: &str,
    display_name: &str,
    password_hash: &str,
) -> Result<JoinOutcome> {
    let mut tx = pool.begin().await.context("begin join transaction")?;

    let query = r"
        INSERT INTO identities (email, display_name, password_hash)
        VALUES ($1, $2, $3)
        RETURNING id, email, display_name
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .bind(display_name)
        .bind(password_hash)
        .fetch_one(&mut *tx)
        .instrument(span)
        .await;

    let identity = match row {
        Ok(row) => identity_from_row(&row),
        Err(err) => {
            if is_unique_violation(&err) {
                let _ = tx.rollback().await;
                return Ok(JoinOutcome::Conflict);
            }
            return Err(err).context("failed to insert identity");
        }
    };

    let payload = json!({
        "email": identity.email,
        "display_name": identity.display_name,
    });
    enqueue_email(&mut tx, &identity.email, EmailTemplate::Welcome, &payload).await?;

    tx.commit().await.context("commit join transaction")?;

    Ok(JoinOutcome::Created(identity))
}

/// Look up login data by normalized email.
pub(super) async fn lookup_login_record(pool: &PgPool, email: &str) -> Result<Option<LoginRecord>> {
    let query = "SELECT id, email, display_name, password_hash FROM identities WHERE email = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup login record")?;

    Ok(row.map(|row| LoginRecord {
        identity: identity_from_row(&row),
        password_hash: row.get("password_hash"),
    }))
}

pub(super) async fn record_login(pool: &PgPool, identity_id: Uuid) -> Result<()> {
    let query = "UPDATE identities SET last_login_at = NOW() WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(identity_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to record login")?;
    Ok(())
}

pub(super) async fn insert_session(
    pool: &PgPool,
    identity_id: Uuid,
    ttl_seconds: i64,
) -> Result<String> {
    // Generate a random token, store only its hash, and return the raw value
    // so the caller can set the session cookie.
    let query = r"
        INSERT INTO identity_sessions (identity_id, session_hash, expires_at)
        VALUES ($1, $2, NOW() + ($3 * INTERVAL '1 second'))
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );

    for _ in 0..3 {
        let token = generate_session_token()?;
        let token_hash = hash_session_token(&token);
        let result = sqlx::query(query)
            .bind(identity_id)
            .bind(token_hash)
            .bind(ttl_seconds)
            .execute(pool)
            .instrument(span.clone())
            .await;

        match result {
            Ok(_) => return Ok(token),
            Err(err) if is_unique_violation(&err) => {}
            Err(err) => return Err(err).context("failed to insert session"),
        }
    }

    Err(anyhow!("failed to generate unique session token"))
}

pub(crate) async fn lookup_session(
    pool: &PgPool,
    token_hash: &[u8],
) -> Result<Option<SessionRecord>> {
    let query = r"
        SELECT identities.id, identities.email, identities.display_name
        FROM identity_sessions
        JOIN identities ON identities.id = identity_sessions.identity_id
        WHERE identity_sessions.session_hash = $1
          AND identity_sessions.expires_at > NOW()
        LIMIT 1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(token_hash)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup session")?;

    Ok(row.map(|row| SessionRecord {
        identity: identity_from_row(&row),
    }))
}

pub(super) async fn delete_session(pool: &PgPool, token_hash: &[u8]) -> Result<()> {
    // Logout is idempotent; it's fine if no rows are deleted.
    let query = "DELETE FROM identity_sessions WHERE session_hash = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(token_hash)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to delete session")?;
    Ok(())
}

/// Issue a fresh reset passcode and queue the email carrying it.
pub(super) async fn issue_passcode(
    pool: &PgPool,
    email: &str,
    config: &AuthConfig,
) -> Result<ForgotOutcome> {
    let mut tx = pool.begin().await.context("begin forgot transaction")?;

    let query = "SELECT id, email, display_name FROM identities WHERE email = $1 LIMIT 1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .fetch_optional(&mut *tx)
        .instrument(span)
        .await
        .context("failed to lookup identity for passcode")?;

    let Some(row) = row else {
        tx.commit().await.context("commit forgot noop")?;
        return Ok(ForgotOutcome::Noop);
    };
    let identity = identity_from_row(&row);

    // Cooldown keeps repeated requests from spamming the outbox.
    let query = r"
        SELECT 1
        FROM password_reset_passcodes
        WHERE identity_id = $1
          AND created_at > NOW() - ($2 * INTERVAL '1 second')
        LIMIT 1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let recent = sqlx::query(query)
        .bind(identity.id)
        .bind(config.passcode_resend_cooldown_seconds())
        .fetch_optional(&mut *tx)
        .instrument(span)
        .await
        .context("failed to check passcode cooldown")?;
    if recent.is_some() {
        tx.commit().await.context("commit forgot cooldown")?;
        return Ok(ForgotOutcome::Cooldown);
    }

    let passcode = generate_passcode();
    let passcode_hash = hash_passcode(identity.id, &passcode);

    // One live passcode per identity; a new request replaces the old one.
    let query = r"
        INSERT INTO password_reset_passcodes (identity_id, passcode_hash, attempts, created_at, expires_at)
        VALUES ($1, $2, 0, NOW(), NOW() + ($3 * INTERVAL '1 second'))
        ON CONFLICT (identity_id) DO UPDATE
        SET passcode_hash = EXCLUDED.passcode_hash,
            attempts = 0,
            created_at = EXCLUDED.created_at,
            expires_at = EXCLUDED.expires_at
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(identity.id)
        .bind(passcode_hash)
        .bind(config.passcode_ttl_seconds())
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to store passcode")?;

    let payload = json!({
        "email": identity.email,
        "display_name": identity.display_name,
        "passcode": passcode,
        "expires_in_minutes": config.passcode_ttl_seconds() / 60,
    });
    enqueue_email(
        &mut tx,
        &identity.email,
        EmailTemplate::PasswordReset,
        &payload,
    )
    .await?;

    tx.commit().await.context("commit forgot transaction")?;
    Ok(ForgotOutcome::Queued)
}

/// Check a passcode and, when it matches, replace the password hash and
/// revoke every session of the identity.
///
/// Wrong passcodes consume an attempt; expired or exhausted passcodes are
/// deleted. All failure modes collapse into `ResetOutcome::Invalid`.
pub(super) async fn reset_password(
    pool: &PgPool,
    email: &str,
    passcode: &str,
    new_password_hash: &str,
    config: &AuthConfig,
) -> Result<ResetOutcome> {
    let mut tx = pool.begin().await.context("begin reset transaction")?;

    let query = r"
        SELECT identities.id, identities.email, identities.display_name,
               password_reset_passcodes.passcode_hash,
               password_reset_passcodes.attempts,
               password_reset_passcodes.expires_at > NOW() AS live
        FROM password_reset_passcodes
        JOIN identities ON identities.id = password_reset_passcodes.identity_id
        WHERE identities.email = $1
        FOR UPDATE OF password_reset_passcodes
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .fetch_optional(&mut *tx)
        .instrument(span)
        .await
        .context("failed to lookup passcode")?;

    let Some(row) = row else {
        tx.commit().await.context("commit reset noop")?;
        return Ok(ResetOutcome::Invalid);
    };

    let identity = identity_from_row(&row);
    let stored_hash: Vec<u8> = row.get("passcode_hash");
    let attempts: i32 = row.get("attempts");
    let live: bool = row.get("live");

    if !live || attempts >= config.passcode_max_attempts() {
        delete_passcode(&mut tx, identity.id).await?;
        tx.commit().await.context("commit reset expiry")?;
        return Ok(ResetOutcome::Invalid);
    }

    if !constant_time_eq(&hash_passcode(identity.id, passcode), &stored_hash) {
        let query = r"
            UPDATE password_reset_passcodes
            SET attempts = attempts + 1
            WHERE identity_id = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(identity.id)
            .execute(&mut *tx)
            .instrument(span)
            .await
            .context("failed to count passcode attempt")?;
        tx.commit().await.context("commit reset attempt")?;
        return Ok(ResetOutcome::Invalid);
    }

    let query = r"
        UPDATE identities
        SET password_hash = $2,
            updated_at = NOW()
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(identity.id)
        .bind(new_password_hash)
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to update password hash")?;

    delete_passcode(&mut tx, identity.id).await?;

    let query = "DELETE FROM identity_sessions WHERE identity_id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(identity.id)
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to revoke sessions")?;

    let payload = json!({
        "email": identity.email,
        "display_name": identity.display_name,
    });
    enqueue_email(
        &mut tx,
        &identity.email,
        EmailTemplate::PasswordChanged,
        &payload,
    )
    .await?;

    tx.commit().await.context("commit reset transaction")?;
    Ok(ResetOutcome::Reset)
}

async fn delete_passcode(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    identity_id: Uuid,
) -> Result<()> {
    let query = "DELETE FROM password_reset_passcodes WHERE identity_id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(identity_id)
        .execute(&mut **tx)
        .instrument(span)
        .await
        .context("failed to delete passcode")?;
    Ok(())
}
