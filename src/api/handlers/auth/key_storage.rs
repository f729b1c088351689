//! Storage for HTTP-signature public keys.

use anyhow::{Context, Result, anyhow};
use sqlx::{PgPool, Row};
use tracing::Instrument;
use ulid::Ulid;
use uuid::Uuid;

use super::storage::IdentityRecord;
use super::utils::is_unique_violation;

pub(super) const KEY_ALGORITHM: &str = "ed25519";

#[derive(Clone, Debug, PartialEq, Eq)]
pub(super) struct KeyRecord {
    pub(super) key_id: String,
    pub(super) algorithm: String,
    pub(super) label: Option<String>,
    pub(super) created_at_unix: i64,
}

/// An unrevoked key together with the identity that owns it.
#[derive(Clone, Debug)]
pub(super) struct ActiveKey {
    pub(super) key_id: String,
    pub(super) public_key: Vec<u8>,
    pub(super) identity: IdentityRecord,
}

fn key_from_row(row: &sqlx::postgres::PgRow) -> KeyRecord {
    KeyRecord {
        key_id: row.get("key_id"),
        algorithm: row.get("algorithm"),
        label: row.get("label"),
        created_at_unix: row.get("created_at_unix"),
    }
}

/// Register a public key; the server assigns the `keyId` clients sign with.
pub(super) async fn insert_key(
    pool: &PgPool,
    identity_id: Uuid,
    public_key: &[u8],
    label: Option<&str>,
) -> Result<KeyRecord> {
    let query = r"
        INSERT INTO identity_keys (identity_id, key_id, algorithm, public_key, label)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING key_id, algorithm, label,
                  EXTRACT(EPOCH FROM created_at)::BIGINT AS created_at_unix
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );

    for _ in 0..3 {
        let key_id = Ulid::new().to_string();
        let result = sqlx::query(query)
            .bind(identity_id)
            .bind(&key_id)
            .bind(KEY_ALGORITHM)
            .bind(public_key)
            .bind(label)
            .fetch_one(pool)
            .instrument(span.clone())
            .await;

        match result {
            Ok(row) => return Ok(key_from_row(&row)),
            Err(err) if is_unique_violation(&err) => {}
            Err(err) => return Err(err).context("failed to insert signature key"),
        }
    }

    Err(anyhow!("failed to generate unique key id"))
}

pub(super) async fn list_keys(pool: &PgPool, identity_id: Uuid) -> Result<Vec<KeyRecord>> {
    let query = r"
        SELECT key_id, algorithm, label,
               EXTRACT(EPOCH FROM created_at)::BIGINT AS created_at_unix
        FROM identity_keys
        WHERE identity_id = $1
          AND revoked_at IS NULL
        ORDER BY created_at, key_id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query)
        .bind(identity_id)
        .fetch_all(pool)
        .instrument(span)
        .await
        .context("failed to list signature keys")?;

    Ok(rows.iter().map(key_from_row).collect())
}

/// Revoke a key owned by `identity_id`. Returns false when nothing matched.
pub(super) async fn revoke_key(pool: &PgPool, identity_id: Uuid, key_id: &str) -> Result<bool> {
    let query = r"
        UPDATE identity_keys
        SET revoked_at = NOW()
        WHERE identity_id = $1
          AND key_id = $2
          AND revoked_at IS NULL
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(identity_id)
        .bind(key_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to revoke signature key")?;

    Ok(result.rows_affected() > 0)
}

pub(super) async fn lookup_active_key(pool: &PgPool, key_id: &str) -> Result<Option<ActiveKey>> {
    let query = r"
        SELECT identity_keys.key_id, identity_keys.public_key,
               identities.id, identities.email, identities.display_name
        FROM identity_keys
        JOIN identities ON identities.id = identity_keys.identity_id
        WHERE identity_keys.key_id = $1
          AND identity_keys.revoked_at IS NULL
        LIMIT 1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(key_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup signature key")?;

    Ok(row.map(|row| ActiveKey {
        key_id: row.get("key_id"),
        public_key: row.get("public_key"),
        identity: IdentityRecord {
            id: row.get("id"),
            email: row.get("email"),
            display_name: row.get("display_name"),
        },
    }))
}
