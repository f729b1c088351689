//! Management of the ed25519 public keys used for HTTP signatures.
//!
//! Every route here requires an authenticated principal; a session is enough
//! to register the first key, after which requests can be signed instead.
//! A signed registration must carry a `Digest` of its body.

use axum::{
    Json,
    body::Bytes,
    extract::{Extension, OriginalUri, Path},
    http::{HeaderMap, Method, StatusCode},
    response::IntoResponse,
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use ed25519_dalek::VerifyingKey;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{debug, error, info};
use validator::Validate;

use super::key_storage::{
    KeyRecord, insert_key, list_keys as list_stored_keys, revoke_key as revoke_stored_key,
};
use super::principal::{AuthError, auth_error_response, require_auth};
use super::signature::verify_body_digest;
use super::state::AuthState;
use super::types::{CreateKeyRequest, KeyResponse};
use super::utils::{MISSING_PAYLOAD, validation_message};

impl From<KeyRecord> for KeyResponse {
    fn from(record: KeyRecord) -> Self {
        Self {
            key_id: record.key_id,
            algorithm: record.algorithm,
            label: record.label,
            created_at_unix: record.created_at_unix,
        }
    }
}

/// Decode a base64 ed25519 public key, rejecting weak or malformed points.
fn decode_public_key(encoded: &str) -> Option<[u8; 32]> {
    let bytes = STANDARD.decode(encoded.trim().as_bytes()).ok()?;
    let bytes: [u8; 32] = bytes.try_into().ok()?;
    let key = VerifyingKey::from_bytes(&bytes).ok()?;
    if key.is_weak() {
        return None;
    }
    Some(bytes)
}

#[utoipa::path(
    post,
    path = "/v1/auth/keys",
    request_body = CreateKeyRequest,
    responses(
        (status = 201, description = "Key registered", body = KeyResponse),
        (status = 400, description = "Invalid public key", body = String),
        (status = 401, description = "Not authenticated", body = String)
    ),
    tag = "auth"
)]
pub async fn create_key(
    method: Method,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    body: Bytes,
) -> impl IntoResponse {
    let principal = match require_auth(&headers, &method, &uri, &pool, auth_state.config()).await {
        Ok(principal) => principal,
        Err(response) => return response,
    };

    // The signature covers the body only through the signed digest.
    if principal.key_id.is_some()
        && let Err(err) = verify_body_digest(&headers, &body)
    {
        return auth_error_response(&AuthError::Signature(err));
    }

    let request: CreateKeyRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(err) => {
            debug!("Rejected key registration body: {err}");
            return (StatusCode::BAD_REQUEST, MISSING_PAYLOAD.to_string()).into_response();
        }
    };
    if let Err(errors) = request.validate() {
        return (StatusCode::BAD_REQUEST, validation_message(&errors)).into_response();
    }

    let Some(public_key) = decode_public_key(&request.public_key) else {
        return (StatusCode::BAD_REQUEST, "Invalid public key".to_string()).into_response();
    };
    let label = request
        .label
        .as_deref()
        .map(str::trim)
        .filter(|label| !label.is_empty());

    match insert_key(&pool, principal.identity.id, &public_key, label).await {
        Ok(record) => {
            info!(
                identity_id = %principal.identity.id,
                key_id = %record.key_id,
                "Signature key registered"
            );
            (StatusCode::CREATED, Json(KeyResponse::from(record))).into_response()
        }
        Err(err) => {
            error!("Failed to register signature key: {err:#}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/v1/auth/keys",
    responses(
        (status = 200, description = "Active keys of the caller", body = [KeyResponse]),
        (status = 401, description = "Not authenticated", body = String)
    ),
    tag = "auth"
)]
pub async fn list_keys(
    method: Method,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let principal = match require_auth(&headers, &method, &uri, &pool, auth_state.config()).await {
        Ok(principal) => principal,
        Err(response) => return response,
    };

    match list_stored_keys(&pool, principal.identity.id).await {
        Ok(records) => {
            let keys: Vec<KeyResponse> = records.into_iter().map(KeyResponse::from).collect();
            (StatusCode::OK, Json(keys)).into_response()
        }
        Err(err) => {
            error!("Failed to list signature keys: {err:#}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    delete,
    path = "/v1/auth/keys/{key_id}",
    params(
        ("key_id" = String, Path, description = "Key identifier returned at registration")
    ),
    responses(
        (status = 204, description = "Key revoked"),
        (status = 401, description = "Not authenticated", body = String),
        (status = 404, description = "Key not found", body = String)
    ),
    tag = "auth"
)]
pub async fn revoke_key(
    method: Method,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    Path(key_id): Path<String>,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let principal = match require_auth(&headers, &method, &uri, &pool, auth_state.config()).await {
        Ok(principal) => principal,
        Err(response) => return response,
    };

    match revoke_stored_key(&pool, principal.identity.id, &key_id).await {
        Ok(true) => {
            info!(
                identity_id = %principal.identity.id,
                key_id = %key_id,
                "Signature key revoked"
            );
            StatusCode::NO_CONTENT.into_response()
        }
        Ok(false) => (StatusCode::NOT_FOUND, "Key not found".to_string()).into_response(),
        Err(err) => {
            error!("Failed to revoke signature key: {err:#}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
