//! Registration endpoint.
//!
//! Flow Overview: validate the payload, hash the password off the request
//! worker, insert the identity together with its welcome email, then open a
//! session so the caller is signed in right away.

use axum::{
    Json,
    extract::{Extension, rejection::JsonRejection},
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::IntoResponse,
};
use secrecy::SecretString;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{error, info};
use validator::Validate;

use super::credentials::hash_password_blocking;
use super::rate_limit::{RateLimitAction, RateLimitDecision};
use super::session::session_cookie;
use super::state::AuthState;
use super::storage::{JoinOutcome, insert_identity, insert_session};
use super::types::{IdentityResponse, JoinRequest};
use super::utils::{extract_client_ip, json_payload, normalize_email, validation_message};

#[utoipa::path(
    post,
    path = "/v1/auth/join",
    request_body = JoinRequest,
    responses(
        (status = 201, description = "Identity created and session opened", body = IdentityResponse),
        (status = 400, description = "Invalid payload", body = String),
        (status = 409, description = "Identity already exists", body = String),
        (status = 429, description = "Rate limited", body = String)
    ),
    tag = "auth"
)]
pub async fn join(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Result<Json<JoinRequest>, JsonRejection>,
) -> impl IntoResponse {
    let mut request: JoinRequest = match json_payload(payload) {
        Ok(request) => request,
        Err(response) => return response,
    };

    request.email = normalize_email(&request.email);
    request.display_name = request.display_name.trim().to_string();
    if let Err(errors) = request.validate() {
        return (StatusCode::BAD_REQUEST, validation_message(&errors)).into_response();
    }

    let client_ip = extract_client_ip(&headers);
    if auth_state
        .rate_limiter()
        .check_ip(client_ip.as_deref(), RateLimitAction::Join)
        == RateLimitDecision::Limited
    {
        return (StatusCode::TOO_MANY_REQUESTS, "Rate limited".to_string()).into_response();
    }

    let JoinRequest {
        email,
        display_name,
        password,
    } = request;

    let password_hash = match hash_password_blocking(SecretString::from(password)).await {
        Ok(hash) => hash,
        Err(err) => {
            error!("Failed to hash password: {err:#}");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Join failed".to_string()).into_response();
        }
    };

    let identity = match insert_identity(&pool, &email, &display_name, &password_hash).await {
        Ok(JoinOutcome::Created(identity)) => identity,
        Ok(JoinOutcome::Conflict) => {
            return (StatusCode::CONFLICT, "Identity already exists".to_string()).into_response();
        }
        Err(err) => {
            error!("Failed to create identity: {err:#}");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Join failed".to_string()).into_response();
        }
    };
    info!(identity_id = %identity.id, "Identity created");

    let token =
        match insert_session(&pool, identity.id, auth_state.config().session_ttl_seconds()).await {
            Ok(token) => token,
            Err(err) => {
                error!("Failed to create session after join: {err:#}");
                return (StatusCode::INTERNAL_SERVER_ERROR, "Join failed".to_string())
                    .into_response();
            }
        };

    let mut response_headers = HeaderMap::new();
    match session_cookie(auth_state.config(), &token) {
        Ok(cookie) => {
            response_headers.insert(SET_COOKIE, cookie);
        }
        Err(err) => {
            error!("Failed to build session cookie: {err}");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Join failed".to_string()).into_response();
        }
    }

    let response = IdentityResponse {
        id: identity.id.to_string(),
        email: identity.email,
        display_name: identity.display_name,
    };
    (StatusCode::CREATED, response_headers, Json(response)).into_response()
}
