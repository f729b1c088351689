//! Password login endpoint.

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

use super::credentials::{verify_dummy_password_blocking, verify_password_blocking};
use super::rate_limit::{RateLimitAction, RateLimitDecision};
use super::session::session_cookie;
use super::state::AuthState;
use super::storage::{insert_session, lookup_login_record, record_login};
use super::types::{IdentityResponse, LoginRequest};
use super::utils::{extract_client_ip, json_payload, normalize_email, validation_message};

const INVALID_CREDENTIALS: &str = "Invalid credentials";

#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session opened", body = IdentityResponse),
        (status = 400, description = "Invalid payload", body = String),
        (status = 401, description = "Invalid credentials", body = String),
        (status = 429, description = "Rate limited", body = String)
    ),
    tag = "auth"
)]
pub async fn login(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> impl IntoResponse {
    let mut request: LoginRequest = match json_payload(payload) {
        Ok(request) => request,
        Err(response) => return response,
    };

    request.email = normalize_email(&request.email);
    if let Err(errors) = request.validate() {
        return (StatusCode::BAD_REQUEST, validation_message(&errors)).into_response();
    }

    let client_ip = extract_client_ip(&headers);
    let limiter = auth_state.rate_limiter();
    if limiter.check_ip(client_ip.as_deref(), RateLimitAction::Login) == RateLimitDecision::Limited
    {
        return (StatusCode::TOO_MANY_REQUESTS, "Rate limited".to_string()).into_response();
    }
    if limiter.check_email(&request.email, RateLimitAction::Login) == RateLimitDecision::Limited {
        return (StatusCode::TOO_MANY_REQUESTS, "Rate limited".to_string()).into_response();
    }

    let record = match lookup_login_record(&pool, &request.email).await {
        Ok(Some(record)) => record,
        // Unknown emails pay for a verify too, then share the wrong-password response.
        Ok(None) => {
            let password = SecretString::from(request.password);
            if let Err(err) = verify_dummy_password_blocking(password).await {
                error!("Failed to verify dummy password: {err:#}");
            }
            return (StatusCode::UNAUTHORIZED, INVALID_CREDENTIALS.to_string()).into_response();
        }
        Err(err) => {
            error!("Failed to lookup login record: {err:#}");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Login failed".to_string()).into_response();
        }
    };

    match verify_password_blocking(SecretString::from(request.password), record.password_hash).await
    {
        Ok(true) => {}
        Ok(false) => {
            return (StatusCode::UNAUTHORIZED, INVALID_CREDENTIALS.to_string()).into_response();
        }
        Err(err) => {
            error!("Failed to verify password: {err:#}");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Login failed".to_string()).into_response();
        }
    }

    let identity = record.identity;
    let token =
        match insert_session(&pool, identity.id, auth_state.config().session_ttl_seconds()).await {
            Ok(token) => token,
            Err(err) => {
                error!("Failed to create session: {err:#}");
                return (StatusCode::INTERNAL_SERVER_ERROR, "Login failed".to_string())
                    .into_response();
            }
        };

    if let Err(err) = record_login(&pool, identity.id).await {
        // Bookkeeping only; the session is already valid.
        error!("Failed to record login: {err:#}");
    }
    info!(identity_id = %identity.id, "Identity logged in");

    let mut response_headers = HeaderMap::new();
    match session_cookie(auth_state.config(), &token) {
        Ok(cookie) => {
            response_headers.insert(SET_COOKIE, cookie);
        }
        Err(err) => {
            error!("Failed to build session cookie: {err}");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Login failed".to_string()).into_response();
        }
    }

    let response = IdentityResponse {
        id: identity.id.to_string(),
        email: identity.email,
        display_name: identity.display_name,
    };
    (StatusCode::OK, response_headers, Json(response)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::auth::utils::rejected_json;
    use crate::api::handlers::auth::{
        rate_limit::{MemoryRateLimiter, NoopRateLimiter, RateLimiter},
        state::AuthConfig,
    };
    use anyhow::Result;
    use sqlx::postgres::PgPoolOptions;
    use std::time::Duration;

    fn state(rate_limiter: Arc<dyn RateLimiter>) -> Arc<AuthState> {
        Arc::new(AuthState::new(
            AuthConfig::new("https://wicket.dev".to_string()),
            rate_limiter,
        ))
    }

    fn lazy_pool() -> Result<PgPool> {
        Ok(PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/wicket")?)
    }

    #[tokio::test]
    async fn login_missing_payload() -> Result<()> {
        let response = login(
            HeaderMap::new(),
            Extension(lazy_pool()?),
            Extension(state(Arc::new(NoopRateLimiter))),
            rejected_json().await,
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn login_rejects_empty_password() -> Result<()> {
        let response = login(
            HeaderMap::new(),
            Extension(lazy_pool()?),
            Extension(state(Arc::new(NoopRateLimiter))),
            Ok(Json(LoginRequest {
                email: "alice@example.com".to_string(),
                password: String::new(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn login_rate_limited_by_normalized_email() -> Result<()> {
        let limiter = Arc::new(MemoryRateLimiter::new(Duration::from_secs(60), 1));
        limiter.check_email("alice@example.com", RateLimitAction::Login);

        let response = login(
            HeaderMap::new(),
            Extension(lazy_pool()?),
            Extension(state(limiter)),
            Ok(Json(LoginRequest {
                email: "  Alice@Example.com ".to_string(),
                password: "whatever".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        Ok(())
    }
}
