//! Password reset via emailed passcodes.
//!
//! Flow Overview: `forgot` stores a hashed 6-digit passcode and queues it by
//! email; `reset` checks the passcode under a row lock, swaps the password hash
//! and revokes every session of the identity.

use axum::{
    Json,
    extract::{Extension, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use secrecy::SecretString;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{debug, error, info};
use validator::Validate;

use super::credentials::hash_password_blocking;
use super::rate_limit::{RateLimitAction, RateLimitDecision};
use super::state::AuthState;
use super::storage::{
    ForgotOutcome, ResetOutcome, issue_passcode, reset_password as reset_stored_password,
};
use super::types::{ForgotPasswordRequest, ResetPasswordRequest};
use super::utils::{
    extract_client_ip, json_payload, normalize_email, valid_passcode, validation_message,
};

const INVALID_PASSCODE: &str = "Invalid or expired passcode";

#[utoipa::path(
    post,
    path = "/v1/auth/password/forgot",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 204, description = "Passcode sent if the identity exists"),
        (status = 400, description = "Missing payload", body = String),
        (status = 429, description = "Rate limited", body = String)
    ),
    tag = "auth"
)]
pub async fn forgot_password(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Result<Json<ForgotPasswordRequest>, JsonRejection>,
) -> impl IntoResponse {
    let mut request: ForgotPasswordRequest = match json_payload(payload) {
        Ok(request) => request,
        Err(response) => return response,
    };

    let client_ip = extract_client_ip(&headers);
    let limiter = auth_state.rate_limiter();
    if limiter.check_ip(client_ip.as_deref(), RateLimitAction::PasswordForgot)
        == RateLimitDecision::Limited
    {
        return (StatusCode::TOO_MANY_REQUESTS, "Rate limited".to_string()).into_response();
    }

    // From here on every path answers 204 so the response never reveals
    // whether an identity exists.
    request.email = normalize_email(&request.email);
    if request.validate().is_err() {
        return StatusCode::NO_CONTENT.into_response();
    }
    if limiter.check_email(&request.email, RateLimitAction::PasswordForgot)
        == RateLimitDecision::Limited
    {
        return StatusCode::NO_CONTENT.into_response();
    }

    match issue_passcode(&pool, &request.email, auth_state.config()).await {
        Ok(ForgotOutcome::Queued) => info!("Password reset passcode queued"),
        Ok(outcome) => debug!(?outcome, "Password reset passcode not issued"),
        Err(err) => error!("Failed to issue password reset passcode: {err:#}"),
    }

    StatusCode::NO_CONTENT.into_response()
}

#[utoipa::path(
    post,
    path = "/v1/auth/password/reset",
    request_body = ResetPasswordRequest,
    responses(
        (status = 204, description = "Password changed and sessions revoked"),
        (status = 400, description = "Invalid payload or passcode", body = String),
        (status = 429, description = "Rate limited", body = String)
    ),
    tag = "auth"
)]
pub async fn reset_password(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Result<Json<ResetPasswordRequest>, JsonRejection>,
) -> impl IntoResponse {
    let mut request: ResetPasswordRequest = match json_payload(payload) {
        Ok(request) => request,
        Err(response) => return response,
    };

    request.email = normalize_email(&request.email);
    request.passcode = request.passcode.trim().to_string();
    if let Err(errors) = request.validate() {
        return (StatusCode::BAD_REQUEST, validation_message(&errors)).into_response();
    }
    if !valid_passcode(&request.passcode) {
        return (StatusCode::BAD_REQUEST, "Invalid passcode".to_string()).into_response();
    }

    let client_ip = extract_client_ip(&headers);
    let limiter = auth_state.rate_limiter();
    if limiter.check_ip(client_ip.as_deref(), RateLimitAction::PasswordReset)
        == RateLimitDecision::Limited
    {
        return (StatusCode::TOO_MANY_REQUESTS, "Rate limited".to_string()).into_response();
    }
    if limiter.check_email(&request.email, RateLimitAction::PasswordReset)
        == RateLimitDecision::Limited
    {
        return (StatusCode::TOO_MANY_REQUESTS, "Rate limited".to_string()).into_response();
    }

    let ResetPasswordRequest {
        email,
        passcode,
        password,
    } = request;

    // Hash before opening the transaction so the row lock is held briefly.
    let password_hash = match hash_password_blocking(SecretString::from(password)).await {
        Ok(hash) => hash,
        Err(err) => {
            error!("Failed to hash password: {err:#}");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Reset failed".to_string())
                .into_response();
        }
    };

    match reset_stored_password(
        &pool,
        &email,
        &passcode,
        &password_hash,
        auth_state.config(),
    )
    .await
    {
        Ok(ResetOutcome::Reset) => {
            info!("Password reset completed");
            StatusCode::NO_CONTENT.into_response()
        }
        Ok(ResetOutcome::Invalid) => {
            (StatusCode::BAD_REQUEST, INVALID_PASSCODE.to_string()).into_response()
        }
        Err(err) => {
            error!("Failed to reset password: {err:#}");
            (StatusCode::INTERNAL_SERVER_ERROR, "Reset failed".to_string()).into_response()
        }
    }
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
    use axum::http::HeaderValue;
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

    fn reset_request(passcode: &str, password: &str) -> ResetPasswordRequest {
        ResetPasswordRequest {
            email: "alice@example.com".to_string(),
            passcode: passcode.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn forgot_invalid_email_is_silent() -> Result<()> {
        let response = forgot_password(
            HeaderMap::new(),
            Extension(lazy_pool()?),
            Extension(state(Arc::new(NoopRateLimiter))),
            Ok(Json(ForgotPasswordRequest {
                email: "nope".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        Ok(())
    }

    #[tokio::test]
    async fn forgot_email_limit_is_silent() -> Result<()> {
        let limiter = Arc::new(MemoryRateLimiter::new(Duration::from_secs(60), 1));
        limiter.check_email("alice@example.com", RateLimitAction::PasswordForgot);

        let response = forgot_password(
            HeaderMap::new(),
            Extension(lazy_pool()?),
            Extension(state(limiter)),
            Ok(Json(ForgotPasswordRequest {
                email: "alice@example.com".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        Ok(())
    }

    #[tokio::test]
    async fn forgot_ip_limit_is_reported() -> Result<()> {
        let limiter = Arc::new(MemoryRateLimiter::new(Duration::from_secs(60), 1));
        limiter.check_ip(Some("10.2.2.2"), RateLimitAction::PasswordForgot);

        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("10.2.2.2"));
        let response = forgot_password(
            headers,
            Extension(lazy_pool()?),
            Extension(state(limiter)),
            Ok(Json(ForgotPasswordRequest {
                email: "alice@example.com".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        Ok(())
    }

    #[tokio::test]
    async fn reset_rejects_malformed_passcode() -> Result<()> {
        for passcode in ["12345", "abcdef", "1234567"] {
            let response = reset_password(
                HeaderMap::new(),
                Extension(lazy_pool()?),
                Extension(state(Arc::new(NoopRateLimiter))),
                Ok(Json(reset_request(passcode, "new-password-123"))),
            )
            .await
            .into_response();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{passcode}");
        }
        Ok(())
    }

    #[tokio::test]
    async fn reset_rejects_short_password() -> Result<()> {
        let response = reset_password(
            HeaderMap::new(),
            Extension(lazy_pool()?),
            Extension(state(Arc::new(NoopRateLimiter))),
            Ok(Json(reset_request("123456", "short"))),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn reset_missing_payload() -> Result<()> {
        let response = reset_password(
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
}
