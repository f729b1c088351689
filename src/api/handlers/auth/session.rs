//! Session endpoints for cookie and bearer auth.

use anyhow::Result;
use axum::{
    Json,
    extract::{Extension, OriginalUri},
    http::{
        HeaderMap, HeaderValue, Method, StatusCode,
        header::{AUTHORIZATION, COOKIE, InvalidHeaderValue, SET_COOKIE},
    },
    response::IntoResponse,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

use super::{
    principal::{auth_error_response, authenticate},
    state::{AuthConfig, AuthState},
    storage::{SessionRecord, delete_session, lookup_session},
    types::SessionResponse,
    utils::hash_session_token,
};

pub(crate) const SESSION_COOKIE_NAME: &str = "wicket_session";

#[utoipa::path(
    get,
    path = "/v1/auth/session",
    responses(
        (status = 200, description = "Request is authenticated", body = SessionResponse),
        (status = 204, description = "No credentials presented"),
        (status = 401, description = "Credentials rejected or identities disagree")
    ),
    tag = "auth"
)]
pub async fn session(
    method: Method,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    match authenticate(&headers, &method, &uri, &pool, auth_state.config()).await {
        Ok(Some(principal)) => {
            let response = SessionResponse {
                identity_id: principal.identity.id.to_string(),
                email: principal.identity.email.clone(),
                display_name: principal.identity.display_name.clone(),
                methods: principal
                    .methods()
                    .iter()
                    .map(|method| method.as_str().to_string())
                    .collect(),
                key_id: principal.key_id.clone(),
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        // Missing credentials are "no session", not an error.
        Ok(None) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => auth_error_response(&err),
    }
}

/// Resolve the session cookie (or bearer token) into a session record.
///
/// Returns `Ok(None)` when no token is presented or it matches no live session.
pub(crate) async fn authenticate_session(
    headers: &HeaderMap,
    pool: &PgPool,
) -> Result<Option<SessionRecord>> {
    let Some(token) = extract_session_token(headers) else {
        return Ok(None);
    };
    // Only the hash is stored; never compare raw tokens against the database.
    let token_hash = hash_session_token(&token);
    lookup_session(pool, &token_hash).await
}

#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    responses(
        (status = 204, description = "Session cleared")
    ),
    tag = "auth"
)]
pub async fn logout(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    if let Some(token) = extract_session_token(&headers) {
        let token_hash = hash_session_token(&token);
        if let Err(err) = delete_session(&pool, &token_hash).await {
            error!("Failed to delete session: {err}");
        }
    }

    // Always clear the cookie, even if the session record was missing.
    let mut response_headers = HeaderMap::new();
    if let Ok(cookie) = clear_session_cookie(auth_state.config()) {
        response_headers.insert(SET_COOKIE, cookie);
    }
    (StatusCode::NO_CONTENT, response_headers).into_response()
}

/// Build an `HttpOnly` cookie carrying the session token.
pub(super) fn session_cookie(
    config: &AuthConfig,
    token: &str,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let ttl_seconds = config.session_ttl_seconds();
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_seconds}"
    );
    // Only mark cookies secure when the frontend is served over HTTPS.
    if config.session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

fn clear_session_cookie(config: &AuthConfig) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if config.session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = extract_bearer_token(headers) {
        return Some(token);
    }
    for header in headers.get_all(COOKIE) {
        let Ok(value) = header.to_str() else {
            continue;
        };
        for pair in value.split(';') {
            let Some((key, val)) = pair.trim().split_once('=') else {
                continue;
            };
            let val = val.trim();
            if key.trim() == SESSION_COOKIE_NAME && !val.is_empty() {
                return Some(val.to_string());
            }
        }
    }
    None
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::auth::rate_limit::NoopRateLimiter;
    use anyhow::Result;
    use axum::http::Uri;
    use sqlx::postgres::PgPoolOptions;

    fn config(base: &str) -> AuthConfig {
        AuthConfig::new(base.to_string()).with_session_ttl_seconds(3600)
    }

    #[test]
    fn session_cookie_attributes() -> Result<()> {
        let cookie = session_cookie(&config("https://wicket.dev"), "abc")?;
        assert_eq!(
            cookie.to_str()?,
            "wicket_session=abc; Path=/; HttpOnly; SameSite=Lax; Max-Age=3600; Secure"
        );

        let cookie = session_cookie(&config("http://localhost:5173"), "abc")?;
        assert!(!cookie.to_str()?.contains("Secure"));
        Ok(())
    }

    #[test]
    fn clear_cookie_expires_immediately() -> Result<()> {
        let cookie = clear_session_cookie(&config("https://wicket.dev"))?;
        let value = cookie.to_str()?;
        assert!(value.starts_with("wicket_session=;"));
        assert!(value.contains("Max-Age=0"));
        Ok(())
    }

    #[test]
    fn extract_session_token_from_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; wicket_session=tok123; other=1"),
        );
        assert_eq!(extract_session_token(&headers), Some("tok123".to_string()));
    }

    #[test]
    fn extract_session_token_prefers_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("wicket_session=cookie"));
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer header"));
        assert_eq!(extract_session_token(&headers), Some("header".to_string()));
    }

    #[test]
    fn extract_session_token_ignores_empty_and_signature_auth() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("wicket_session="));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_static("Signature keyId=\"k\",signature=\"s\""),
        );
        assert_eq!(extract_session_token(&headers), None);
        assert_eq!(extract_bearer_token(&headers), None);
    }

    #[tokio::test]
    async fn session_without_credentials_is_no_content() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/wicket")?;
        let state = Arc::new(AuthState::new(
            config("https://wicket.dev"),
            Arc::new(NoopRateLimiter),
        ));
        let response = session(
            Method::GET,
            OriginalUri(Uri::from_static("/v1/auth/session")),
            HeaderMap::new(),
            Extension(pool),
            Extension(state),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        Ok(())
    }

    #[tokio::test]
    async fn session_with_malformed_signature_is_unauthorized() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/wicket")?;
        let state = Arc::new(AuthState::new(
            config("https://wicket.dev"),
            Arc::new(NoopRateLimiter),
        ));
        let mut headers = HeaderMap::new();
        headers.insert("signature", HeaderValue::from_static("garbage"));
        let response = session(
            Method::GET,
            OriginalUri(Uri::from_static("/v1/auth/session")),
            headers,
            Extension(pool),
            Extension(state),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn logout_always_clears_cookie() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/wicket")?;
        let state = Arc::new(AuthState::new(
            config("http://localhost:5173"),
            Arc::new(NoopRateLimiter),
        ));
        let response = logout(HeaderMap::new(), Extension(pool), Extension(state))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let cookie = response
            .headers()
            .get(SET_COOKIE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        assert!(cookie.contains("Max-Age=0"));
        Ok(())
    }
}
