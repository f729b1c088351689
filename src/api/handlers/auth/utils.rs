//! Small helpers for auth validation, session tokens and reset passcodes.

use anyhow::{Context, Result};
use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use base64::Engine;
use rand::{Rng, RngCore, rngs::OsRng};
use sha2::{Digest, Sha256};
use tracing::debug;
use uuid::Uuid;
use validator::ValidationErrors;

/// Number of digits in an emailed password reset passcode.
pub(super) const PASSCODE_DIGITS: usize = 6;

pub(super) const MISSING_PAYLOAD: &str = "Missing payload";

/// Unwrap a JSON request body.
///
/// Missing, malformed and mistyped bodies all answer 400 "Missing payload".
pub(super) fn json_payload<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, Response> {
    payload.map(|Json(payload)| payload).map_err(|rejection| {
        debug!("Rejected request body: {rejection}");
        (StatusCode::BAD_REQUEST, MISSING_PAYLOAD.to_string()).into_response()
    })
}

/// Run the JSON extractor on an empty request to get a real rejection.
#[cfg(test)]
pub(super) async fn rejected_json<T>() -> Result<Json<T>, JsonRejection>
where
    T: serde::de::DeserializeOwned,
{
    use axum::extract::{FromRequest, Request};
    Json::<T>::from_request(Request::new(axum::body::Body::empty()), &()).await
}

/// Normalize an email for lookup/uniqueness checks.
pub(super) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Create a new session token for the auth cookie.
/// The raw value is only returned to set the cookie; the database stores a hash.
pub(crate) fn generate_session_token() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate session token")?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}

/// Hash a session token so raw values never touch the database.
pub(crate) fn hash_session_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

/// Create a zero-padded numeric passcode for password reset emails.
pub(super) fn generate_passcode() -> String {
    let value: u32 = OsRng.gen_range(0..1_000_000);
    format!("{value:0width$}", width = PASSCODE_DIGITS)
}

/// Hash a passcode bound to its identity, so equal passcodes of two
/// identities never share a stored hash.
pub(super) fn hash_passcode(identity_id: Uuid, passcode: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(identity_id.as_bytes());
    hasher.update(b":");
    hasher.update(passcode.as_bytes());
    hasher.finalize().to_vec()
}

/// Compare two digests without short-circuiting on the first differing byte.
pub(super) fn constant_time_eq(left: &[u8], right: &[u8]) -> bool {
    if left.len() != right.len() {
        return false;
    }
    left.iter()
        .zip(right.iter())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

/// True for the six ASCII digits a passcode is made of.
pub(super) fn valid_passcode(passcode: &str) -> bool {
    passcode.len() == PASSCODE_DIGITS && passcode.bytes().all(|b| b.is_ascii_digit())
}

pub(super) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

/// Flatten validator errors into a short, stable message naming the first bad field.
pub(super) fn validation_message(errors: &ValidationErrors) -> String {
    let mut fields: Vec<String> = errors
        .field_errors()
        .keys()
        .map(ToString::to_string)
        .collect();
    fields.sort_unstable();
    match fields.first() {
        Some(field) => format!("Invalid {field}"),
        None => "Invalid payload".to_string(),
    }
}

/// Extract a client IP for rate limiting from common proxy headers.
pub(super) fn extract_client_ip(headers: &axum::http::HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if forwarded.is_some() {
        return forwarded.map(str::to_string);
    }
    headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Seconds since the unix epoch.
pub(super) fn now_unix_seconds() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::SystemTime::UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, HeaderValue};
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use sqlx::error::{DatabaseError, ErrorKind};
    use std::borrow::Cow;
    use std::error::Error as StdError;
    use std::fmt;
    use validator::Validate;

    #[tokio::test]
    async fn json_payload_maps_rejections_to_bad_request() {
        let rejected = json_payload(rejected_json::<serde_json::Value>().await);
        assert_eq!(
            rejected.err().map(|response| response.status()),
            Some(StatusCode::BAD_REQUEST)
        );
        assert_eq!(json_payload(Ok(Json(7u8))).ok(), Some(7));
    }

    #[test]
    fn normalize_email_trims_and_lowercases() {
        assert_eq!(normalize_email(" Alice@Example.COM "), "alice@example.com");
    }

    #[test]
    fn generate_session_token_is_32_random_bytes() {
        let decoded_len = generate_session_token()
            .ok()
            .and_then(|token| URL_SAFE_NO_PAD.decode(token.as_bytes()).ok())
            .map(|bytes| bytes.len());
        assert_eq!(decoded_len, Some(32));
    }

    #[test]
    fn hash_session_token_stable() {
        assert_eq!(hash_session_token("token"), hash_session_token("token"));
        assert_ne!(hash_session_token("token"), hash_session_token("other"));
    }

    #[test]
    fn generate_passcode_is_six_digits() {
        for _ in 0..50 {
            let passcode = generate_passcode();
            assert!(valid_passcode(&passcode), "bad passcode {passcode}");
        }
    }

    #[test]
    fn hash_passcode_binds_identity() {
        let first = Uuid::from_u128(1);
        let second = Uuid::from_u128(2);
        assert_eq!(hash_passcode(first, "123456"), hash_passcode(first, "123456"));
        assert_ne!(hash_passcode(first, "123456"), hash_passcode(second, "123456"));
        assert_ne!(hash_passcode(first, "123456"), hash_passcode(first, "123457"));
    }

    #[test]
    fn constant_time_eq_matches_slices() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"ab"));
    }

    #[test]
    fn valid_passcode_rejects_non_digits_and_lengths() {
        assert!(valid_passcode("000123"));
        assert!(!valid_passcode("12345"));
        assert!(!valid_passcode("1234567"));
        assert!(!valid_passcode("12a456"));
        assert!(!valid_passcode("１２３４５６"));
    }

    #[derive(Validate)]
    struct Signup {
        #[validate(email)]
        email: String,
        #[validate(length(min = 3))]
        name: String,
    }

    #[test]
    fn validation_message_names_first_field() {
        let signup = Signup {
            email: "nope".to_string(),
            name: "x".to_string(),
        };
        let message = signup
            .validate()
            .err()
            .map(|errors| validation_message(&errors));
        assert_eq!(message.as_deref(), Some("Invalid email"));
    }

    #[derive(Debug)]
    struct TestDbError {
        code: Option<&'static str>,
    }

    impl fmt::Display for TestDbError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "test database error")
        }
    }

    impl StdError for TestDbError {}

    impl DatabaseError for TestDbError {
        fn message(&self) -> &'static str {
            "test database error"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            self.code.map(Cow::Borrowed)
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            ErrorKind::UniqueViolation
        }
    }

    #[test]
    fn is_unique_violation_matches_sqlstate() {
        let err = sqlx::Error::Database(Box::new(TestDbError {
            code: Some("23505"),
        }));
        assert!(is_unique_violation(&err));

        let err = sqlx::Error::Database(Box::new(TestDbError {
            code: Some("99999"),
        }));
        assert!(!is_unique_violation(&err));

        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
    }

    #[test]
    fn extract_client_ip_prefers_forwarded() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("1.2.3.4, 5.6.7.8"),
        );
        headers.insert("x-real-ip", HeaderValue::from_static("9.9.9.9"));
        assert_eq!(extract_client_ip(&headers), Some("1.2.3.4".to_string()));
    }

    #[test]
    fn extract_client_ip_falls_back_to_real_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("9.9.9.9"));
        assert_eq!(extract_client_ip(&headers), Some("9.9.9.9".to_string()));
        assert_eq!(extract_client_ip(&HeaderMap::new()), None);
    }
}
