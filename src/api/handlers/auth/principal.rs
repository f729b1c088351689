//! Authenticated principal extraction.
//!
//! Flow Overview: a request may carry a session (cookie or bearer token), an
//! HTTP signature, or both. Both are resolved concurrently and reconciled:
//! one credential decides the principal on its own, two credentials must agree
//! on the identity, and a presented signature that fails to verify rejects the
//! request even when a valid session is also present.

use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use sqlx::PgPool;
use thiserror::Error;
use tracing::{error, warn};
use uuid::Uuid;

use super::session::authenticate_session;
use super::signature::{SignatureError, SignedIdentity, authenticate_signature};
use super::state::AuthConfig;
use super::storage::{IdentityRecord, SessionRecord};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum AuthMethod {
    Session,
    Signature,
}

impl AuthMethod {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Session => "session",
            Self::Signature => "signature",
        }
    }
}

/// Authenticated identity plus the credentials that proved it.
#[derive(Clone, Debug)]
pub(crate) struct Principal {
    pub(crate) identity: IdentityRecord,
    pub(crate) via_session: bool,
    pub(crate) key_id: Option<String>,
}

impl Principal {
    pub(crate) fn methods(&self) -> Vec<AuthMethod> {
        let mut methods = Vec::with_capacity(2);
        if self.via_session {
            methods.push(AuthMethod::Session);
        }
        if self.key_id.is_some() {
            methods.push(AuthMethod::Signature);
        }
        methods
    }
}

#[derive(Debug, Error)]
pub(crate) enum AuthError {
    #[error("session identity {session} does not match signature identity {signature}")]
    Mismatch { session: Uuid, signature: Uuid },
    #[error(transparent)]
    Signature(SignatureError),
    #[error("authentication lookup failed: {0}")]
    Internal(String),
}

impl From<SignatureError> for AuthError {
    fn from(err: SignatureError) -> Self {
        match err {
            // A failing key lookup is our problem, not the caller's.
            SignatureError::Storage(message) => Self::Internal(message),
            other => Self::Signature(other),
        }
    }
}

/// Resolve session and signature credentials and reconcile them.
///
/// Returns `Ok(None)` when the request presents neither.
pub(crate) async fn authenticate(
    headers: &HeaderMap,
    method: &Method,
    uri: &Uri,
    pool: &PgPool,
    config: &AuthConfig,
) -> Result<Option<Principal>, AuthError> {
    let (session, signature) = tokio::join!(
        authenticate_session(headers, pool),
        authenticate_signature(headers, method, uri, pool, config)
    );
    let session = session.map_err(|err| AuthError::Internal(format!("{err:#}")));
    reconcile(session, signature)
}

pub(crate) fn reconcile(
    session: Result<Option<SessionRecord>, AuthError>,
    signature: Result<Option<SignedIdentity>, SignatureError>,
) -> Result<Option<Principal>, AuthError> {
    // A bad signature is never rescued by a valid session.
    let signature = signature.map_err(AuthError::from)?;
    let session = session?;

    match (session, signature) {
        (None, None) => Ok(None),
        (Some(session), None) => Ok(Some(Principal {
            identity: session.identity,
            via_session: true,
            key_id: None,
        })),
        (None, Some(signed)) => Ok(Some(Principal {
            identity: signed.identity,
            via_session: false,
            key_id: Some(signed.key_id),
        })),
        (Some(session), Some(signed)) => {
            if session.identity.id != signed.identity.id {
                return Err(AuthError::Mismatch {
                    session: session.identity.id,
                    signature: signed.identity.id,
                });
            }
            Ok(Some(Principal {
                identity: signed.identity,
                via_session: true,
                key_id: Some(signed.key_id),
            }))
        }
    }
}

/// Resolve a principal, treating missing credentials as 401.
pub(crate) async fn require_auth(
    headers: &HeaderMap,
    method: &Method,
    uri: &Uri,
    pool: &PgPool,
    config: &AuthConfig,
) -> Result<Principal, Response> {
    match authenticate(headers, method, uri, pool, config).await {
        Ok(Some(principal)) => Ok(principal),
        Ok(None) => Err((StatusCode::UNAUTHORIZED, "Authentication required".to_string())
            .into_response()),
        Err(err) => Err(auth_error_response(&err)),
    }
}

pub(crate) fn auth_error_response(err: &AuthError) -> Response {
    match err {
        AuthError::Mismatch { .. } => {
            warn!("Rejected request with conflicting credentials: {err}");
            (
                StatusCode::UNAUTHORIZED,
                "Session and signature identities do not match".to_string(),
            )
                .into_response()
        }
        AuthError::Signature(reason) => {
            warn!("Rejected request signature: {reason}");
            (StatusCode::UNAUTHORIZED, "Invalid signature".to_string()).into_response()
        }
        AuthError::Internal(message) => {
            error!("Failed to authenticate request: {message}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(id: u128) -> IdentityRecord {
        IdentityRecord {
            id: Uuid::from_u128(id),
            email: format!("user{id}@example.com"),
            display_name: format!("User {id}"),
        }
    }

    fn session(id: u128) -> Result<Option<SessionRecord>, AuthError> {
        Ok(Some(SessionRecord {
            identity: identity(id),
        }))
    }

    fn signed(id: u128) -> Result<Option<SignedIdentity>, SignatureError> {
        Ok(Some(SignedIdentity {
            identity: identity(id),
            key_id: "01JKEY".to_string(),
        }))
    }

    #[test]
    fn no_credentials_is_anonymous() {
        assert!(matches!(reconcile(Ok(None), Ok(None)), Ok(None)));
    }

    #[test]
    fn session_only() {
        let principal = reconcile(session(1), Ok(None));
        let Ok(Some(principal)) = principal else {
            panic!("expected a principal");
        };
        assert_eq!(principal.identity.id, Uuid::from_u128(1));
        assert_eq!(principal.methods(), vec![AuthMethod::Session]);
        assert_eq!(principal.key_id, None);
    }

    #[test]
    fn signature_only() {
        let Ok(Some(principal)) = reconcile(Ok(None), signed(2)) else {
            panic!("expected a principal");
        };
        assert_eq!(principal.identity.id, Uuid::from_u128(2));
        assert_eq!(principal.methods(), vec![AuthMethod::Signature]);
        assert_eq!(principal.key_id.as_deref(), Some("01JKEY"));
    }

    #[test]
    fn matching_credentials_merge() {
        let Ok(Some(principal)) = reconcile(session(3), signed(3)) else {
            panic!("expected a principal");
        };
        assert_eq!(
            principal.methods(),
            vec![AuthMethod::Session, AuthMethod::Signature]
        );
    }

    #[test]
    fn mismatched_credentials_rejected() {
        let result = reconcile(session(4), signed(5));
        assert!(matches!(
            result,
            Err(AuthError::Mismatch { session, signature })
                if session == Uuid::from_u128(4) && signature == Uuid::from_u128(5)
        ));
    }

    #[test]
    fn failed_signature_does_not_fall_back_to_session() {
        let result = reconcile(session(6), Err(SignatureError::InvalidSignature));
        assert!(matches!(
            result,
            Err(AuthError::Signature(SignatureError::InvalidSignature))
        ));
    }

    #[test]
    fn storage_failures_are_internal() {
        let result = reconcile(Ok(None), Err(SignatureError::Storage("down".to_string())));
        assert!(matches!(result, Err(AuthError::Internal(_))));

        let result = reconcile(Err(AuthError::Internal("down".to_string())), Ok(None));
        assert!(matches!(result, Err(AuthError::Internal(_))));
    }

    #[test]
    fn error_responses() {
        let mismatch = AuthError::Mismatch {
            session: Uuid::from_u128(1),
            signature: Uuid::from_u128(2),
        };
        assert_eq!(
            auth_error_response(&mismatch).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            auth_error_response(&AuthError::Signature(SignatureError::Stale)).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            auth_error_response(&AuthError::Internal("db".to_string())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn method_names() {
        assert_eq!(AuthMethod::Session.as_str(), "session");
        assert_eq!(AuthMethod::Signature.as_str(), "signature");
    }
}
