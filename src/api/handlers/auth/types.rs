//! Request/response types for auth endpoints.
//!
//! Password fields are plain `String`s on the wire; `Debug` is implemented by
//! hand so they never reach logs.

use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;
use validator::Validate;

#[derive(ToSchema, Serialize, Deserialize, Validate)]
pub struct JoinRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 64))]
    pub display_name: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
}

impl fmt::Debug for JoinRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoinRequest")
            .field("email", &self.email)
            .field("display_name", &self.display_name)
            .field("password", &"***")
            .finish()
    }
}

#[derive(ToSchema, Serialize, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("password", &"***")
            .finish()
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Validate)]
pub struct ForgotPasswordRequest {
    #[validate(email)]
    pub email: String,
}

#[derive(ToSchema, Serialize, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    #[validate(email)]
    pub email: String,
    pub passcode: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
}

impl fmt::Debug for ResetPasswordRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResetPasswordRequest")
            .field("email", &self.email)
            .field("passcode", &"***")
            .field("password", &"***")
            .finish()
    }
}

/// Public view of an identity returned by join and login.
#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct IdentityResponse {
    pub id: String,
    pub email: String,
    pub display_name: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SessionResponse {
    pub identity_id: String,
    pub email: String,
    pub display_name: String,
    /// How the request proved its identity: `session`, `signature`, or both.
    pub methods: Vec<String>,
    /// Signature key used, when the request was signed.
    pub key_id: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Validate)]
pub struct CreateKeyRequest {
    /// Base64-encoded 32-byte ed25519 public key.
    pub public_key: String,
    #[validate(length(max = 64))]
    pub label: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct KeyResponse {
    pub key_id: String,
    pub algorithm: String,
    pub label: Option<String>,
    pub created_at_unix: i64,
}
