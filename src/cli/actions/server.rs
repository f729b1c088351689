use crate::api;
use crate::api::handlers::auth::AuthConfig;
use anyhow::Result;
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    /// Connection strings usually embed credentials; keep them out of `Debug`.
    pub dsn: SecretString,
    pub frontend_base_url: String,
    pub session_ttl_seconds: i64,
    pub passcode_ttl_seconds: i64,
    pub passcode_max_attempts: i32,
    pub passcode_resend_cooldown_seconds: i64,
    pub signature_max_skew_seconds: i64,
    pub rate_limit_window_seconds: u64,
    pub rate_limit_max_attempts: u32,
    pub email_outbox_poll_seconds: u64,
    pub email_outbox_batch_size: usize,
    pub email_outbox_max_attempts: u32,
    pub email_outbox_backoff_base_seconds: u64,
    pub email_outbox_backoff_max_seconds: u64,
}

impl Args {
    fn auth_config(&self) -> AuthConfig {
        AuthConfig::new(self.frontend_base_url.clone())
            .with_session_ttl_seconds(self.session_ttl_seconds)
            .with_passcode_ttl_seconds(self.passcode_ttl_seconds)
            .with_passcode_max_attempts(self.passcode_max_attempts)
            .with_passcode_resend_cooldown_seconds(self.passcode_resend_cooldown_seconds)
            .with_signature_max_skew_seconds(self.signature_max_skew_seconds)
            .with_rate_limit_window_seconds(self.rate_limit_window_seconds)
            .with_rate_limit_max_attempts(self.rate_limit_max_attempts)
    }

    fn email_config(&self) -> api::email::EmailWorkerConfig {
        api::email::EmailWorkerConfig::new()
            .with_poll_interval_seconds(self.email_outbox_poll_seconds)
            .with_batch_size(self.email_outbox_batch_size)
            .with_max_attempts(self.email_outbox_max_attempts)
            .with_backoff_base_seconds(self.email_outbox_backoff_base_seconds)
            .with_backoff_max_seconds(self.email_outbox_backoff_max_seconds)
    }
}

/// Execute the server action.
/// # Errors
/// Returns an error if the database is unreachable or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    debug!("Server args: {:?}", args);

    let auth_config = args.auth_config();
    let email_config = args.email_config();

    api::new(
        args.port,
        args.dsn.expose_secret().to_string(),
        auth_config,
        email_config,
    )
    .await
}
