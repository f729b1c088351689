use anyhow::{Context, Result};
use rustls::crypto::ring;
use wicket::cli;

// Main function
#[tokio::main]
async fn main() -> Result<()> {
    // sqlx and the OTLP exporter both speak rustls; pick the provider once.
    ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))
        .context("TLS crypto provider initialization failed")?;
    let action = cli::start()?;

    let result = action.execute().await;

    cli::telemetry::shutdown_tracer();

    result
}
