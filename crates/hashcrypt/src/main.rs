//! `hashcrypt` — service entry point.
//!
//! Startup sequence:
//! 1. Load and validate [`Config`] from environment variables.
//! 2. Initialise tracing (and OTLP export when configured).
//! 3. Build the KMS client and acquire the first data key.
//! 4. Assemble the [`EnvelopeCryptor`] and [`FieldProcessor`].
//! 5. Build the Axum router and start the HTTP server.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use hashcrypt::aws::KmsKeyAuthority;
use hashcrypt::config::Config;
use hashcrypt::cryptor::EnvelopeCryptor;
use hashcrypt::dek::KeyLifecycleManager;
use hashcrypt::fields::FieldProcessor;
use hashcrypt::server::{self, state::AppState};
use hashcrypt::telemetry;

#[tokio::main]
async fn main() -> Result<()> {
    // -----------------------------------------------------------------------
    // 1. Configuration
    // -----------------------------------------------------------------------
    let cfg = Config::from_env().map_err(|e| {
        // Telemetry is not yet up; write to stderr directly.
        eprintln!("ERROR: configuration invalid: {e:#}");
        e
    })?;

    // -----------------------------------------------------------------------
    // 2. Telemetry
    // -----------------------------------------------------------------------
    telemetry::init_telemetry(cfg.otel_exporter_otlp_endpoint.as_deref(), &cfg.log_level)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        port = cfg.listen_port,
        "hashcrypt starting"
    );

    // -----------------------------------------------------------------------
    // 3. Key authority and first data key
    // -----------------------------------------------------------------------
    let authority = KmsKeyAuthority::new(&cfg.kms_settings()).await;
    let keys = KeyLifecycleManager::initialize(
        Arc::new(authority),
        cfg.kms_key_id.clone(),
        cfg.rotation_policy()?,
    )
    .await
    .context("failed to acquire initial data key")?;

    // -----------------------------------------------------------------------
    // 4. Core
    // -----------------------------------------------------------------------
    let cryptor = EnvelopeCryptor::new(Arc::new(keys), Arc::new(cfg.hasher()?));
    let processor = FieldProcessor::new(cfg.field_list(), cfg.context_field_name.clone());
    info!(
        fields = processor.fields().len(),
        algorithm = ?cryptor.hasher().algorithm(),
        "field processor ready"
    );

    // -----------------------------------------------------------------------
    // 5. HTTP server
    // -----------------------------------------------------------------------
    let state = AppState::new(cryptor, processor, cfg.enable_decrypt_endpoint);
    let router = server::router::build(state);

    let addr: std::net::SocketAddr = ([0, 0, 0, 0], cfg.listen_port).into();
    info!(addr = %addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
