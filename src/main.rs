use anyhow::{Context, Result};
use axum::http::{HeaderValue, Method};
use drivegate::api::{create_router, run_state_cleanup, AppState};
use drivegate::config::{DriveGateConfig, Secrets};
use drivegate::credentials::CredentialStore;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "drivegate=info".into()),
        )
        .init();

    info!("Drivegate starting...");

    let config_path = std::env::var("DRIVEGATE_CONFIG").ok().map(PathBuf::from);
    let config = DriveGateConfig::load(config_path.as_deref())?;
    let secrets = Secrets::from_env();

    info!(
        bind_addr = %config.server.bind_addr,
        db_path = %config.storage.db_path,
        callback_base_url = %config.oauth.callback_base_url,
        oauth_configured = config.provider.is_configured(),
        admin_gate_configured = secrets.admin_token.is_some(),
        encryption_enabled = secrets.encryption_key.is_some(),
        "Configuration loaded"
    );

    if secrets.admin_token.is_none() {
        warn!("DRIVEGATE_ADMIN_TOKEN not set; all admin drive routes will return 401");
    }
    if secrets.encryption_key.is_none() {
        warn!("DRIVEGATE_ENCRYPTION_KEY not set; refresh tokens will be stored in plaintext");
    }

    let store = Arc::new(
        CredentialStore::new(&config.storage.db_path, secrets.encryption_key.as_deref())
            .context("Failed to initialize credential store")?,
    );
    info!(credentials = store.count()?, "Credential store initialized");

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.http.timeout_seconds))
        .connect_timeout(Duration::from_secs(config.http.connect_timeout_seconds))
        .build()
        .context("Failed to build HTTP client")?;

    let state = AppState::from_config(&config, secrets.admin_token.clone(), store, http);

    tokio::spawn(run_state_cleanup(
        state.state_manager.clone(),
        config.oauth.state_cleanup_interval_seconds,
    ));

    let mut router = create_router(state);
    if let Some(origin) = &config.server.cors_origin {
        let cors = CorsLayer::new()
            .allow_origin(
                origin
                    .parse::<HeaderValue>()
                    .context("DRIVEGATE_CORS_ORIGIN is not a valid header value")?,
            )
            .allow_methods([Method::GET, Method::POST])
            .allow_headers(Any);
        router = router.layer(cors);
    }

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind_addr))?;
    info!(addr = %config.server.bind_addr, "HTTP API listening");

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            tracing::error!(error = %e, "HTTP server error");
        }
    });

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl_c signal")?;
    info!("Shutdown signal received");

    server_handle.abort();
    info!("Drivegate stopped");

    Ok(())
}
