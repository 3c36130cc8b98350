use axum::{
    Router,
    extract::Extension,
    routing::{get, post},
};
use clap::Parser;
use referral_tree::config::Config;
use referral_tree::registration::credentials::Sha256Hasher;
use referral_tree::registration::handlers::{
    handle_audit, handle_get_downline, handle_get_profile, handle_health, handle_register,
};
use referral_tree::registration::protocol::*;
use referral_tree::registration::service::ReferralService;
use referral_tree::storage::memory::MemoryNodeStore;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.log_level)?)
        .init();

    // 1. Storage layer:
    let store = Arc::new(MemoryNodeStore::new());

    // 2. Registration service:
    let service =
        ReferralService::with_settings(store, Arc::new(Sha256Hasher), config.service_settings());
    tracing::info!(
        "Count rule: {}, max claim retries: {}",
        config.count_rule,
        config.max_claim_retries
    );

    // 3. HTTP Router:
    let app = Router::new()
        .route("/", get(handle_health))
        .route(ENDPOINT_REGISTER, post(handle_register))
        .route(&format!("{}/:code", ENDPOINT_PROFILE), get(handle_get_profile))
        .route(&format!("{}/:code", ENDPOINT_DOWNLINE), get(handle_get_downline))
        .route(&format!("{}/:code", ENDPOINT_AUDIT), get(handle_audit))
        .layer(Extension(service));

    // 4. Start HTTP server:
    tracing::info!("HTTP server listening on {}", config.bind);
    tracing::info!("Press Ctrl+C to shutdown");

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
