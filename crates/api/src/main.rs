//! PostBridge service entry point.

use std::sync::Arc;

use postbridge_api::{build_router, AppState};
use postbridge_common::crypto::EncryptionService;
use postbridge_core::{ConnectionService, PlatformRegistry, TokenRotationManager};
use postbridge_infra::adapters::build_adapters;
use postbridge_infra::database::SqliteCredentialsRepository;
use postbridge_infra::{DbManager, InMemoryStateStore, Settings, TokenVault};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before anything reads the environment; absence is fine.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "postbridge=info,tower_http=info".into()),
        )
        .init();

    let settings = Settings::from_env()?;

    let db = Arc::new(DbManager::new(&settings.db_path, settings.db_pool_size)?);
    db.run_migrations()?;

    let encryption = Arc::new(EncryptionService::new(settings.token_keys.clone())?);
    let vault = Arc::new(TokenVault::new(Arc::clone(&db), Arc::clone(&encryption)));
    let credentials = Arc::new(SqliteCredentialsRepository::new(Arc::clone(&db), encryption));

    let client = postbridge_infra::http::build_client()?;
    let registry = Arc::new(PlatformRegistry::new(
        settings.platform_configs(),
        build_adapters(client),
        credentials,
    ));

    let state_store = Arc::new(InMemoryStateStore::new());
    let connections = Arc::new(ConnectionService::new(
        Arc::clone(&registry),
        state_store,
        vault.clone(),
        settings.state_ttl_secs,
    ));
    let rotation = Arc::new(TokenRotationManager::new(
        registry,
        vault,
        settings.rotation_threshold_secs,
    ));

    let router = build_router(AppState::new(connections, rotation));

    let listener = tokio::net::TcpListener::bind(&settings.bind_addr).await?;
    info!(addr = %settings.bind_addr, "postbridge listening");
    axum::serve(listener, router).await?;

    Ok(())
}
