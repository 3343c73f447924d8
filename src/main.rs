//! Storefront bot - conversational commerce session engine
//!
//! Drives per-user shopping dialogues (browse, product card, cart,
//! checkout) behind an HTTP dispatcher endpoint, reconciling carts against
//! a Strapi-style catalog API.

mod api;
mod cart;
mod catalog;
mod config;
mod render;
mod runtime;
mod session;
mod state_machine;

use api::{create_router, AppState};
use catalog::StrapiCatalog;
use config::AppConfig;
use runtime::{ProductionManager, SessionManager, SessionRuntime};
use session::{InMemorySessionStore, SessionStore, SqliteSessionStore};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Upper bound between expired-session sweeps
const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A local .env fills in whatever the environment does not set
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "storefront_bot=info,tower_http=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(false),
        )
        .init();

    let config = AppConfig::from_env();

    // Session store
    let store: Arc<dyn SessionStore> = match &config.session_db_path {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            tracing::info!(path = %path.display(), "Opening session database");
            Arc::new(SqliteSessionStore::open(path)?)
        }
        None => {
            tracing::info!("SESSION_DB_PATH not set, keeping sessions in memory");
            Arc::new(InMemorySessionStore::new())
        }
    };

    // Remote catalog
    if config.catalog.write_token.is_none() {
        tracing::warn!("STRAPI_TOKEN_WRITE not set; cart and checkout writes will fail");
    }
    tracing::info!(
        base_url = %config.catalog.base_url,
        products_url = %config.catalog.products_url,
        page_size = config.catalog.page_size,
        "Catalog configured"
    );
    let catalog = Arc::new(StrapiCatalog::new(config.catalog.clone())?);

    let runtime = SessionRuntime::new(store, catalog, config.session_ttl);
    let manager: Arc<ProductionManager> =
        Arc::new(SessionManager::new(runtime, config.session_ttl));

    // Periodic cleanup of idle actors and expired sessions
    let sweep_interval = config.session_ttl.min(MAX_SWEEP_INTERVAL);
    tokio::spawn({
        let manager = Arc::clone(&manager);
        async move {
            let mut ticker = tokio::time::interval(sweep_interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                manager.sweep().await;
            }
        }
    });

    if config.dispatcher_token.is_none() {
        tracing::warn!("BOT_TOKEN not set; the action endpoint accepts unauthenticated requests");
    }
    let state = AppState::new(manager, config.dispatcher_token.clone());

    // Create router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Storefront bot listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
