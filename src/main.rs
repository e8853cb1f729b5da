mod api;
mod auth;
mod config;
mod db;
mod models;
mod opsday;
mod overlay;
mod schema;
mod seeding;
mod services;
mod zones;

use anyhow::Result;
use axum::{
    http::{header, Method},
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::db::DbPool;
use crate::overlay::PatchOverlay;
use crate::services::fids::{AeroDataBox, FidsProvider};

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Arc<Config>,
    pub overlay: PatchOverlay,
    pub fids: Arc<dyn FidsProvider>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "paxops_server=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration, writing a template on first run
    let config_path = "config.toml";
    if !std::path::Path::new(config_path).exists() {
        std::fs::write(config_path, Config::default_template())?;
        anyhow::bail!("Wrote {config_path}; fill in the secrets and restart");
    }
    let config = Config::load(config_path)?;
    let tz = config.tz()?;
    tracing::info!("Loaded configuration (timezone {})", config.ops.timezone);

    // Setup database
    let db_pool = db::create_pool(&config.database.url)?;
    let mut conn = db_pool.get()?;
    db::run_migrations(&mut conn)?;
    seeding::seed(&mut conn, &config)?;
    drop(conn);
    tracing::info!("Database initialized");

    let fids = Arc::new(AeroDataBox::new(config.fids.api_key.clone(), tz));

    // Create app state
    let state = AppState {
        db: db_pool,
        config: Arc::new(config),
        overlay: PatchOverlay::new(),
        fids,
    };

    // Background jobs: per-minute FIDS sync, nightly archive
    tokio::spawn(services::scheduler::run_sync_loop(state.clone()));
    tokio::spawn(services::scheduler::run_archive_loop(state.clone()));

    let addr = format!("{}:{}", state.config.server.host, state.config.server.port);

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .max_age(std::time::Duration::from_secs(86400));

    // Build router
    let app = Router::new()
        .route("/", get(api::health))
        .route("/health", get(api::health))
        .merge(api::routes(state.clone()))
        .fallback(api::not_found)
        .layer(cors)
        .with_state(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
