// =============================================================================
// PART-DB SERVICE - Main Entry Point
// =============================================================================
// Inventory service for electronic components.
//
// WHAT THIS SERVICE DOES:
// - Keeps parts with stock, order state, prices, attachments and device usage
// - Organizes categories, footprints, storage locations, manufacturers,
//   suppliers, devices and attachment types as trees
// - Checks every operation against group permission rules
// - Exposes Prometheus metrics for observability
//
// Without DATABASE_URL the service runs on a seeded in-memory store.
// =============================================================================

mod config;
mod entity;
mod error;
mod handlers;
mod inventory;
mod metrics;
mod models;
mod permission;
mod placeholder;
mod search;
mod store;
mod util;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::metrics::setup_metrics;
use crate::store::{MemoryStorage, PgStorage, Storage};

// -----------------------------------------------------------------------------
// APPLICATION STATE
// -----------------------------------------------------------------------------
/// Shared by all request handlers through `State<Arc<AppState>>`.
pub struct AppState {
    pub store: Arc<dyn Storage>,

    pub config: Config,

    /// Renders the Prometheus scrape output
    pub metrics_handle: metrics_exporter_prometheus::PrometheusHandle,
}

// -----------------------------------------------------------------------------
// ROUTES
// -----------------------------------------------------------------------------
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // ----- Health & Readiness -----
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_handler))
        // ----- Parts -----
        .route("/api/v1/parts", post(handlers::create_part))
        .route(
            "/api/v1/parts/:id",
            get(handlers::get_part)
                .patch(handlers::update_part)
                .delete(handlers::delete_part),
        )
        .route("/api/v1/barcodes/:code", get(handlers::get_part_by_barcode))
        .route("/api/v1/parts/:id/actions", post(handlers::part_action))
        .route(
            "/api/v1/parts/:id/stock",
            post(handlers::adjust_stock).put(handlers::set_stock),
        )
        .route(
            "/api/v1/parts/:id/placeholders",
            get(handlers::expand_placeholders),
        )
        // ----- Search, statistics, attachments -----
        .route("/api/v1/search/modifiers", get(handlers::search_modifiers))
        .route("/api/v1/statistics", get(handlers::statistics))
        .route(
            "/api/v1/attachments/proposed-filenames",
            post(handlers::proposed_attachment_filenames),
        )
        // ----- Structural trees -----
        .route(
            "/api/v1/tree/:kind",
            get(handlers::get_tree).post(handlers::create_node),
        )
        .route(
            "/api/v1/tree/:kind/:id",
            get(handlers::get_node)
                .patch(handlers::update_node)
                .delete(handlers::delete_node),
        )
        .route("/api/v1/tree/:kind/:id/subtree", get(handlers::get_subtree))
        // route_layer so MatchedPath is available to the middleware
        .route_layer(middleware::from_fn(handlers::track_metrics))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// -----------------------------------------------------------------------------
// MAIN FUNCTION
// -----------------------------------------------------------------------------
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional
    dotenvy::dotenv().ok();

    // RUST_LOG controls levels, e.g. RUST_LOG=info,partdb_service=debug
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,partdb_service=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting Part-DB Service...");

    let config = Config::from_env()?;
    info!(
        port = config.port,
        anonymous_user_id = config.anonymous_user_id,
        features = ?config.features,
        "Configuration loaded"
    );

    let metrics_handle = setup_metrics()?;
    info!("Prometheus metrics initialized");

    let store: Arc<dyn Storage> = match &config.database_url {
        Some(url) => {
            let db = PgStorage::connect(url).await?;
            info!("Connected to PostgreSQL");

            db.run_migrations().await?;
            info!("Database migrations completed");
            Arc::new(db)
        }
        None => {
            warn!("DATABASE_URL is not set, using the seeded in-memory store");
            Arc::new(MemoryStorage::seeded())
        }
    };

    let port = config.port;
    let state = Arc::new(AppState {
        store,
        config,
        metrics_handle,
    });
    let app = router(state);

    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(address = %addr, "Part-DB Service is listening");

    axum::serve(listener, app).await?;

    Ok(())
}
