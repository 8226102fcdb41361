//! Flashcards Backend
//!
//! A multi-user flashcard service with SQLite persistence: accounts, per-user topic
//! trees and cards, plus JSON import and export.

mod api;
mod auth;
mod config;
mod db;
mod errors;
mod models;
mod transfer;
mod tree;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::{Config, LogFormat};
use db::Repository;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let registry = tracing_subscriber::registry().with(env_filter);
    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }

    tracing::info!("Starting Flashcards Backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Bind address: {}", config.bind_addr);

    // Initialize database
    let pool = db::init_database(&config.db_path).await?;
    let repo = Arc::new(Repository::new(pool));

    let state = AppState {
        repo,
        config: Arc::new(config.clone()),
    };

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // API routes
    let api_routes = Router::new()
        // Cards
        .route("/cards", get(api::list_cards).post(api::create_card))
        .route("/cards/import", post(api::import_cards))
        .route(
            "/cards/{id}",
            put(api::update_card).delete(api::delete_card),
        )
        // Topics
        .route("/topics", get(api::list_topics).post(api::create_topic))
        .route("/topics/reorder", put(api::reorder_topics))
        .route(
            "/topics/{id}",
            put(api::update_topic).delete(api::delete_topic),
        )
        // User
        .route("/user", get(api::get_profile))
        .route("/user/title", put(api::update_title))
        .route("/user/username", put(api::update_username))
        .route("/user/password", put(api::update_password));

    // Everything that needs a session
    let session_routes = Router::new()
        .nest("/api", api_routes)
        .route("/account/export", get(api::export_cards))
        .route("/auth/logout", post(api::logout))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::session_auth_layer,
        ));

    // Public routes
    let public_routes = Router::new()
        .route("/health", get(health_check))
        .route("/auth/register", post(api::register))
        .route("/auth/login", post(api::login));

    let max_upload_bytes = state.config.max_upload_bytes;

    Router::new()
        .merge(session_routes)
        .merge(public_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}
