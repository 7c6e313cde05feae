//! Furry Gallery Backend - library for app logic and testing

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod listing;
pub mod logging;
pub mod routes;
pub mod state;
pub mod validation;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer,
};

use crate::config::{AppConfig, DbConfig};
use crate::state::AppState;

/// Headroom for multipart framing and form fields on top of the image cap.
const BODY_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Configure CORS from environment variables.
/// Uses ALLOWED_ORIGINS (comma-separated) or FRONTEND_ORIGIN, falling back
/// to the local frontend dev server.
pub fn configure_cors() -> CorsLayer {
    let allowed_origins = std::env::var("ALLOWED_ORIGINS")
        .ok()
        .and_then(|s| {
            let origins: Vec<HeaderValue> = s
                .split(',')
                .filter_map(|origin| origin.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                None
            } else {
                Some(origins)
            }
        })
        .or_else(|| {
            std::env::var("FRONTEND_ORIGIN")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(|origin| vec![origin])
        })
        .unwrap_or_else(|| {
            vec![
                HeaderValue::from_static("http://localhost:3000"),
                HeaderValue::from_static("http://127.0.0.1:3000"),
            ]
        });

    CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

/// Create and configure the application router.
pub fn create_app(state: AppState) -> Router {
    let cors = configure_cors();
    let body_limit = state.config.max_upload_bytes + BODY_OVERHEAD_BYTES;

    Router::new()
        .route("/api/auth/register", post(routes::auth::register))
        .route("/api/auth/login", post(routes::auth::login))
        .route("/api/auth/logout", post(routes::auth::logout))
        .route("/api/auth/me", get(routes::auth::me))
        .route(
            "/api/auth/change-password",
            post(routes::auth::change_password),
        )
        .route("/api/users", get(routes::users::list_users))
        .route(
            "/api/users/{id}",
            get(routes::users::get_user).put(routes::users::update_user),
        )
        .route(
            "/api/photographers",
            get(routes::photographers::list_photographers)
                .post(routes::photographers::create_photographer),
        )
        .route(
            "/api/photographers/{id}",
            get(routes::photographers::get_photographer)
                .put(routes::photographers::update_photographer),
        )
        .route(
            "/api/organizers",
            get(routes::organizers::list_organizers).post(routes::organizers::create_organizer),
        )
        .route(
            "/api/organizers/{id}",
            get(routes::organizers::get_organizer).put(routes::organizers::update_organizer),
        )
        .route(
            "/api/events",
            get(routes::events::list_events).post(routes::events::create_event),
        )
        .route(
            "/api/events/{id}",
            get(routes::events::get_event).put(routes::events::update_event),
        )
        .route(
            "/api/photos",
            get(routes::photos::list_photos).post(routes::photos::create_photo),
        )
        .route("/api/photos/{id}", get(routes::photos::get_photo))
        .route("/api/photos/{id}/like", post(routes::photos::like_photo))
        .route("/api/photos/{id}/unlike", post(routes::photos::unlike_photo))
        .route("/api/photos/{id}/tags", post(routes::photos::assign_tags))
        .route("/api/photos/{id}/file", get(routes::blobs::get_photo_file))
        .route(
            "/api/photos/{id}/thumbnail",
            get(routes::blobs::get_photo_thumbnail),
        )
        .route(
            "/api/tags",
            get(routes::tags::list_tags).post(routes::tags::create_tag),
        )
        .route("/api/avatars", post(routes::blobs::upload_avatar))
        .route("/api/avatars/{id}", get(routes::blobs::get_avatar))
        .route(
            "/api/profile-images",
            post(routes::blobs::upload_profile_image),
        )
        .route(
            "/api/profile-images/{id}",
            get(routes::blobs::get_profile_image),
        )
        .route("/api/images", post(routes::blobs::upload_markdown_image))
        .route("/api/images/{id}", get(routes::blobs::get_markdown_image))
        .route("/health", get(routes::health::health_ping))
        .route("/health/database", get(routes::health::health_database))
        .route("/health/ready", get(routes::health::health_ready))
        .layer(logging::middleware::propagate_request_id_layer())
        .layer(middleware::from_fn(logging::middleware::log_request))
        .layer(logging::middleware::request_id_layer())
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        // One cap for every body; the extractor default (2 MB) would reject photos.
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(cors)
        .with_state(state)
}

/// In-memory accounts when no database is configured. A configured database
/// that cannot be reached or migrated is an error, never a silent fallback.
pub async fn build_state(config: AppConfig) -> Result<AppState, sqlx::Error> {
    if !DbConfig::is_configured() {
        tracing::info!("DATABASE_URL not set. Running without database connection.");
        return Ok(AppState::without_database(config));
    }
    open_database(config).await
}

/// Connects, migrates and wraps the pool.
pub async fn open_database(config: AppConfig) -> Result<AppState, sqlx::Error> {
    let pool = db::init_pool(&config.database).await.map_err(|e| {
        tracing::error!("Failed to initialize database pool: {}", e);
        e
    })?;

    if let Err(e) = db::run_migrations(&pool).await {
        tracing::error!("Failed to run database migrations: {}", e);
        pool.close().await;
        return Err(e);
    }

    Ok(AppState::new(pool, config))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

/// Run the server (used by main).
pub async fn run() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenvy::dotenv().ok();

    // Dropping the guards stops the background log writers.
    let _log_guards = logging::init();

    routes::health::init_start_time();

    let config = AppConfig::from_env();
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    let state = build_state(config).await?;
    let pool = state.pool_opt().cloned();
    let app = create_app(state);

    tracing::info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    if let Some(pool) = pool {
        pool.close().await;
        tracing::info!("Database pool closed");
    }

    Ok(())
}
