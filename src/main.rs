//! Villahost Backend Server
//!
//! Owner-facing admin API: access-code login, revocable sessions, and
//! per-villa booking calendars with conflict-checked reservations.
//!
//! Usage:
//!   villahost --database-path villahost.db --port 8080
//!
//! Environment:
//!   DATABASE_PATH      - SQLite database file (default: villahost.db)
//!   PORT               - Listen port (default: 8080)
//!   JWT_SECRET         - Session signing secret
//!   SESSION_TTL_HOURS  - Session lifetime (default: 12)
//!   LOGIN_MAX_ATTEMPTS - Attempts per window before lockout (default: 5)
//!   LOGIN_WINDOW_SECS  - Lockout window length (default: 300)

use anyhow::{Context, Result};
use axum::{
    middleware as axum_middleware,
    routing::{delete, get, post, put},
    Router,
};
use clap::Parser;
use dotenv::dotenv;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::time::interval;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use villahost_backend::auth::{api as auth_api, auth_middleware};
use villahost_backend::calendar::api as calendar_api;
use villahost_backend::config::Config;
use villahost_backend::middleware::request_logging;
use villahost_backend::service::AdminService;

#[derive(Parser, Debug)]
#[command(name = "villahost")]
#[command(about = "Villahost Backend - Villa booking administration API")]
struct Args {
    /// SQLite database file
    #[arg(long, env = "DATABASE_PATH", default_value = "villahost.db")]
    database_path: String,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value = "8080")]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenv();
    let args = Args::parse();
    init_tracing();

    info!("🚀 Villahost Backend Starting");

    let mut config = Config::from_env()?;
    config.database_path = args.database_path;
    config.port = args.port;

    // A default owner is seeded by the store on first run
    let service = Arc::new(AdminService::from_config(config.clone())?);
    info!("💾 Stores initialized at: {}", config.database_path);

    // Periodic sweep of stale limiter windows and expired revocations
    tokio::spawn(maintenance_loop(service.clone()));

    let auth_router = Router::new()
        .route("/api/auth/login", post(auth_api::login))
        .with_state(service.clone());

    let protected_routes = Router::new()
        .route("/api/auth/logout", post(auth_api::logout))
        .route("/api/auth/me", get(auth_api::get_current_owner))
        .route("/api/auth/rotate", post(auth_api::rotate_code))
        .route(
            "/api/villas",
            get(calendar_api::list_villas).post(calendar_api::create_villa),
        )
        .route("/api/villas/:id", delete(calendar_api::delete_villa))
        .route(
            "/api/villas/:id/bookings",
            get(calendar_api::list_bookings).post(calendar_api::reserve),
        )
        .route(
            "/api/villas/:id/bookings/:booking_id",
            put(calendar_api::modify_booking).delete(calendar_api::cancel_booking),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            service.clone(),
            auth_middleware,
        ))
        .with_state(service.clone());

    let public_routes = Router::new().route("/health", get(health_check));

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(auth_router)
        .layer(axum_middleware::from_fn(request_logging))
        .layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("🎯 API server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("Server error")?;

    Ok(())
}

/// Sweeps the limiter and revocation stores once a minute so neither
/// grows without bound under churn.
async fn maintenance_loop(service: Arc<AdminService>) {
    let mut ticker = interval(Duration::from_secs(60));
    loop {
        ticker.tick().await;
        service.limiter().cleanup();
        service.sessions().prune();
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "villahost_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn health_check() -> &'static str {
    "🏝️ Villahost Operational"
}
