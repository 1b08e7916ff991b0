//! Application entry point and server initialization
//!
//! Loads configuration, opens the database, starts the expiry sweeper and
//! serves the HTTP API until SIGINT/SIGTERM.

use std::time::Duration;

use chrono::Utc;
use dotenvy::dotenv;
use redb::Database;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use linkboard::config::Config;
use linkboard::database::{init_db, AppState};
use linkboard::route::create_app;
use linkboard::store::purge_expired;

const DEFAULT_TRACING_LEVEL: &str = "linkboard=debug,tower_http=debug";

#[tokio::main]
async fn main() {
    // Load environment variables from .env file if it exists
    dotenv().ok();
    configure_tracing();

    let config = Config::from_env();

    let db = match init_db(&config.database_url) {
        Ok(db) => db,
        Err(err) => {
            tracing::error!("Failed to initialize database {}: {}", config.database_url, err);
            std::process::exit(1);
        }
    };

    let state = AppState::new(db, config);
    spawn_expiry_sweeper(state.db.clone(), state.config.expiry_sweep_interval);

    let app = create_app(state.clone()).layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{}", state.config.port);
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!("Creating tcp listener on {} failed: {}", addr, err);
            std::process::exit(1);
        }
    };

    tracing::info!("Server running at http://localhost:{}", state.config.port);
    tracing::info!("Using database: {}", state.config.database_url);
    if state.config.authorization.is_none() {
        tracing::warn!("AUTHORIZATION is not set, /api routes are unauthenticated");
    }

    if let Err(err) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!("Server error: {}", err);
    }
}

fn configure_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_TRACING_LEVEL.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Periodically deletes expired links. redb is blocking, so each sweep runs on the blocking pool.
fn spawn_expiry_sweeper(db: Arc<Database>, every: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;

            let db = db.clone();
            match tokio::task::spawn_blocking(move || purge_expired(&db, Utc::now())).await {
                Ok(Ok(0)) => {}
                Ok(Ok(purged)) => tracing::debug!("Expiry sweep removed {} links", purged),
                Ok(Err(err)) => tracing::error!("Expiry sweep failed: {}", err),
                Err(err) => tracing::error!("Expiry sweep task panicked: {}", err),
            }
        }
    });
}

/// Resolves on SIGINT (Ctrl+C) or, on Unix, SIGTERM
///
/// Open connections are allowed to finish and in-flight write transactions
/// commit before the process exits.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                tracing::error!("Failed to install signal handler: {}", err);
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

    tracing::info!("Shutdown signal received, stopping server");
}
