//! Application entry point and server initialization
//!
//! This module contains the main function that:
//! - Loads environment configuration
//! - Initializes the database and runs the legacy data migration
//! - Starts the HTTP server with graceful shutdown support

use std::process::ExitCode;
use std::sync::Arc;

use chrono::Utc;
use dotenvy::dotenv;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use shortlink::config::Config;
use shortlink::database::{init_db, AppState};
use shortlink::events::{EventSink, PersistentSink, TracingSink};
use shortlink::geo::{DisabledGeoLocator, GeoLocator, HttpGeoLocator};
use shortlink::route::create_app;
use shortlink::store::MappingStore;

/// Application entry point
///
/// # Environment Variables
///
/// - `PORT` - Server port number (default: 8080)
/// - `DATABASE_URL` - Path to database file (default: "data.db")
/// - `BASE_URL` - Prefix for generated short links
/// - `GEO_LOOKUP_URL` / `GEO_TIMEOUT_MS` - Visitor geolocation service
/// - `PERSIST_EVENTS` - Keep the event log in the database
/// - `RUST_LOG` - Log filter (default: "shortlink=debug,tower_http=debug")
#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("shortlink=debug,tower_http=debug")),
        )
        .init();

    let config = Config::from_env();

    let db = match init_db(&config.database_path) {
        Ok(db) => Arc::new(db),
        Err(e) => {
            error!(path = %config.database_path, error = %e, "failed to initialize database");
            return ExitCode::FAILURE;
        }
    };

    // One-time conversion of the legacy representation; no-op once migrated.
    if let Err(e) = MappingStore::new(Arc::clone(&db)).migrate_legacy(Utc::now().timestamp_millis()) {
        error!(error = %e, "legacy data migration failed");
        return ExitCode::FAILURE;
    }

    let geo: Arc<dyn GeoLocator> = match &config.geo_lookup_url {
        Some(url) => match HttpGeoLocator::new(url.as_str(), config.geo_timeout) {
            Ok(locator) => Arc::new(locator),
            Err(e) => {
                warn!(error = %e, "geolocation client unavailable, countries will be unknown");
                Arc::new(DisabledGeoLocator)
            }
        },
        None => Arc::new(DisabledGeoLocator),
    };

    let events: Arc<dyn EventSink> = if config.persist_events {
        match PersistentSink::new(Arc::clone(&db)) {
            Ok(sink) => Arc::new(sink),
            Err(e) => {
                error!(error = %e, "failed to start event writer");
                return ExitCode::FAILURE;
            }
        }
    } else {
        Arc::new(TracingSink)
    };

    let state = AppState::builder(db)
        .base_url(config.base_url.clone())
        .geo(geo, config.geo_timeout)
        .events(events, config.persist_events)
        .build();

    let app = create_app(state).layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(addr = %addr, error = %e, "failed to bind listener");
            return ExitCode::FAILURE;
        }
    };

    info!(
        addr = %addr,
        base_url = %config.base_url,
        database = %config.database_path,
        "server running"
    );

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(error = %e, "server error");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Resolves on SIGINT (Ctrl+C) or, on Unix, SIGTERM.
///
/// Open connections finish and in-flight write transactions commit before
/// the process exits.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
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

    info!("shutdown signal received, stopping server");
}
