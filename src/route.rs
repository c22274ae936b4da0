//! Route definitions for the shortener API
//!
//! This module configures all HTTP routes and maps them to their respective handlers.

use axum::routing::get;
use axum::Router;

use crate::database::AppState;
use crate::handler::{create_short_urls, get_stats, list_events, list_stats, redirect_url};

/// Creates and configures the Axum application router with all routes
///
/// # Route Definitions
///
/// - `GET /go/{shortcode}` - Redirects to the target URL while the link is valid
/// - `POST /api/urls` - Creates a batch of short links
/// - `GET /api/urls` - Lists every mapping with click statistics
/// - `GET /api/urls/{shortcode}` - Statistics for one mapping
/// - `GET /api/events` - Persisted event log
///
/// # Example Usage
///
/// ```no_run
/// # use std::sync::Arc;
/// # use shortlink::database::{init_db, AppState};
/// # use shortlink::route::create_app;
/// # let db = init_db("data.db").unwrap();
/// let state = AppState::new(Arc::new(db));
/// let app = create_app(state);
/// // axum::serve(listener, app).await.unwrap();
/// ```
pub fn create_app(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/urls", get(list_stats).post(create_short_urls))
        .route("/urls/{shortcode}", get(get_stats))
        .route("/events", get(list_events));

    Router::new()
        .route("/go/{shortcode}", get(redirect_url))
        .nest("/api", api_routes)
        .with_state(state)
}
