//! HTTP request handlers for the shortener API
//!
//! This module maps HTTP requests onto the creation flow, the redirect
//! resolver and the statistics views:
//! - Creating batches of short links with custom or generated codes
//! - Redirecting shortcodes while they are inside their validity window
//! - Listing mappings with their click history
//! - Reading the persisted event log

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use chrono::Utc;
use serde_json::json;

use crate::database::AppState;
use crate::error::{CreateError, StoreError};
use crate::events::load_events;
use crate::model::{short_url, CreateBatchRequest, CreatedLink, MappingStats};
use crate::resolver::{Resolution, Visit};

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Creates short links for every non-empty row
///
/// # Request Body
///
/// ```json
/// {
///   "rows": [
///     { "url": "https://example.com/a", "validity_minutes": 10 },
///     { "url": "https://example.com/b", "custom_shortcode": "promo1" }
///   ]
/// }
/// ```
///
/// # Response
///
/// - **201 Created** - `{"created": [...]}`
/// - **400 Bad Request** - invalid URL or custom shortcode, with the row number
/// - **409 Conflict** - custom shortcode already taken
/// - **503 Service Unavailable** - no free generated shortcode could be found
pub async fn create_short_urls(
    State(state): State<AppState>,
    Json(payload): Json<CreateBatchRequest>,
) -> Result<impl IntoResponse, CreateError> {
    let created = state.creation.create(&payload.rows, now_ms()).await?;

    // Attach the public short URL to each stored mapping
    let links: Vec<CreatedLink> = created
        .into_iter()
        .map(|mapping| CreatedLink {
            short_url: short_url(&state.base_url, &mapping.shortcode),
            shortcode: mapping.shortcode,
            target_url: mapping.target_url,
            created_at: mapping.created_at,
            expires_at: mapping.expires_at,
        })
        .collect();

    Ok((StatusCode::CREATED, Json(json!({ "created": links }))))
}

/// Redirects a shortcode to its target URL
///
/// # Response
///
/// - **307 Temporary Redirect** - shortcode is valid; a click was recorded
/// - **404 Not Found** - shortcode does not exist
/// - **410 Gone** - shortcode exists but its validity window has passed
///
/// 307 keeps browsers from caching the redirect, so every visit is counted
/// and expiry takes effect.
pub async fn redirect_url(
    Path(shortcode): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, StoreError> {
    // Collect what the click record needs from the request headers
    let visit = Visit {
        referrer: header_value(&headers, header::REFERER.as_str()),
        user_agent: header_value(&headers, header::USER_AGENT.as_str()),
        client_ip: client_ip(&headers),
    };

    // Resolve and record the click before answering
    let response = match state.resolver.resolve(&shortcode, visit, now_ms()).await? {
        Resolution::Redirecting { target_url, .. } => {
            Redirect::temporary(&target_url).into_response()
        }
        Resolution::NotFound => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": "Short link not found",
                "code": "not_found"
            })),
        )
            .into_response(),
        Resolution::Expired { expires_at } => (
            StatusCode::GONE,
            Json(json!({
                "error": "Short link expired",
                "code": "expired",
                "expires_at": expires_at
            })),
        )
            .into_response(),
    };

    Ok(response)
}

/// Lists every mapping, newest first, with its click history
pub async fn list_stats(State(state): State<AppState>) -> Result<impl IntoResponse, StoreError> {
    let now = now_ms();
    let mut mappings = state.store.load_all()?;

    // Newest first
    mappings.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let data: Vec<MappingStats> = mappings
        .into_iter()
        .map(|mapping| MappingStats::from_mapping(mapping, &state.base_url, now))
        .collect();

    Ok(Json(json!({
        "total": data.len(),
        "data": data
    })))
}

/// Statistics for a single shortcode
pub async fn get_stats(
    Path(shortcode): Path<String>,
    State(state): State<AppState>,
) -> Result<Response, StoreError> {
    let response = match state.store.find_by_shortcode(&shortcode)? {
        Some(mapping) => {
            Json(MappingStats::from_mapping(mapping, &state.base_url, now_ms())).into_response()
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": "Short link not found",
                "code": "not_found"
            })),
        )
            .into_response(),
    };

    Ok(response)
}

/// Persisted event log, oldest first
pub async fn list_events(State(state): State<AppState>) -> Result<Response, StoreError> {
    if !state.events_persisted {
        return Ok((
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": "Event persistence is disabled",
                "code": "events_disabled"
            })),
        )
            .into_response());
    }

    let events = load_events(state.store.database())?;
    Ok(Json(json!({
        "total": events.len(),
        "data": events
    }))
    .into_response())
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// First `X-Forwarded-For` hop, else `X-Real-IP`
fn client_ip(headers: &HeaderMap) -> Option<String> {
    header_value(headers, "x-forwarded-for")
        .and_then(|forwarded| {
            forwarded
                .split(',')
                .map(str::trim)
                .find(|hop| !hop.is_empty())
                .map(str::to_string)
        })
        .or_else(|| header_value(headers, "x-real-ip"))
}
