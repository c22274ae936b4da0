//! Data models for the shortcode store
//!
//! This module defines the persisted records (`Mapping`, `ClickEvent`), the
//! legacy on-disk shape they are migrated from, and the request/response
//! bodies used by the HTTP layer.

use serde::{Deserialize, Serialize};

/// Milliseconds in one minute, used for validity windows.
pub const MINUTE_MS: i64 = 60_000;

/// Referrer recorded when the visitor supplied none.
pub const DIRECT_REFERRER: &str = "direct";

/// Country recorded when geolocation is unavailable or failed.
pub const UNKNOWN_COUNTRY: &str = "unknown";

/// A persisted shortcode-to-URL record
///
/// The JSON field names match the format already present in existing data
/// files, so `target_url` is stored as `longUrl`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Mapping {
    /// Unique alphanumeric identifier used in the redirect path
    pub shortcode: String,

    /// Absolute http/https destination
    #[serde(rename = "longUrl")]
    pub target_url: String,

    /// Creation time in milliseconds since the epoch
    pub created_at: i64,

    /// End of the validity window in milliseconds since the epoch
    pub expires_at: i64,

    /// Visit history, oldest first
    #[serde(default)]
    pub clicks: Vec<ClickEvent>,
}

impl Mapping {
    /// Builds a fresh mapping valid for `validity_minutes` starting at `now_ms`.
    pub fn new(shortcode: String, target_url: String, validity_minutes: i64, now_ms: i64) -> Self {
        Self {
            shortcode,
            target_url,
            created_at: now_ms,
            expires_at: now_ms + validity_minutes * MINUTE_MS,
            clicks: Vec::new(),
        }
    }

    /// A mapping only redirects while `now < expires_at`.
    pub fn is_expired(&self, now_ms: i64) -> bool {
        now_ms >= self.expires_at
    }
}

/// One recorded visit to a shortcode
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ClickEvent {
    #[serde(rename = "ts")]
    pub timestamp: i64,

    pub referrer: String,

    #[serde(rename = "ua", default)]
    pub user_agent: String,

    #[serde(default = "unknown_country")]
    pub country: String,
}

fn unknown_country() -> String {
    UNKNOWN_COUNTRY.to_string()
}

/// Value shape stored under the legacy key: `{ "<code>": { "original": "<url>" } }`
#[derive(Deserialize, Debug)]
pub struct LegacyEntry {
    pub original: String,
}

/// Requested validity, accepted either as a JSON number or as text
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum Minutes {
    Number(serde_json::Number),
    Text(String),
}

impl From<i64> for Minutes {
    fn from(value: i64) -> Self {
        Minutes::Number(value.into())
    }
}

/// One row of a creation batch
///
/// # Example
/// ```json
/// { "url": "https://example.com", "validity_minutes": 15, "custom_shortcode": "promo1" }
/// ```
#[derive(Deserialize, Debug, Clone, Default)]
pub struct CreateRow {
    /// Destination URL; rows where this is blank are skipped
    #[serde(alias = "target_url")]
    pub url: String,

    /// Validity in minutes, defaults to 30 when missing or not positive
    pub validity_minutes: Option<Minutes>,

    /// Optional custom shortcode, generated when absent or blank
    pub custom_shortcode: Option<String>,
}

/// Request body for creating a batch of short links
#[derive(Deserialize, Debug)]
pub struct CreateBatchRequest {
    pub rows: Vec<CreateRow>,
}

/// A created short link as returned to the caller
#[derive(Serialize, Debug)]
pub struct CreatedLink {
    pub shortcode: String,
    pub short_url: String,
    pub target_url: String,
    pub created_at: i64,
    pub expires_at: i64,
}

/// Per-mapping statistics view
///
/// Clicks are listed newest first.
#[derive(Serialize, Debug)]
pub struct MappingStats {
    pub shortcode: String,
    pub short_url: String,
    pub target_url: String,
    pub created_at: i64,
    pub expires_at: i64,
    pub expired: bool,
    pub total_clicks: usize,
    pub clicks: Vec<ClickEvent>,
}

impl MappingStats {
    pub fn from_mapping(mapping: Mapping, base_url: &str, now_ms: i64) -> Self {
        let expired = mapping.is_expired(now_ms);
        let mut clicks = mapping.clicks;
        clicks.reverse();

        Self {
            short_url: short_url(base_url, &mapping.shortcode),
            shortcode: mapping.shortcode,
            target_url: mapping.target_url,
            created_at: mapping.created_at,
            expires_at: mapping.expires_at,
            expired,
            total_clicks: clicks.len(),
            clicks,
        }
    }
}

/// Public redirect URL for a shortcode
pub fn short_url(base_url: &str, shortcode: &str) -> String {
    format!("{}/go/{}", base_url.trim_end_matches('/'), shortcode)
}

/// A logged event as kept by the persistent event sink
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LoggedEvent {
    pub event_type: String,
    pub payload: serde_json::Value,
    pub ts: i64,
}
