//! Redirect resolution
//!
//! A resolution moves from checking to exactly one terminal outcome:
//! not found, expired, or redirecting. Only the last one records a click.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::events::{EventSink, REDIRECT, REDIRECT_EXPIRED, REDIRECT_NOT_FOUND};
use crate::geo::GeoLocator;
use crate::model::{ClickEvent, DIRECT_REFERRER, UNKNOWN_COUNTRY};
use crate::store::MappingStore;

/// Default bound on the geolocation call
pub const DEFAULT_GEO_TIMEOUT: Duration = Duration::from_millis(1500);

/// Visitor details supplied by the caller
#[derive(Debug, Clone, Default)]
pub struct Visit {
    pub referrer: Option<String>,
    pub user_agent: Option<String>,
    pub client_ip: Option<String>,
}

/// Terminal outcome of resolving a shortcode
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    NotFound,
    Expired { expires_at: i64 },
    Redirecting { target_url: String, click: ClickEvent },
}

#[derive(Clone)]
pub struct Resolver {
    store: MappingStore,
    geo: Arc<dyn GeoLocator>,
    events: Arc<dyn EventSink>,
    geo_timeout: Duration,
}

impl Resolver {
    pub fn new(
        store: MappingStore,
        geo: Arc<dyn GeoLocator>,
        events: Arc<dyn EventSink>,
        geo_timeout: Duration,
    ) -> Self {
        Self {
            store,
            geo,
            events,
            geo_timeout,
        }
    }

    /// Resolves `code` as of `now_ms`, recording a click when it redirects.
    pub async fn resolve(&self, code: &str, visit: Visit, now_ms: i64) -> Result<Resolution, StoreError> {
        let Some(mapping) = self.store.find_by_shortcode(code)? else {
            debug!(shortcode = %code, "shortcode not found");
            self.events
                .log(REDIRECT_NOT_FOUND, json!({ "shortcode": code }));
            return Ok(Resolution::NotFound);
        };

        if mapping.is_expired(now_ms) {
            debug!(shortcode = %code, expires_at = mapping.expires_at, "shortcode expired");
            self.events.log(REDIRECT_EXPIRED, json!({ "shortcode": code }));
            return Ok(Resolution::Expired {
                expires_at: mapping.expires_at,
            });
        }

        let country = self.lookup_country(visit.client_ip.as_deref()).await;
        let click = ClickEvent {
            timestamp: now_ms,
            referrer: visit
                .referrer
                .filter(|r| !r.trim().is_empty())
                .unwrap_or_else(|| DIRECT_REFERRER.to_string()),
            user_agent: visit.user_agent.unwrap_or_default(),
            country,
        };

        self.store.record_click(code, click.clone())?;
        self.events
            .log(REDIRECT, json!({ "shortcode": code, "click": click }));

        Ok(Resolution::Redirecting {
            target_url: mapping.target_url,
            click,
        })
    }

    /// Single bounded attempt; any failure becomes "unknown".
    async fn lookup_country(&self, client_ip: Option<&str>) -> String {
        match tokio::time::timeout(self.geo_timeout, self.geo.country(client_ip)).await {
            Ok(Some(country)) => country,
            Ok(None) => UNKNOWN_COUNTRY.to_string(),
            Err(_) => {
                warn!(timeout_ms = self.geo_timeout.as_millis() as u64, "geolocation timed out");
                UNKNOWN_COUNTRY.to_string()
            }
        }
    }
}
