//! Best-effort visitor geolocation
//!
//! A lookup either yields a country name or nothing. Callers substitute
//! `"unknown"` and carry on; a failed lookup never fails a redirect.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, trace};

/// Placeholder replaced by the visitor IP in URL templates
pub const IP_PLACEHOLDER: &str = "{ip}";

#[async_trait]
pub trait GeoLocator: Send + Sync {
    /// Country name for the visitor, if it can be determined.
    async fn country(&self, client_ip: Option<&str>) -> Option<String>;
}

/// Locator used when geolocation is switched off.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledGeoLocator;

#[async_trait]
impl GeoLocator for DisabledGeoLocator {
    async fn country(&self, _client_ip: Option<&str>) -> Option<String> {
        None
    }
}

/// Queries a JSON lookup service such as `https://ipapi.co/{ip}/json/`.
///
/// A template without `{ip}` is requested as-is.
pub struct HttpGeoLocator {
    client: reqwest::Client,
    url_template: String,
}

impl HttpGeoLocator {
    pub fn new(url_template: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            url_template: url_template.into(),
        })
    }

    fn lookup_url(&self, client_ip: Option<&str>) -> Option<String> {
        if !self.url_template.contains(IP_PLACEHOLDER) {
            return Some(self.url_template.clone());
        }
        client_ip.map(|ip| self.url_template.replace(IP_PLACEHOLDER, ip))
    }
}

#[async_trait]
impl GeoLocator for HttpGeoLocator {
    async fn country(&self, client_ip: Option<&str>) -> Option<String> {
        let Some(url) = self.lookup_url(client_ip) else {
            trace!("no client address, skipping geolocation");
            return None;
        };

        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                debug!(url = %url, error = %e, "geolocation request failed");
                return None;
            }
        };

        if !response.status().is_success() {
            debug!(url = %url, status = %response.status(), "geolocation lookup rejected");
            return None;
        }

        match response.json::<Value>().await {
            Ok(body) => country_from_body(&body),
            Err(e) => {
                debug!(url = %url, error = %e, "geolocation response unreadable");
                None
            }
        }
    }
}

/// Reads `country_name`, falling back to `country`; blanks count as missing.
pub fn country_from_body(body: &Value) -> Option<String> {
    ["country_name", "country"]
        .iter()
        .filter_map(|field| body[*field].as_str())
        .map(str::trim)
        .find(|name| !name.is_empty())
        .map(str::to_string)
}
