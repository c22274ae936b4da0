//! Runtime configuration read from the environment
//!
//! `.env` files are loaded by `main` through dotenvy before [`Config::from_env`]
//! runs.

use std::env;
use std::time::Duration;

use crate::resolver::DEFAULT_GEO_TIMEOUT;

pub const DEFAULT_GEO_LOOKUP_URL: &str = "https://ipapi.co/{ip}/json/";

#[derive(Debug, Clone)]
pub struct Config {
    /// `PORT`, default 8080
    pub port: u16,

    /// `DATABASE_URL`, path of the redb file, default `data.db`
    pub database_path: String,

    /// `BASE_URL`, prefix of the short links handed out, default `http://localhost:{port}`
    pub base_url: String,

    /// `GEO_LOOKUP_URL`; an empty value disables geolocation
    pub geo_lookup_url: Option<String>,

    /// `GEO_TIMEOUT_MS`, default 1500
    pub geo_timeout: Duration,

    /// `PERSIST_EVENTS`, keep an event log in the database, default true
    pub persist_events: bool,
}

impl Config {
    pub fn from_env() -> Self {
        let port = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);

        let database_path = env::var("DATABASE_URL").unwrap_or_else(|_| "data.db".to_string());

        let base_url = env::var("BASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| format!("http://localhost:{}", port));

        let geo_lookup_url = match env::var("GEO_LOOKUP_URL") {
            Ok(url) if url.trim().is_empty() => None,
            Ok(url) => Some(url),
            Err(_) => Some(DEFAULT_GEO_LOOKUP_URL.to_string()),
        };

        let geo_timeout = env::var("GEO_TIMEOUT_MS")
            .ok()
            .and_then(|ms| ms.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_GEO_TIMEOUT);

        let persist_events = env::var("PERSIST_EVENTS")
            .map(|v| !matches!(v.trim().to_ascii_lowercase().as_str(), "0" | "false" | "no" | "off"))
            .unwrap_or(true);

        Self {
            port,
            database_path,
            base_url,
            geo_lookup_url,
            geo_timeout,
            persist_events,
        }
    }
}
