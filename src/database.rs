//! Database initialization and shared application state
//!
//! This module sets up the embedded redb database and wires the store,
//! creation flow and resolver into the state handed to every handler.

use redb::{Database, TableDefinition};
use std::sync::Arc;

use crate::creation::CreationFlow;
use crate::events::{EventSink, TracingSink};
use crate::geo::{DisabledGeoLocator, GeoLocator};
use crate::resolver::{Resolver, DEFAULT_GEO_TIMEOUT};
use crate::shortcode::RandomGenerator;
use crate::store::MappingStore;

/// Namespaced key/value table
///
/// Key: storage key such as `url_shortener_data_v1`
/// Value: JSON document stored under that key
///
/// Example:
/// - Key: "url_shortener_data_v1"
/// - Value: '[{"shortcode":"abc123","longUrl":"https://example.com",...}]'
pub const TABLE_KV: TableDefinition<&str, &str> = TableDefinition::new("kv_v1");

/// Application state shared across all request handlers
#[derive(Clone)]
pub struct AppState {
    pub store: MappingStore,
    pub creation: CreationFlow,
    pub resolver: Resolver,
    /// Prefix used to build the short links returned to callers
    pub base_url: String,
    /// Whether `/api/events` has a persisted log to serve
    pub events_persisted: bool,
}

impl AppState {
    /// State with tracing-only events and geolocation switched off
    pub fn new(db: Arc<Database>) -> Self {
        Self::builder(db).build()
    }

    pub fn builder(db: Arc<Database>) -> AppStateBuilder {
        AppStateBuilder {
            db,
            base_url: "http://localhost:8080".to_string(),
            geo: Arc::new(DisabledGeoLocator),
            geo_timeout: DEFAULT_GEO_TIMEOUT,
            events: Arc::new(TracingSink),
            events_persisted: false,
        }
    }
}

pub struct AppStateBuilder {
    db: Arc<Database>,
    base_url: String,
    geo: Arc<dyn GeoLocator>,
    geo_timeout: std::time::Duration,
    events: Arc<dyn EventSink>,
    events_persisted: bool,
}

impl AppStateBuilder {
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn geo(mut self, geo: Arc<dyn GeoLocator>, timeout: std::time::Duration) -> Self {
        self.geo = geo;
        self.geo_timeout = timeout;
        self
    }

    /// `persisted` marks sinks whose log is readable through `/api/events`.
    pub fn events(mut self, events: Arc<dyn EventSink>, persisted: bool) -> Self {
        self.events = events;
        self.events_persisted = persisted;
        self
    }

    pub fn build(self) -> AppState {
        let store = MappingStore::new(self.db);
        let creation = CreationFlow::new(
            store.clone(),
            Arc::clone(&self.events),
            Arc::new(RandomGenerator),
        );
        let resolver = Resolver::new(store.clone(), self.geo, self.events, self.geo_timeout);

        AppState {
            store,
            creation,
            resolver,
            base_url: self.base_url,
            events_persisted: self.events_persisted,
        }
    }
}

/// Initializes the embedded database and creates required tables
///
/// # Arguments
///
/// * `db_path` - File path where the database should be stored (e.g., "data.db")
///
/// # Example
///
/// ```no_run
/// # use shortlink::database::init_db;
/// let db = init_db("data.db").expect("Failed to initialize database");
/// ```
pub fn init_db(db_path: &str) -> Result<Database, redb::Error> {
    let db = Database::create(db_path)?;

    let write_txn = db.begin_write()?;
    {
        write_txn.open_table(TABLE_KV)?;
    }
    write_txn.commit()?;

    Ok(db)
}
