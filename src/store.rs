//! Mapping store backed by the embedded redb database
//!
//! All mappings live as one JSON array under [`MAPPINGS_KEY`] in the
//! [`TABLE_KV`] table. Every mutation is a read-modify-write inside a single
//! redb write transaction; redb admits one writer at a time, so concurrent
//! clicks on the same shortcode are serialized and never lost.

use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::database::TABLE_KV;
use crate::error::StoreError;
use crate::model::{ClickEvent, LegacyEntry, Mapping, MINUTE_MS};

/// Key holding the current representation of all mappings
pub const MAPPINGS_KEY: &str = "url_shortener_data_v1";

/// Key of the legacy `{code: {original}}` representation
pub const LEGACY_KEY: &str = "urls";

/// Validity assigned to records migrated from the legacy format
pub const LEGACY_VALIDITY_MINUTES: i64 = 30;

/// Owner of every `Mapping` record
///
/// Cheap to clone; clones share the same database handle.
#[derive(Clone)]
pub struct MappingStore {
    db: Arc<Database>,
}

impl MappingStore {
    /// Wraps a database that was prepared with [`crate::database::init_db`].
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    /// Every stored mapping, in stored order
    pub fn load_all(&self) -> Result<Vec<Mapping>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(TABLE_KV)?;

        let mappings: Vec<Mapping> = match table.get(MAPPINGS_KEY)? {
            Some(value) => serde_json::from_str(value.value())?,
            None => Vec::new(),
        };
        Ok(mappings)
    }

    pub fn find_by_shortcode(&self, code: &str) -> Result<Option<Mapping>, StoreError> {
        Ok(self
            .load_all()?
            .into_iter()
            .find(|mapping| mapping.shortcode == code))
    }

    /// Inserts a new mapping or replaces the one with the same shortcode in place.
    ///
    /// Last writer wins; callers establish uniqueness first when they need it.
    pub fn upsert(&self, mapping: Mapping) -> Result<(), StoreError> {
        self.modify(|mappings| {
            match mappings.iter_mut().find(|m| m.shortcode == mapping.shortcode) {
                Some(existing) => {
                    debug!(shortcode = %mapping.shortcode, "replacing mapping");
                    *existing = mapping;
                }
                None => mappings.push(mapping),
            }
            true
        })
    }

    /// Appends a click to the named mapping.
    ///
    /// Unknown shortcodes are ignored; returns whether a mapping was updated.
    pub fn record_click(&self, code: &str, click: ClickEvent) -> Result<bool, StoreError> {
        let mut recorded = false;
        self.modify(|mappings| {
            if let Some(mapping) = mappings.iter_mut().find(|m| m.shortcode == code) {
                mapping.clicks.push(click);
                recorded = true;
            }
            recorded
        })?;

        if !recorded {
            debug!(shortcode = %code, "click for unknown shortcode ignored");
        }
        Ok(recorded)
    }

    /// Converts the legacy representation into the current one.
    ///
    /// Runs only while [`MAPPINGS_KEY`] is absent and [`LEGACY_KEY`] is
    /// present, so calling it on every startup is harmless. Each migrated
    /// record is valid for 30 minutes from `now_ms` and starts with no clicks.
    /// A legacy value that cannot be parsed is logged and left alone.
    ///
    /// Returns the number of migrated records.
    pub fn migrate_legacy(&self, now_ms: i64) -> Result<usize, StoreError> {
        let write_txn = self.db.begin_write()?;
        let migrated = {
            let mut table = write_txn.open_table(TABLE_KV)?;

            // Already migrated, or never had legacy data
            if table.get(MAPPINGS_KEY)?.is_some() {
                return Ok(0);
            }

            let legacy: Option<String> = table.get(LEGACY_KEY)?.map(|v| v.value().to_string());
            let Some(legacy) = legacy else {
                return Ok(0);
            };

            // Object order is the legacy insertion order
            let entries: Map<String, Value> = match serde_json::from_str(&legacy) {
                Ok(entries) => entries,
                Err(err) => {
                    warn!(error = %err, "legacy mapping data is malformed, skipping migration");
                    return Ok(0);
                }
            };

            let mut mappings = Vec::with_capacity(entries.len());
            for (shortcode, value) in entries {
                let entry: LegacyEntry = match serde_json::from_value(value) {
                    Ok(entry) => entry,
                    Err(err) => {
                        warn!(shortcode = %shortcode, error = %err, "legacy record is malformed, skipping migration");
                        return Ok(0);
                    }
                };
                mappings.push(Mapping {
                    shortcode,
                    target_url: entry.original,
                    created_at: now_ms,
                    expires_at: now_ms + LEGACY_VALIDITY_MINUTES * MINUTE_MS,
                    clicks: Vec::new(),
                });
            }

            // Legacy key is left in place
            let json = serde_json::to_string(&mappings)?;
            table.insert(MAPPINGS_KEY, json.as_str())?;
            mappings.len()
        };
        write_txn.commit()?;

        info!(count = migrated, "migrated legacy mapping data");
        Ok(migrated)
    }

    /// Runs `f` over the full record set inside one write transaction.
    ///
    /// Nothing is written when `f` returns false.
    fn modify<F>(&self, f: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut Vec<Mapping>) -> bool,
    {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(TABLE_KV)?;

            // Read the current record set inside the same transaction
            let mut mappings: Vec<Mapping> = match table.get(MAPPINGS_KEY)? {
                Some(value) => serde_json::from_str(value.value())?,
                None => Vec::new(),
            };

            // Dropping the transaction without commit aborts it
            if !f(&mut mappings) {
                return Ok(());
            }

            let json = serde_json::to_string(&mappings)?;
            table.insert(MAPPINGS_KEY, json.as_str())?;
        }
        write_txn.commit()?;
        Ok(())
    }
}
