//! Fire-and-forget event sinks
//!
//! Creation and resolution report what happened through an [`EventSink`].
//! Sinks must never block or fail the caller: every failure is logged and
//! swallowed.

use std::sync::Arc;
use std::thread;

use chrono::Utc;
use redb::{Database, ReadableDatabase, ReadableTable};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::database::TABLE_KV;
use crate::error::StoreError;
use crate::model::LoggedEvent;

/// Key under which the persistent sink appends its entries
pub const EVENTS_KEY: &str = "url_shortener_logs";

pub const SHORTEN_CREATED: &str = "SHORTEN_CREATED";
pub const REDIRECT: &str = "REDIRECT";
pub const REDIRECT_NOT_FOUND: &str = "REDIRECT_NOT_FOUND";
pub const REDIRECT_EXPIRED: &str = "REDIRECT_EXPIRED";

pub trait EventSink: Send + Sync {
    fn log(&self, event_type: &str, payload: Value);
}

/// Emits each event as a structured `tracing` record.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn log(&self, event_type: &str, payload: Value) {
        info!(
            target: "shortlink::events",
            event_type,
            %payload,
            ts = Utc::now().timestamp_millis(),
            "event"
        );
    }
}

/// Traces each event and hands it to a single writer thread.
///
/// Events reach the database in the order they were logged. The writer
/// drains everything queued since its last wake-up and appends it in one
/// transaction. It stops once every clone of the sink is dropped.
#[derive(Clone)]
pub struct PersistentSink {
    tx: mpsc::UnboundedSender<LoggedEvent>,
}

impl PersistentSink {
    pub fn new(db: Arc<Database>) -> std::io::Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        thread::Builder::new()
            .name("shortlink-events".into())
            .spawn(move || run_writer(&db, rx))?;
        Ok(Self { tx })
    }
}

impl EventSink for PersistentSink {
    fn log(&self, event_type: &str, payload: Value) {
        TracingSink.log(event_type, payload.clone());

        let entry = LoggedEvent {
            event_type: event_type.to_string(),
            payload,
            ts: Utc::now().timestamp_millis(),
        };
        if self.tx.send(entry).is_err() {
            warn!(event_type, "event writer stopped, event dropped");
        }
    }
}

fn run_writer(db: &Database, mut rx: mpsc::UnboundedReceiver<LoggedEvent>) {
    while let Some(first) = rx.blocking_recv() {
        // Batch whatever else is already queued
        let mut batch = vec![first];
        while let Ok(entry) = rx.try_recv() {
            batch.push(entry);
        }

        if let Err(err) = append_events(db, batch) {
            warn!(error = %err, "failed to persist events");
        }
    }
    debug!("event writer finished");
}

fn append_events(db: &Database, batch: Vec<LoggedEvent>) -> Result<(), StoreError> {
    let write_txn = db.begin_write()?;
    {
        let mut table = write_txn.open_table(TABLE_KV)?;
        let mut events: Vec<LoggedEvent> = match table.get(EVENTS_KEY)? {
            Some(value) => serde_json::from_str(value.value())?,
            None => Vec::new(),
        };
        events.extend(batch);

        let json = serde_json::to_string(&events)?;
        table.insert(EVENTS_KEY, json.as_str())?;
    }
    write_txn.commit()?;
    Ok(())
}

/// Events recorded by [`PersistentSink`], oldest first
pub fn load_events(db: &Database) -> Result<Vec<LoggedEvent>, StoreError> {
    let read_txn = db.begin_read()?;
    let table = read_txn.open_table(TABLE_KV)?;

    let events: Vec<LoggedEvent> = match table.get(EVENTS_KEY)? {
        Some(value) => serde_json::from_str(value.value())?,
        None => Vec::new(),
    };
    Ok(events)
}
