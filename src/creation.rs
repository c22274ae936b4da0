//! Batch creation of short links
//!
//! Rows are processed in order. The first invalid row aborts the rest of the
//! batch; rows saved before it stay saved.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use url::Url;

use crate::error::CreateError;
use crate::events::{EventSink, SHORTEN_CREATED};
use crate::model::{CreateRow, Mapping, Minutes};
use crate::shortcode::{self, CodeGenerator, DEFAULT_CODE_LENGTH};
use crate::store::MappingStore;

/// Validity used when the request gives none or a non-positive value
pub const DEFAULT_VALIDITY_MINUTES: i64 = 30;

/// Upper bound on validity (100 years)
pub const MAX_VALIDITY_MINUTES: i64 = 100 * 365 * 24 * 60;

/// Generated candidates tried per row before giving up
pub const MAX_GENERATION_ATTEMPTS: usize = 10;

/// Serialized form of an absolute http or https URL.
///
/// Parsing strips embedded tabs and newlines and percent-encodes anything
/// that cannot appear in a `Location` header, so only the serialized form is
/// safe to store.
pub fn normalize_url(value: &str) -> Option<String> {
    Url::parse(value)
        .ok()
        .filter(|url| matches!(url.scheme(), "http" | "https"))
        .map(String::from)
}

/// Leading integer of `text`: optional sign, then digits; the rest is ignored.
fn parse_leading_int(text: &str) -> Option<i64> {
    let text = text.trim_start();
    let (negative, digits) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };

    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }

    let value = digits[..end].bytes().fold(0i64, |acc, digit| {
        acc.saturating_mul(10).saturating_add(i64::from(digit - b'0'))
    });
    Some(if negative { -value } else { value })
}

/// Requested validity in minutes; missing, unparsable or non-positive input becomes 30.
pub fn resolve_minutes(requested: Option<&Minutes>) -> i64 {
    let minutes = match requested {
        Some(Minutes::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Some(Minutes::Text(text)) => parse_leading_int(text),
        None => None,
    };

    match minutes {
        Some(m) if m > 0 => m.min(MAX_VALIDITY_MINUTES),
        _ => DEFAULT_VALIDITY_MINUTES,
    }
}

/// Turns submitted rows into stored mappings.
///
/// Batches run one at a time so the uniqueness snapshot taken at the start
/// of a batch stays accurate until its last upsert.
#[derive(Clone)]
pub struct CreationFlow {
    store: MappingStore,
    events: Arc<dyn EventSink>,
    generator: Arc<dyn CodeGenerator>,
    batch_lock: Arc<Mutex<()>>,
}

impl CreationFlow {
    pub fn new(
        store: MappingStore,
        events: Arc<dyn EventSink>,
        generator: Arc<dyn CodeGenerator>,
    ) -> Self {
        Self {
            store,
            events,
            generator,
            batch_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Creates one mapping per non-empty row, valid from `now_ms`.
    pub async fn create(&self, rows: &[CreateRow], now_ms: i64) -> Result<Vec<Mapping>, CreateError> {
        let _batch = self.batch_lock.lock().await;

        let mut taken: HashSet<String> = self
            .store
            .load_all()?
            .into_iter()
            .map(|mapping| mapping.shortcode)
            .collect();

        let mut created = Vec::new();
        for (index, row) in rows.iter().enumerate() {
            let row_number = index + 1;
            let raw_url = row.url.trim();
            if raw_url.is_empty() {
                continue;
            }

            let Some(target_url) = normalize_url(raw_url) else {
                warn!(row = row_number, "rejecting row with invalid URL");
                return Err(CreateError::InvalidUrl { row: row_number });
            };

            let minutes = resolve_minutes(row.validity_minutes.as_ref());
            let shortcode = self.assign_shortcode(row, row_number, &taken)?;

            let mapping = Mapping::new(shortcode, target_url, minutes, now_ms);
            self.store.upsert(mapping.clone())?;
            taken.insert(mapping.shortcode.clone());

            debug!(shortcode = %mapping.shortcode, minutes, "short link created");
            self.events.log(
                SHORTEN_CREATED,
                json!({
                    "shortcode": mapping.shortcode,
                    "longUrl": mapping.target_url,
                    "expiresAt": mapping.expires_at
                }),
            );
            created.push(mapping);
        }

        Ok(created)
    }

    fn assign_shortcode(
        &self,
        row: &CreateRow,
        row_number: usize,
        taken: &HashSet<String>,
    ) -> Result<String, CreateError> {
        let custom = row
            .custom_shortcode
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty());

        if let Some(code) = custom {
            if !shortcode::is_valid_custom(code) {
                return Err(CreateError::InvalidShortcode {
                    row: row_number,
                    shortcode: code.to_string(),
                });
            }
            if taken.contains(code) {
                return Err(CreateError::ShortcodeTaken {
                    row: row_number,
                    shortcode: code.to_string(),
                });
            }
            return Ok(code.to_string());
        }

        for attempt in 1..=MAX_GENERATION_ATTEMPTS {
            let candidate = self.generator.generate(DEFAULT_CODE_LENGTH);
            if !taken.contains(&candidate) {
                return Ok(candidate);
            }
            debug!(attempt, candidate = %candidate, "generated shortcode collides");
        }

        warn!(row = row_number, "shortcode generation exhausted its attempts");
        Err(CreateError::CodeSpaceExhausted {
            row: row_number,
            attempts: MAX_GENERATION_ATTEMPTS,
        })
    }
}
