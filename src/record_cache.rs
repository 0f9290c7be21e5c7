//! Record Cache Module
//!
//! In-memory cache of per-user records: the last parsed data fragment,
//! the most recently observed image key, and the modification time of the
//! fragment the cached data came from. This is the single shared mutable
//! resource of the aggregator; it is owned by the engine and only ever
//! read or written while the pass-wide lock is held.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::table::Row;
use crate::temporal::MIN_TIMESTAMP;

/// Cached state for one user identifier.
#[derive(Debug, Clone)]
pub struct CachedRecord {
    /// The listing-derived user identifier.
    pub user_id: String,
    /// Latest successfully parsed data fragment; `None` until the first
    /// successful fetch, and cleared again when a fetch fails.
    pub info: Option<Row>,
    /// Key of the most recently observed image asset, `None` when the
    /// user has no image. The exported sentinel string is substituted
    /// only when a row view is built.
    pub image_path: Option<String>,
    /// Modification time of the fragment behind `info`. Starts at
    /// `MIN_TIMESTAMP` and is reset to it on fetch failure so the next
    /// pass re-schedules the download.
    pub last_modified: DateTime<Utc>,
}

impl CachedRecord {
    fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            info: None,
            image_path: None,
            last_modified: MIN_TIMESTAMP,
        }
    }
}

/// Mapping from user identifier to cached record.
///
/// Append-or-update only: records are never removed, so a user that
/// disappears from the listing keeps stale cached data (absence detection
/// is not a goal of the aggregator).
#[derive(Debug, Default)]
pub struct RecordCache {
    records: HashMap<String, CachedRecord>,
}

impl RecordCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the record for `user_id`, inserting a default record on
    /// first sight.
    pub fn get_or_create(&mut self, user_id: &str) -> &mut CachedRecord {
        self.records
            .entry(user_id.to_string())
            .or_insert_with(|| CachedRecord::new(user_id))
    }

    pub fn get(&self, user_id: &str) -> Option<&CachedRecord> {
        self.records.get(user_id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
