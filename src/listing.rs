//! Listing Module
//!
//! Groups a lexicographically sorted object listing into per-user work:
//! which cached records can be reused as-is, which data fragments must be
//! re-fetched, and which image key (if any) is current for each user.
//!
//! Groups are contiguous runs of entries whose keys yield the same user
//! identifier; ascending lexicographic listing order is an external
//! contract of the object store.

use chrono::{DateTime, Utc};
use std::collections::HashSet;

use crate::record_cache::RecordCache;

/// File extension of data fragments.
pub const DATA_EXTENSION: &str = ".csv";

/// One entry of an object listing pass, read-only input to the grouper.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingEntry {
    pub key: String,
    pub last_modified: DateTime<Utc>,
}

/// A scheduled download of one user's data fragment.
///
/// `last_modified` is the listing-reported time of the fragment; it is
/// committed to the cache only when the fetched fragment merges
/// successfully.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchJob {
    pub user_id: String,
    pub key: String,
    pub last_modified: DateTime<Utc>,
}

/// Outcome of one grouping scan.
#[derive(Debug, Default, PartialEq)]
pub struct PassPlan {
    /// Users whose cached fragment is still current.
    pub reusable: Vec<String>,
    /// Downloads to run before the pass can build its table.
    pub fetches: Vec<FetchJob>,
}

/// Splits an object key into the user identifier and the file extension.
///
/// The identifier is the substring after the last path separator and
/// before the extension; the extension keeps its leading dot and is empty
/// for extensionless keys.
pub fn split_object_key(key: &str) -> (&str, &str) {
    let name = match key.rfind('/') {
        Some(idx) => &key[idx + 1..],
        None => key,
    };
    match name.rfind('.') {
        // A leading dot is part of the name, not an extension marker.
        Some(0) | None => (name, ""),
        Some(idx) => (&name[..idx], &name[idx..]),
    }
}

/// Scans a sorted listing once and partitions it into per-user groups.
///
/// Each group finalizes by writing its accumulated image key into the
/// user's cache record (last image entry wins, so the lexicographically
/// largest image key is the one kept; no image entry leaves the record
/// with no image). Data fragments schedule a fetch only when the listing
/// reports them strictly newer than the cached record.
pub fn group_listing(
    entries: &[ListingEntry],
    image_extensions: &HashSet<String>,
    cache: &mut RecordCache,
) -> PassPlan {
    let mut plan = PassPlan::default();
    // Identifier and image accumulator of the group being scanned.
    let mut current: Option<(String, Option<String>)> = None;

    for entry in entries {
        let (user_id, extension) = split_object_key(&entry.key);

        let starts_new_group = match &current {
            Some((prev_id, _)) => prev_id != user_id,
            None => true,
        };
        if starts_new_group {
            if let Some((prev_id, image)) = current.take() {
                cache.get_or_create(&prev_id).image_path = image;
            }
            cache.get_or_create(user_id);
            current = Some((user_id.to_string(), None));
        }

        if image_extensions.contains(extension) {
            if let Some((_, image)) = current.as_mut() {
                *image = Some(entry.key.clone());
            }
        } else if extension == DATA_EXTENSION {
            let record = cache.get_or_create(user_id);
            if entry.last_modified > record.last_modified {
                plan.fetches.push(FetchJob {
                    user_id: user_id.to_string(),
                    key: entry.key.clone(),
                    last_modified: entry.last_modified,
                });
            } else {
                plan.reusable.push(user_id.to_string());
            }
        }
    }

    // The last group has no transition to finalize it.
    if let Some((prev_id, image)) = current {
        cache.get_or_create(&prev_id).image_path = image;
    }

    plan
}
