//! Fetch Module
//!
//! The concurrent fetch-and-merge pipeline: downloads scheduled data
//! fragments through a bounded worker pool, parses them, and merges each
//! outcome into the record cache as it completes. Fetches complete and
//! merge in any order relative to submission.

use futures::stream::{self, StreamExt};
use object_store::ObjectStore;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::listing::FetchJob;
use crate::record_cache::RecordCache;
use crate::storage;
use crate::table::{parse_fragment, Row, IMG_PATH_COLUMN, USER_ID_COLUMN};
use crate::temporal::MIN_TIMESTAMP;
use crate::Result;

/// Tagged outcome of one scheduled fetch. Merging branches on the result
/// explicitly; there is no rollback path to reconstruct.
#[derive(Debug)]
pub struct FetchOutcome {
    pub job: FetchJob,
    pub result: Result<Row>,
}

/// Downloads and parses one user's data fragment.
///
/// The `user_id` column is synthesized from the listing-derived
/// identifier (never from fragment contents) at the front of the row, and
/// an `img_path` placeholder is appended; the cached image path is joined
/// in when a row view is built, since image state changes independently
/// of fragment state.
async fn fetch_and_parse(store: &dyn ObjectStore, job: &FetchJob, delimiter: &str) -> Result<Row> {
    let bytes = storage::fetch_object(store, &job.key).await?;
    let mut row = parse_fragment(&bytes, delimiter)?;
    row.insert_front(USER_ID_COLUMN, Value::from(job.user_id.clone()));
    row.set(IMG_PATH_COLUMN, Value::Null);
    Ok(row)
}

/// Merges one fetch outcome into the user's cache record.
///
/// Success commits the parsed row together with the listing timestamp the
/// job carried. Failure clears the cached row and resets the timestamp to
/// the minimum so the next pass re-schedules the fetch; the failure never
/// escapes the owning user.
pub fn merge_outcome(cache: &mut RecordCache, outcome: FetchOutcome) {
    let record = cache.get_or_create(&outcome.job.user_id);
    match outcome.result {
        Ok(row) => {
            record.info = Some(row);
            record.last_modified = outcome.job.last_modified;
            debug!(
                "Merged fragment for user {} ({})",
                outcome.job.user_id, outcome.job.key
            );
        }
        Err(err) => {
            record.info = None;
            record.last_modified = MIN_TIMESTAMP;
            warn!(
                "Fetch for user {} failed, will retry next pass: {}",
                outcome.job.user_id, err
            );
        }
    }
}

/// Runs all scheduled fetches concurrently and merges every outcome.
///
/// At most `concurrency` downloads are in flight at once. The returned
/// user identifiers cover every job, successful or not; the call returns
/// only after all scheduled fetches completed (the pass's join barrier).
pub async fn run_fetch_pass(
    store: Arc<dyn ObjectStore>,
    jobs: Vec<FetchJob>,
    delimiter: &str,
    concurrency: usize,
    cache: &mut RecordCache,
) -> Vec<String> {
    let concurrency = concurrency.max(1);
    let mut fetched = Vec::with_capacity(jobs.len());

    let mut outcomes = stream::iter(jobs.into_iter().map(|job| {
        let store = Arc::clone(&store);
        let delimiter = delimiter.to_string();
        async move {
            let result = fetch_and_parse(store.as_ref(), &job, &delimiter).await;
            FetchOutcome { job, result }
        }
    }))
    .buffer_unordered(concurrency);

    while let Some(outcome) = outcomes.next().await {
        fetched.push(outcome.job.user_id.clone());
        merge_outcome(cache, outcome);
    }

    fetched
}
