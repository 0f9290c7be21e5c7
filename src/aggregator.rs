//! Aggregator Module
//!
//! The cache-and-aggregation engine: runs listing passes against the
//! object store, keeps the per-user record cache current, and builds
//! filtered, column-projected aggregates from it.
//!
//! # Concurrency
//!
//! One aggregation pass runs under a single exclusive lock held for the
//! pass's full duration: listing scan, fetch scheduling, concurrent fetch
//! execution, merge, and table build. Within a pass, downloads run on a
//! bounded worker pool and the pass blocks on a join-all barrier before
//! building its table. Two concurrent aggregate requests therefore
//! serialize entirely on the pass lock. That trades throughput for
//! simplicity; moving to finer-grained locking would require one lock per
//! cached record plus a pass generation counter to detect staleness, and
//! is deliberately not done here.

use chrono::Utc;
use object_store::{ObjectStore, PutResult};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::AggregatorConfig;
use crate::export::{export_table, ExportOptions, ExportOutput};
use crate::fetch;
use crate::filter::FilterSet;
use crate::listing::group_listing;
use crate::record_cache::{CachedRecord, RecordCache};
use crate::storage;
use crate::table::{Row, Table, BIRTH_TIMESTAMP_COLUMN, IMG_PATH_COLUMN};
use crate::temporal::age_from_timestamp;
use crate::{AggregatorError, Result};

/// The engine owning the record cache and the object-store handle.
///
/// All state lives behind the pass lock; the engine itself is shared via
/// `Arc` across request handlers.
pub struct UserDataAggregator {
    store: Arc<dyn ObjectStore>,
    config: AggregatorConfig,
    /// Pass lock and record cache in one: locking the cache IS entering a
    /// pass, so no torn mixture of two listing passes can be observed.
    cache: Mutex<RecordCache>,
}

impl UserDataAggregator {
    pub fn new(store: Arc<dyn ObjectStore>, config: AggregatorConfig) -> Self {
        Self {
            store,
            config,
            cache: Mutex::new(RecordCache::new()),
        }
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Export options used when a caller does not request a shape:
    /// binary CSV with the configured delimiter.
    pub fn default_export_options(&self) -> ExportOptions {
        ExportOptions::csv(self.config.csv_delimiter.clone())
    }

    /// Runs one aggregation pass and returns the filtered, projected
    /// table.
    ///
    /// `columns` defaults to the configured output columns and
    /// `image_extensions` to the configured extension set. The result
    /// draws from users seen in this pass's listing (reusable or freshly
    /// merged); users without parsed data are skipped. Cross-user row
    /// order is not guaranteed.
    pub async fn aggregate_to_table(
        &self,
        columns: Option<&[String]>,
        filters: &FilterSet,
        image_extensions: Option<&HashSet<String>>,
    ) -> Result<Table> {
        let columns = columns.unwrap_or(&self.config.output_columns);
        let image_extensions = image_extensions.unwrap_or(&self.config.image_extensions);

        let mut cache = self.cache.lock().await;

        let entries =
            storage::collect_listing(self.store.as_ref(), &self.config.source_prefix).await?;
        let plan = group_listing(&entries, image_extensions, &mut cache);
        debug!(
            "Listing pass over {}: {} entries, {} reusable, {} scheduled",
            self.config.source_prefix,
            entries.len(),
            plan.reusable.len(),
            plan.fetches.len()
        );

        let mut user_ids = plan.reusable;
        let fetched = fetch::run_fetch_pass(
            Arc::clone(&self.store),
            plan.fetches,
            &self.config.csv_delimiter,
            self.config.fetch_concurrency,
            &mut cache,
        )
        .await;
        user_ids.extend(fetched);

        let mut matching: Vec<Row> = Vec::new();
        for user_id in &user_ids {
            let Some(record) = cache.get(user_id) else {
                continue;
            };
            let Some(row) = self.joined_row(record) else {
                continue;
            };
            if filters.matches(&row)? {
                matching.push(row);
            }
        }

        Table::from_rows(&matching, columns)
    }

    /// The cached row with the `img_path` column set from the cache at
    /// read time; image state changes independently of fragment state and
    /// must reflect the latest grouping pass. `None` for users without
    /// parsed data.
    fn joined_row(&self, record: &CachedRecord) -> Option<Row> {
        let mut row = record.info.clone()?;
        let image = record
            .image_path
            .clone()
            .unwrap_or_else(|| self.config.empty_value.clone());
        row.set(IMG_PATH_COLUMN, Value::from(image));
        Some(row)
    }

    /// Full filtered aggregate, serialized per `options` (or the default
    /// shape).
    pub async fn aggregate(
        &self,
        columns: Option<&[String]>,
        filters: &FilterSet,
        image_extensions: Option<&HashSet<String>>,
        options: Option<ExportOptions>,
    ) -> Result<ExportOutput> {
        let options = options.unwrap_or_else(|| self.default_export_options());
        let table = self
            .aggregate_to_table(columns, filters, image_extensions)
            .await?;
        export_table(&table, &options)
    }

    /// Mean age in years of the users matching `filters`, or exactly
    /// `-1.0` when no user matches. A missing `birthts` column is a
    /// configuration error, not an empty result.
    pub async fn average_age(
        &self,
        filters: &FilterSet,
        image_extensions: Option<&HashSet<String>>,
    ) -> Result<f64> {
        let columns = vec![BIRTH_TIMESTAMP_COLUMN.to_string()];
        let table = self
            .aggregate_to_table(Some(&columns), filters, image_extensions)
            .await
            .map_err(|err| match err {
                AggregatorError::ColumnNotFound(_) => AggregatorError::ColumnNotFound(
                    "User data do not contain the \"birthts\" column, unable to calculate age"
                        .to_string(),
                ),
                other => other,
            })?;

        let mut timestamps = Vec::with_capacity(table.len());
        for row in table.rows() {
            match &row[0] {
                Value::Null => continue,
                value => {
                    let ts = value.as_f64().ok_or_else(|| {
                        AggregatorError::InternalError(format!(
                            "Non-numeric birth timestamp: {}",
                            value
                        ))
                    })?;
                    timestamps.push(ts);
                }
            }
        }

        if timestamps.is_empty() {
            return Ok(-1.0);
        }
        let mean = timestamps.iter().sum::<f64>() / timestamps.len() as f64;
        Ok(age_from_timestamp(Utc::now(), mean))
    }

    /// Writes the unfiltered full aggregate to the store under `name`,
    /// returning the store's write confirmation.
    pub async fn publish(&self, name: &str, options: Option<ExportOptions>) -> Result<PutResult> {
        let options = options.unwrap_or_else(|| self.default_export_options());
        let output = self
            .aggregate(None, &FilterSet::new(), None, Some(options.clone()))
            .await?;

        let confirmation = storage::put_object(
            self.store.as_ref(),
            name,
            output.into_bytes(),
            options.format.content_type(),
        )
        .await?;
        info!("Published aggregate to {}", name);
        Ok(confirmation)
    }
}
