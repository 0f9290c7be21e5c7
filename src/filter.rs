//! Filter Module
//!
//! Column-predicate filters applied to cached user rows, and the
//! constructors that turn request-level parameters (age bounds, image
//! presence) into filters over the row's columns.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::table::{Row, BIRTH_TIMESTAMP_COLUMN, IMG_PATH_COLUMN};
use crate::temporal::timestamp_from_age;
use crate::{AggregatorError, Result};

/// Predicate over a single scalar value.
pub type Predicate = Box<dyn Fn(&Value) -> bool + Send + Sync>;

/// A filter bound to one column of a row.
pub struct ColumnFilter {
    column: String,
    predicate: Predicate,
}

impl ColumnFilter {
    pub fn new<F>(column: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Self {
            column: column.into(),
            predicate: Box::new(predicate),
        }
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    /// Applies the predicate to the row's value at this filter's column.
    ///
    /// A column absent from the row is a configuration error; a column
    /// that is present but null goes through the predicate like any other
    /// value.
    pub fn matches(&self, row: &Row) -> Result<bool> {
        let value = row.get(&self.column).ok_or_else(|| {
            AggregatorError::ColumnNotFound(format!(
                "One of the filters tried to access a non-existing column: {}",
                self.column
            ))
        })?;
        Ok((self.predicate)(value))
    }
}

impl std::fmt::Debug for ColumnFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColumnFilter")
            .field("column", &self.column)
            .finish_non_exhaustive()
    }
}

/// Conjunction of column filters: a row matches iff every filter does.
#[derive(Debug, Default)]
pub struct FilterSet {
    filters: Vec<ColumnFilter>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, filter: ColumnFilter) {
        self.filters.push(filter);
    }

    pub fn matches(&self, row: &Row) -> Result<bool> {
        for filter in &self.filters {
            if !filter.matches(row)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

/// Request-level filter parameters, as supplied by the HTTP collaborator.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FilterParams {
    pub min_age: Option<f64>,
    pub max_age: Option<f64>,
    pub image_exists: Option<bool>,
}

/// Builds the column filters for a set of request parameters.
///
/// Age bounds convert to birth-timestamp bounds against `now`: a user at
/// least `min_age` years old was born at or before `now - min_age` years,
/// and at most `max_age` years old at or after `now - max_age` years.
/// Image presence compares the joined `img_path` column against the
/// configured empty sentinel.
pub fn filters_from_params(
    params: &FilterParams,
    empty_value: &str,
    now: DateTime<Utc>,
) -> FilterSet {
    let mut filters = FilterSet::new();

    if let Some(min_age) = params.min_age {
        let max_birthts = timestamp_from_age(now, min_age) as f64;
        filters.push(ColumnFilter::new(BIRTH_TIMESTAMP_COLUMN, move |value| {
            value.as_f64().map(|ts| ts <= max_birthts).unwrap_or(false)
        }));
    }

    if let Some(max_age) = params.max_age {
        let min_birthts = timestamp_from_age(now, max_age) as f64;
        filters.push(ColumnFilter::new(BIRTH_TIMESTAMP_COLUMN, move |value| {
            value.as_f64().map(|ts| ts >= min_birthts).unwrap_or(false)
        }));
    }

    if let Some(image_exists) = params.image_exists {
        let empty = empty_value.to_string();
        filters.push(ColumnFilter::new(IMG_PATH_COLUMN, move |value| {
            let has_image = value.as_str().map(|path| path != empty).unwrap_or(false);
            has_image == image_exists
        }));
    }

    filters
}
