//! Table Module
//!
//! Row and table types for per-user tabular data: delimiter-aware parsing
//! of source fragments, column projection, and the joined result tables
//! the export and statistics operations are built on.

use serde_json::Value;

use crate::{AggregatorError, Result};

/// Column synthesized from the listing-derived identifier, never taken
/// from fragment contents.
pub const USER_ID_COLUMN: &str = "user_id";

/// Column populated from the cached image path when a row view is built.
pub const IMG_PATH_COLUMN: &str = "img_path";

/// Column holding a user's UTC birthdate as milliseconds since the epoch.
pub const BIRTH_TIMESTAMP_COLUMN: &str = "birthts";

/// A single user's structured data: an insertion-ordered mapping from
/// column name to scalar value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    entries: Vec<(String, Value)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value at `column`, or `None` if the column is absent from the row.
    /// A column holding `Value::Null` is present.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Replaces the value of an existing column, or appends a new one.
    pub fn set(&mut self, column: &str, value: Value) {
        match self.entries.iter_mut().find(|(name, _)| name == column) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((column.to_string(), value)),
        }
    }

    /// Inserts a column at the front of the row, removing any existing
    /// column of the same name first.
    pub fn insert_front(&mut self, column: &str, value: Value) {
        self.entries.retain(|(name, _)| name != column);
        self.entries.insert(0, (column.to_string(), value));
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parses a raw data fragment into a [`Row`].
///
/// A fragment is a header line plus exactly one data line, with fields
/// separated by `delimiter`. The delimiter may be longer than one
/// character (the default source format uses `", "`), which is why this
/// is a plain split rather than a byte-delimited CSV reader.
pub fn parse_fragment(data: &[u8], delimiter: &str) -> Result<Row> {
    if delimiter.is_empty() {
        return Err(AggregatorError::ConfigError(
            "Fragment delimiter must not be empty".to_string(),
        ));
    }

    let text = std::str::from_utf8(data)
        .map_err(|e| AggregatorError::ParseError(format!("Fragment is not valid UTF-8: {}", e)))?;

    let mut lines = text.lines().filter(|line| !line.trim().is_empty());
    let header = lines
        .next()
        .ok_or_else(|| AggregatorError::ParseError("Fragment is empty".to_string()))?;
    let data_line = lines
        .next()
        .ok_or_else(|| AggregatorError::ParseError("Fragment has no data row".to_string()))?;
    if lines.next().is_some() {
        return Err(AggregatorError::ParseError(
            "Fragment has more than one data row".to_string(),
        ));
    }

    let columns: Vec<&str> = header.split(delimiter).map(str::trim).collect();
    let fields: Vec<&str> = data_line.split(delimiter).collect();
    if columns.len() != fields.len() {
        return Err(AggregatorError::ParseError(format!(
            "Fragment has {} header columns but {} fields",
            columns.len(),
            fields.len()
        )));
    }

    let mut row = Row::new();
    for (column, field) in columns.into_iter().zip(fields) {
        if column.is_empty() {
            return Err(AggregatorError::ParseError(
                "Fragment has an empty column name".to_string(),
            ));
        }
        row.set(column, parse_scalar(field));
    }
    Ok(row)
}

/// Interprets a raw field as the narrowest scalar that represents it:
/// integer, float, boolean, then string. Empty fields become null.
fn parse_scalar(field: &str) -> Value {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    if let Ok(int) = trimmed.parse::<i64>() {
        return Value::from(int);
    }
    if let Ok(float) = trimmed.parse::<f64>() {
        if let Some(number) = serde_json::Number::from_f64(float) {
            return Value::Number(number);
        }
    }
    match trimmed {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(trimmed.to_string()),
    }
}

/// A column-projected concatenation of matching rows.
///
/// The column list is carried even when no rows matched, so an empty
/// result keeps the requested shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// An empty table carrying the given columns.
    pub fn empty(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Projects `rows` onto `columns`, in order.
    ///
    /// Projecting onto a column absent from any row is a configuration
    /// error, not an empty result.
    pub fn from_rows(rows: &[Row], columns: &[String]) -> Result<Self> {
        let mut projected = Vec::with_capacity(rows.len());
        for row in rows {
            let mut values = Vec::with_capacity(columns.len());
            for column in columns {
                let value = row.get(column).ok_or_else(|| {
                    AggregatorError::ColumnNotFound(format!(
                        "Given output columns contain a name not present in the data: {}",
                        column
                    ))
                })?;
                values.push(value.clone());
            }
            projected.push(values);
        }
        Ok(Self {
            columns: columns.to_vec(),
            rows: projected,
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|name| name == column)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
