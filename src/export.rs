//! Export Module
//!
//! Serializes result tables to their external representations: CSV with a
//! configurable (possibly multi-character) field delimiter, or a JSON
//! array of per-row objects. Output is binary or text per the caller's
//! choice.

use bytes::Bytes;
use serde_json::Value;
use std::str::FromStr;

use crate::table::Table;
use crate::{AggregatorError, Result};

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    /// Content type reported when the export is written to the store.
    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "application/csv",
            ExportFormat::Json => "application/json",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = AggregatorError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            other => Err(AggregatorError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Shape of one export: format, CSV field delimiter, and whether the
/// output should be raw bytes or text.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub format: ExportFormat,
    pub delimiter: String,
    pub binary: bool,
}

impl ExportOptions {
    pub fn csv(delimiter: impl Into<String>) -> Self {
        Self {
            format: ExportFormat::Csv,
            delimiter: delimiter.into(),
            binary: true,
        }
    }

    pub fn json() -> Self {
        Self {
            format: ExportFormat::Json,
            delimiter: ",".to_string(),
            binary: true,
        }
    }

    pub fn text(mut self) -> Self {
        self.binary = false;
        self
    }
}

/// A serialized table, binary or text per [`ExportOptions::binary`].
#[derive(Debug, Clone, PartialEq)]
pub enum ExportOutput {
    Binary(Bytes),
    Text(String),
}

impl ExportOutput {
    /// The serialized payload as bytes, regardless of variant.
    pub fn into_bytes(self) -> Bytes {
        match self {
            ExportOutput::Binary(bytes) => bytes,
            ExportOutput::Text(text) => Bytes::from(text.into_bytes()),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ExportOutput::Binary(bytes) => bytes.len(),
            ExportOutput::Text(text) => text.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Serializes `table` according to `options`.
pub fn export_table(table: &Table, options: &ExportOptions) -> Result<ExportOutput> {
    let rendered = match options.format {
        ExportFormat::Csv => to_csv(table, &options.delimiter),
        ExportFormat::Json => to_json(table)?,
    };
    if options.binary {
        Ok(ExportOutput::Binary(Bytes::from(rendered.into_bytes())))
    } else {
        Ok(ExportOutput::Text(rendered))
    }
}

fn to_csv(table: &Table, delimiter: &str) -> String {
    let mut out = String::new();
    out.push_str(&table.columns().join(delimiter));
    out.push('\n');
    for row in table.rows() {
        let fields: Vec<String> = row.iter().map(render_csv_value).collect();
        out.push_str(&fields.join(delimiter));
        out.push('\n');
    }
    out
}

fn render_csv_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn to_json(table: &Table) -> Result<String> {
    let records: Vec<serde_json::Map<String, Value>> = table
        .rows()
        .iter()
        .map(|row| {
            table
                .columns()
                .iter()
                .cloned()
                .zip(row.iter().cloned())
                .collect()
        })
        .collect();
    Ok(serde_json::to_string_pretty(&records)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Row;

    fn sample_table() -> Table {
        let mut row = Row::new();
        row.set("user_id", Value::from("a1"));
        row.set("first_name", Value::from("Jo"));
        row.set("birthts", Value::from(100));
        let columns = vec![
            "user_id".to_string(),
            "first_name".to_string(),
            "birthts".to_string(),
        ];
        Table::from_rows(&[row], &columns).unwrap()
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("csv".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert_eq!("json".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert!(matches!(
            "xml".parse::<ExportFormat>(),
            Err(AggregatorError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_csv_export_with_multicharacter_delimiter() {
        let output = export_table(&sample_table(), &ExportOptions::csv("; ").text()).unwrap();
        let ExportOutput::Text(text) = output else {
            panic!("expected text output");
        };

        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("user_id; first_name; birthts"));
        assert_eq!(lines.next(), Some("a1; Jo; 100"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_csv_export_renders_null_as_empty_field() {
        let mut row = Row::new();
        row.set("a", Value::Null);
        row.set("b", Value::from(2));
        let columns = vec!["a".to_string(), "b".to_string()];
        let table = Table::from_rows(&[row], &columns).unwrap();

        let output = export_table(&table, &ExportOptions::csv(",").text()).unwrap();
        assert_eq!(output, ExportOutput::Text("a,b\n,2\n".to_string()));
    }

    #[test]
    fn test_csv_export_of_empty_table_is_header_only() {
        let table = Table::empty(vec!["user_id".to_string(), "birthts".to_string()]);
        let output = export_table(&table, &ExportOptions::csv(",").text()).unwrap();
        assert_eq!(output, ExportOutput::Text("user_id,birthts\n".to_string()));
    }

    #[test]
    fn test_json_export_preserves_column_order() {
        let output = export_table(&sample_table(), &ExportOptions::json().text()).unwrap();
        let ExportOutput::Text(text) = output else {
            panic!("expected text output");
        };

        let user_id = text.find("\"user_id\"").unwrap();
        let first_name = text.find("\"first_name\"").unwrap();
        let birthts = text.find("\"birthts\"").unwrap();
        assert!(user_id < first_name && first_name < birthts);

        let parsed: Vec<serde_json::Map<String, Value>> = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].get("user_id"), Some(&Value::from("a1")));
    }

    #[test]
    fn test_json_export_of_empty_table() {
        let table = Table::empty(vec!["user_id".to_string()]);
        let output = export_table(&table, &ExportOptions::json().text()).unwrap();
        assert_eq!(output, ExportOutput::Text("[]".to_string()));
    }

    #[test]
    fn test_binary_output_carries_the_same_payload() {
        let table = sample_table();
        let text = export_table(&table, &ExportOptions::csv(",").text()).unwrap();
        let binary = export_table(&table, &ExportOptions::csv(",")).unwrap();

        assert_eq!(binary.into_bytes(), text.into_bytes());
    }
}
