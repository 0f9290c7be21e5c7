//! End-to-end aggregation tests: listing, grouping, fetching, joining
//! and exporting against an in-memory object store.

mod support;

use object_store::ObjectStore;
use serde_json::Value;
use std::sync::Arc;
use support::InstrumentedStore;
use userdata_aggregator::aggregator::UserDataAggregator;
use userdata_aggregator::config::AggregatorConfig;
use userdata_aggregator::export::ExportOptions;
use userdata_aggregator::filter::{ColumnFilter, FilterSet};
use userdata_aggregator::AggregatorError;

const EMPTY: &str = "\u{f8}";

async fn seeded_engine() -> (Arc<InstrumentedStore>, UserDataAggregator) {
    let store = Arc::new(InstrumentedStore::new());
    store
        .put_bytes(
            "source_data/1000.csv",
            b"first_name, last_name, birthts\nJo, Dale, 620078400000\n",
        )
        .await;
    store.put_bytes("source_data/1000.png", b"png bytes").await;
    store
        .put_bytes(
            "source_data/1001.csv",
            b"first_name, last_name, birthts\nSam, Reed, 820078400000\n",
        )
        .await;

    let engine = UserDataAggregator::new(
        Arc::clone(&store) as Arc<dyn object_store::ObjectStore>,
        AggregatorConfig::default(),
    );
    (store, engine)
}

fn row_by_user<'a>(table: &'a userdata_aggregator::table::Table, user_id: &str) -> &'a [Value] {
    let idx = table.column_index("user_id").unwrap();
    table
        .rows()
        .iter()
        .find(|row| row[idx] == Value::from(user_id))
        .map(|row| row.as_slice())
        .unwrap_or_else(|| panic!("no row for user {}", user_id))
}

#[tokio::test]
async fn test_aggregate_joins_fragments_and_images() {
    let (_, engine) = seeded_engine().await;

    let table = engine
        .aggregate_to_table(None, &FilterSet::new(), None)
        .await
        .unwrap();

    assert_eq!(table.len(), 2);
    assert_eq!(
        table.columns(),
        &["user_id", "first_name", "last_name", "birthts", "img_path"]
    );

    let img_idx = table.column_index("img_path").unwrap();
    let name_idx = table.column_index("first_name").unwrap();

    let with_image = row_by_user(&table, "1000");
    assert_eq!(with_image[name_idx], Value::from("Jo"));
    assert_eq!(with_image[img_idx], Value::from("source_data/1000.png"));

    // No image asset: the sentinel appears in the joined view.
    let without_image = row_by_user(&table, "1001");
    assert_eq!(without_image[img_idx], Value::from(EMPTY));
}

#[tokio::test]
async fn test_image_presence_filter() {
    let (_, engine) = seeded_engine().await;

    let mut filters = FilterSet::new();
    filters.push(ColumnFilter::new("img_path", |v| {
        v.as_str().map(|p| p != EMPTY).unwrap_or(false)
    }));

    let table = engine
        .aggregate_to_table(None, &filters, None)
        .await
        .unwrap();
    assert_eq!(table.len(), 1);
    assert_eq!(row_by_user(&table, "1000")[0], Value::from("1000"));
}

#[tokio::test]
async fn test_no_matches_keeps_projected_columns() {
    let (_, engine) = seeded_engine().await;

    let mut filters = FilterSet::new();
    filters.push(ColumnFilter::new("first_name", |_| false));

    let columns = vec!["user_id".to_string(), "birthts".to_string()];
    let table = engine
        .aggregate_to_table(Some(&columns), &filters, None)
        .await
        .unwrap();

    assert!(table.is_empty());
    assert_eq!(table.columns(), columns.as_slice());
}

#[tokio::test]
async fn test_filter_on_unknown_column_is_a_configuration_error() {
    let (_, engine) = seeded_engine().await;

    let mut filters = FilterSet::new();
    filters.push(ColumnFilter::new("shoe_size", |_| true));

    let err = engine
        .aggregate_to_table(None, &filters, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AggregatorError::ColumnNotFound(_)));
    assert!(err.is_configuration());
}

#[tokio::test]
async fn test_projection_onto_unknown_column_is_a_configuration_error() {
    let (_, engine) = seeded_engine().await;

    let columns = vec!["user_id".to_string(), "shoe_size".to_string()];
    let err = engine
        .aggregate_to_table(Some(&columns), &FilterSet::new(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, AggregatorError::ColumnNotFound(_)));
}

#[tokio::test]
async fn test_json_aggregate_is_an_array_of_ordered_records() {
    let (_, engine) = seeded_engine().await;

    let output = engine
        .aggregate(None, &FilterSet::new(), None, Some(ExportOptions::json()))
        .await
        .unwrap();
    let body = output.into_bytes();
    let records: Vec<serde_json::Map<String, Value>> =
        serde_json::from_slice(&body).unwrap();

    assert_eq!(records.len(), 2);
    for record in &records {
        let keys: Vec<&str> = record.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec!["user_id", "first_name", "last_name", "birthts", "img_path"]
        );
    }
}

#[tokio::test]
async fn test_image_only_user_is_skipped() {
    let (store, engine) = seeded_engine().await;
    store.put_bytes("source_data/1002.png", b"png bytes").await;

    let table = engine
        .aggregate_to_table(None, &FilterSet::new(), None)
        .await
        .unwrap();

    // A user with no data fragment never matches and never errors.
    assert_eq!(table.len(), 2);
}

#[tokio::test]
async fn test_publish_writes_the_default_csv_aggregate() {
    let (store, engine) = seeded_engine().await;

    let confirmation = engine.publish("processed_data/output.csv", None).await.unwrap();
    assert!(confirmation.e_tag.is_some());

    let stored = store
        .get(&object_store::path::Path::from("processed_data/output.csv"))
        .await
        .unwrap()
        .bytes()
        .await
        .unwrap();
    let text = String::from_utf8(stored.to_vec()).unwrap();

    let mut lines = text.lines();
    assert_eq!(
        lines.next(),
        Some("user_id, first_name, last_name, birthts, img_path")
    );
    assert_eq!(lines.clone().count(), 2);
    assert!(lines.any(|line| line.starts_with("1000, Jo, Dale, ")));
}
