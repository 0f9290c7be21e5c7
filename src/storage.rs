//! Storage Module
//!
//! Thin boundary to the object-store collaborator: listing collection,
//! byte fetches, and content-typed writes. The aggregator depends on the
//! store listing keys in ascending lexicographic order under a prefix,
//! which conforming backends (S3-compatible stores, the in-memory store)
//! provide.

use bytes::Bytes;
use futures::StreamExt;
use object_store::path::Path;
use object_store::{Attribute, Attributes, ObjectStore, PutOptions, PutPayload, PutResult};

use crate::listing::ListingEntry;
use crate::Result;

/// Collects one recursive listing pass under `prefix`.
///
/// A listing stream error is a systemic failure: the whole pass aborts
/// rather than continuing over a partial listing.
pub async fn collect_listing(store: &dyn ObjectStore, prefix: &str) -> Result<Vec<ListingEntry>> {
    let prefix_path = Path::from(prefix);
    let mut stream = store.list(Some(&prefix_path));

    let mut entries = Vec::new();
    while let Some(meta) = stream.next().await {
        let meta = meta?;
        entries.push(ListingEntry {
            key: meta.location.to_string(),
            last_modified: meta.last_modified,
        });
    }
    Ok(entries)
}

/// Downloads the full contents of one object.
pub async fn fetch_object(store: &dyn ObjectStore, key: &str) -> Result<Bytes> {
    let result = store.get(&Path::from(key)).await?;
    Ok(result.bytes().await?)
}

/// Stores `data` under `key` with the given content type, returning the
/// store's write confirmation.
pub async fn put_object(
    store: &dyn ObjectStore,
    key: &str,
    data: Bytes,
    content_type: &str,
) -> Result<PutResult> {
    let mut attributes = Attributes::new();
    attributes.insert(Attribute::ContentType, content_type.to_string().into());
    let options = PutOptions {
        attributes,
        ..Default::default()
    };

    Ok(store
        .put_opts(&Path::from(key), PutPayload::from(data), options)
        .await?)
}
