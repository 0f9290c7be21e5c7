//! Shared test support: an in-memory object store wrapper that counts
//! downloads and can fail specific keys, for observing the aggregator's
//! fetch behavior from the outside.

#![allow(dead_code)]

use async_trait::async_trait;
use futures::stream::BoxStream;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::{
    GetOptions, GetResult, ListResult, MultipartUpload, ObjectMeta, ObjectStore,
    PutMultipartOpts, PutOptions, PutPayload, PutResult,
};
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// In-memory object store that counts `get` calls and fails injected
/// keys, delegating everything else to [`InMemory`].
#[derive(Debug)]
pub struct InstrumentedStore {
    inner: InMemory,
    gets: AtomicUsize,
    failing: Mutex<HashSet<String>>,
}

impl InstrumentedStore {
    pub fn new() -> Self {
        Self {
            inner: InMemory::new(),
            gets: AtomicUsize::new(0),
            failing: Mutex::new(HashSet::new()),
        }
    }

    /// Number of download attempts observed so far.
    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    /// Makes every download of `key` fail until cleared.
    pub fn fail_key(&self, key: &str) {
        self.failing.lock().unwrap().insert(key.to_string());
    }

    pub fn clear_failures(&self) {
        self.failing.lock().unwrap().clear();
    }

    /// Stores `data` under `key` (fresh last-modified time).
    pub async fn put_bytes(&self, key: &str, data: &[u8]) {
        self.inner
            .put(&Path::from(key), PutPayload::from(data.to_vec()))
            .await
            .expect("put into in-memory store");
    }
}

impl fmt::Display for InstrumentedStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InstrumentedStore({})", self.inner)
    }
}

#[async_trait]
impl ObjectStore for InstrumentedStore {
    async fn put_opts(
        &self,
        location: &Path,
        payload: PutPayload,
        opts: PutOptions,
    ) -> object_store::Result<PutResult> {
        self.inner.put_opts(location, payload, opts).await
    }

    async fn put_multipart_opts(
        &self,
        location: &Path,
        opts: PutMultipartOpts,
    ) -> object_store::Result<Box<dyn MultipartUpload>> {
        self.inner.put_multipart_opts(location, opts).await
    }

    async fn get_opts(
        &self,
        location: &Path,
        options: GetOptions,
    ) -> object_store::Result<GetResult> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().unwrap().contains(location.as_ref()) {
            return Err(object_store::Error::Generic {
                store: "InstrumentedStore",
                source: "injected download failure".into(),
            });
        }
        self.inner.get_opts(location, options).await
    }

    async fn delete(&self, location: &Path) -> object_store::Result<()> {
        self.inner.delete(location).await
    }

    fn list(&self, prefix: Option<&Path>) -> BoxStream<'static, object_store::Result<ObjectMeta>> {
        self.inner.list(prefix)
    }

    async fn list_with_delimiter(
        &self,
        prefix: Option<&Path>,
    ) -> object_store::Result<ListResult> {
        self.inner.list_with_delimiter(prefix).await
    }

    async fn copy(&self, from: &Path, to: &Path) -> object_store::Result<()> {
        self.inner.copy(from, to).await
    }

    async fn copy_if_not_exists(&self, from: &Path, to: &Path) -> object_store::Result<()> {
        self.inner.copy_if_not_exists(from, to).await
    }
}
