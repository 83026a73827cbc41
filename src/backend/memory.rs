//! In-memory adapters.
//!
//! Both adapters evaluate native filter strings the way the services do:
//! the string is parsed back into a predicate and run against each stored
//! item. Requests are counted so callers can see which path a query took.

use std::{
    collections::BTreeMap,
    io,
    sync::atomic::{AtomicBool, Ordering},
};

use async_lock::{Mutex, RwLock};
use async_trait::async_trait;
use stratus_predicate::{compile, parse_filter, CompiledPredicate, FieldSource, ScalarValue};
use tokio_util::sync::CancellationToken;

use super::{BackendError, BlobBackend, BlobItem, Page, TableBackend};
use crate::{
    entity::{Entity, TagAccessor, Tags, PARTITION_KEY, PARTITION_TAG, ROW_KEY, ROW_TAG},
    observability::log_debug,
};

const DEFAULT_PAGE_SIZE: usize = 1000;

/// Requests an in-memory adapter has served.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestStats {
    /// Page requests, filtered or not.
    pub page_requests: usize,
    /// Native filters received, in order.
    pub filters: Vec<String>,
    /// Point lookups by full key.
    pub point_lookups: usize,
    /// Listings that asked for every tag.
    pub tag_listings: usize,
    /// Blob bodies downloaded.
    pub downloads: usize,
}

/// Shared machinery of both adapters.
struct Core {
    stats: Mutex<RequestStats>,
    unavailable: AtomicBool,
    default_page_size: usize,
}

impl Core {
    fn new() -> Self {
        Self {
            stats: Mutex::new(RequestStats::default()),
            unavailable: AtomicBool::new(false),
            default_page_size: DEFAULT_PAGE_SIZE,
        }
    }

    fn check_available(&self) -> Result<(), BackendError> {
        if self.unavailable.load(Ordering::Acquire) {
            return Err(BackendError::Request(Box::new(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "service unavailable",
            ))));
        }
        Ok(())
    }

    async fn record_page(&self, filter: Option<&str>) {
        let mut stats = self.stats.lock().await;
        stats.page_requests += 1;
        if let Some(filter) = filter {
            stats.filters.push(filter.to_owned());
        }
    }

    fn page<R>(
        &self,
        matched: Vec<R>,
        continuation: Option<String>,
        page_size: Option<usize>,
    ) -> Result<Page<R>, BackendError> {
        let offset = match continuation {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| BackendError::InvalidContinuation(token))?,
            None => 0,
        };
        let page_size = page_size.unwrap_or(self.default_page_size).max(1);
        let end = offset.saturating_add(page_size);
        let continuation = (end < matched.len()).then(|| end.to_string());
        let items = matched.into_iter().skip(offset).take(page_size).collect();
        Ok(Page {
            items,
            continuation,
        })
    }
}

fn compile_filter(filter: &str) -> Result<CompiledPredicate, BackendError> {
    let invalid = |source: Box<dyn std::error::Error + Send + Sync>| BackendError::InvalidFilter {
        filter: filter.to_owned(),
        source,
    };
    let lambda = parse_filter(filter).map_err(|err| invalid(Box::new(err)))?;
    compile(&lambda).map_err(|err| invalid(Box::new(err)))
}

fn evaluate(
    predicate: &CompiledPredicate,
    filter: &str,
    source: &dyn FieldSource,
) -> Result<bool, BackendError> {
    predicate
        .evaluate(source)
        .map_err(|err| BackendError::InvalidFilter {
            filter: filter.to_owned(),
            source: Box::new(err),
        })
}

fn escape_segment(key: &str) -> String {
    key.replace('%', "%25").replace('/', "%2F")
}

/// Row as the table service filters it: keys under their literal names,
/// every other column as stored.
struct TableRow<'a, T> {
    entity: &'a T,
}

impl<T> FieldSource for TableRow<'_, T>
where
    T: Entity,
{
    fn field(&self, name: &str) -> Option<ScalarValue> {
        match name {
            PARTITION_KEY => Some(self.entity.partition_key().into()),
            ROW_KEY => Some(self.entity.row_key().into()),
            other => self.entity.field(other),
        }
    }
}

/// Table adapter over a sorted in-memory map.
pub struct MemoryTable<T> {
    rows: RwLock<BTreeMap<(String, String), T>>,
    core: Core,
}

impl<T> Default for MemoryTable<T> {
    fn default() -> Self {
        Self {
            rows: RwLock::new(BTreeMap::new()),
            core: Core::new(),
        }
    }
}

impl<T> MemoryTable<T>
where
    T: Entity + Clone,
{
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the page size used when a request names none.
    pub fn with_default_page_size(mut self, page_size: usize) -> Self {
        self.core.default_page_size = page_size;
        self
    }

    /// Inserts or replaces the row under `entity`'s key.
    pub async fn upsert(&self, entity: T) {
        let key = (entity.partition_key(), entity.row_key());
        self.rows.write().await.insert(key, entity);
    }

    /// Number of stored rows.
    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    /// True when no row is stored.
    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }

    /// Snapshot of served requests.
    pub async fn stats(&self) -> RequestStats {
        self.core.stats.lock().await.clone()
    }

    /// Makes every following request fail until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.core.unavailable.store(unavailable, Ordering::Release);
    }
}

#[async_trait]
impl<T> TableBackend<T> for MemoryTable<T>
where
    T: Entity + Clone,
{
    async fn query_page(
        &self,
        filter: Option<&str>,
        continuation: Option<String>,
        page_size: Option<usize>,
        _cancel: &CancellationToken,
    ) -> Result<Page<T>, BackendError> {
        self.core.check_available()?;
        self.core.record_page(filter).await;
        let predicate = filter.map(compile_filter).transpose()?;
        let rows = self.rows.read().await;
        let mut matched = Vec::new();
        for entity in rows.values() {
            if let (Some(predicate), Some(filter)) = (&predicate, filter) {
                if !evaluate(predicate, filter, &TableRow { entity })? {
                    continue;
                }
            }
            matched.push(entity.clone());
        }
        log_debug!(
            component = "memory_table",
            event = "page_served",
            matched = matched.len(),
            stored = rows.len(),
        );
        self.core.page(matched, continuation, page_size)
    }

    async fn get_entity(
        &self,
        partition_key: &str,
        row_key: &str,
        _cancel: &CancellationToken,
    ) -> Result<Option<T>, BackendError> {
        self.core.check_available()?;
        self.core.stats.lock().await.point_lookups += 1;
        let key = (partition_key.to_owned(), row_key.to_owned());
        Ok(self.rows.read().await.get(&key).cloned())
    }
}

/// Blob adapter keeping bodies and tags side by side.
///
/// Blobs are named `{partition}/{row}` with `%` and `/` percent-escaped inside
/// each key, so distinct keys never share a name.
pub struct MemoryBlobStore<T> {
    blobs: RwLock<BTreeMap<String, (T, Tags)>>,
    core: Core,
}

impl<T> Default for MemoryBlobStore<T> {
    fn default() -> Self {
        Self {
            blobs: RwLock::new(BTreeMap::new()),
            core: Core::new(),
        }
    }
}

impl<T> MemoryBlobStore<T>
where
    T: Entity + Clone,
{
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the page size used when a request names none.
    pub fn with_default_page_size(mut self, page_size: usize) -> Self {
        self.core.default_page_size = page_size;
        self
    }

    /// Name a blob holding `entity` is stored under.
    pub fn blob_name(entity: &T) -> String {
        format!(
            "{}/{}",
            escape_segment(&entity.partition_key()),
            escape_segment(&entity.row_key())
        )
    }

    /// Uploads `entity` and sets its tags.
    pub async fn upload(&self, entity: T) -> String {
        let name = Self::blob_name(&entity);
        let tags = entity.tags();
        self.blobs.write().await.insert(name.clone(), (entity, tags));
        name
    }

    /// Number of stored blobs.
    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    /// True when no blob is stored.
    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }

    /// Snapshot of served requests.
    pub async fn stats(&self) -> RequestStats {
        self.core.stats.lock().await.clone()
    }

    /// Makes every following request fail until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.core.unavailable.store(unavailable, Ordering::Release);
    }
}

#[async_trait]
impl<T> BlobBackend<T> for MemoryBlobStore<T>
where
    T: Entity + Clone,
{
    async fn find_blobs_by_tags(
        &self,
        filter: &str,
        continuation: Option<String>,
        page_size: Option<usize>,
        _cancel: &CancellationToken,
    ) -> Result<Page<BlobItem>, BackendError> {
        self.core.check_available()?;
        self.core.record_page(Some(filter)).await;
        let predicate = compile_filter(filter)?;
        let blobs = self.blobs.read().await;
        let mut matched = Vec::new();
        for (name, (_, tags)) in blobs.iter() {
            if evaluate(&predicate, filter, &TagAccessor::new(tags))? {
                matched.push(BlobItem {
                    name: name.clone(),
                    tags: tags.clone(),
                });
            }
        }
        self.core.page(matched, continuation, page_size)
    }

    async fn list_blobs(
        &self,
        include_tags: bool,
        continuation: Option<String>,
        page_size: Option<usize>,
        _cancel: &CancellationToken,
    ) -> Result<Page<BlobItem>, BackendError> {
        self.core.check_available()?;
        self.core.record_page(None).await;
        if include_tags {
            self.core.stats.lock().await.tag_listings += 1;
        }
        let blobs = self.blobs.read().await;
        let listed = blobs
            .iter()
            .map(|(name, (_, tags))| {
                let tags = if include_tags {
                    tags.clone()
                } else {
                    tags.clone()
                        .retain_names(|tag| tag == PARTITION_TAG || tag == ROW_TAG)
                };
                BlobItem {
                    name: name.clone(),
                    tags,
                }
            })
            .collect();
        self.core.page(listed, continuation, page_size)
    }

    async fn download(&self, name: &str, _cancel: &CancellationToken) -> Result<T, BackendError> {
        self.core.check_available()?;
        self.core.stats.lock().await.downloads += 1;
        self.blobs
            .read()
            .await
            .get(name)
            .map(|(entity, _)| entity.clone())
            .ok_or_else(|| BackendError::BlobNotFound(name.to_owned()))
    }
}
