//! Pluggable storage backends.
//!
//! Every backend implements the same narrow protocol over serialized
//! records: put, get, delete, paged query and scan, and derived index-set
//! maintenance. Three storage strategies ship with the crate:
//!
//! - [PartitionedBackend]: records partitioned by document type with
//!   natively maintained global secondary indexes. Case-sensitive.
//! - [KeyValueBackend]: a flat key space with manually maintained index
//!   sets. Case-insensitive index keys.
//! - [HybridBackend]: record bodies kept as encoded blobs, index sets
//!   maintained beside them. Case-insensitive index keys.
//!
//! Backends never see entities. They receive write-ready records together
//! with the stale index values a save retires, and keep the derived index
//! structures consistent within the same write.

mod hybrid;
mod index_sets;
mod keyvalue;
mod partitioned;

pub use hybrid::HybridBackend;
pub use keyvalue::KeyValueBackend;
pub use partitioned::PartitionedBackend;

use std::sync::Arc;

use crate::common::{atomic, Atomic, Record};
use crate::document::StaleIndexEntry;
use crate::errors::{DocketError, DocketResult, ErrorKind};
use crate::index::IndexModel;
use crate::query::QueryPlan;

/// The storage strategy of a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Partitioned,
    KeyValue,
    Hybrid,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BackendKind::Partitioned => "partitioned",
            BackendKind::KeyValue => "keyvalue",
            BackendKind::Hybrid => "hybrid",
        };
        write!(f, "{}", name)
    }
}

/// An opaque cursor marking how far a paged read has progressed.
///
/// Tokens are only meaningful to the backend that issued them, for the
/// query that issued them. Resuming with a token continues strictly after
/// the last evaluated record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContinuationToken {
    last_key: String,
}

impl ContinuationToken {
    pub(crate) fn new(last_key: &str) -> Self {
        ContinuationToken {
            last_key: last_key.to_string(),
        }
    }

    pub(crate) fn last_key(&self) -> &str {
        &self.last_key
    }
}

/// One page of candidate records plus the cursor to fetch the next page.
/// A `None` token means the read is exhausted.
#[derive(Debug, Default)]
pub struct Page {
    records: Vec<Record>,
    token: Option<ContinuationToken>,
}

impl Page {
    pub fn new(records: Vec<Record>, token: Option<ContinuationToken>) -> Self {
        Page { records, token }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn token(&self) -> Option<&ContinuationToken> {
        self.token.as_ref()
    }

    pub fn into_parts(self) -> (Vec<Record>, Option<ContinuationToken>) {
        (self.records, self.token)
    }
}

/// Storage protocol every backend implements.
///
/// Implementers must be `Send + Sync`; a backend is shared across every
/// document store bound to it.
pub trait BackendProvider: Send + Sync {
    /// Opens or creates the underlying storage. Called once before any
    /// other operation.
    fn open_or_create(&self) -> DocketResult<()>;

    /// The label this backend was registered under, embedded in every
    /// identifier it mints records for.
    fn backend_id(&self) -> &str;

    fn kind(&self) -> BackendKind;

    /// Whether derived index keys preserve value casing.
    fn case_sensitive(&self) -> bool;

    /// Persists a record and brings every derived index structure in line
    /// within the same write: new values are indexed, `stale` values are
    /// retired. A failed put leaves no partial index state behind.
    fn put(
        &self,
        record: &Record,
        stale: &[StaleIndexEntry],
        model: &IndexModel,
    ) -> DocketResult<()>;

    /// Fetches one record by its full identifier.
    fn get(&self, id: &str) -> DocketResult<Option<Record>>;

    /// Removes a record and retires every derived index entry its values
    /// produced.
    fn delete(&self, record: &Record, model: &IndexModel) -> DocketResult<()>;

    /// Fetches one page of candidates for the plan's driving index.
    /// Residual filtering is the caller's concern.
    fn query(
        &self,
        plan: &QueryPlan,
        token: Option<&ContinuationToken>,
        model: &IndexModel,
    ) -> DocketResult<Page>;

    /// Fetches one page of every record in the backend, all types mixed.
    fn scan(&self, token: Option<&ContinuationToken>, page_size: usize) -> DocketResult<Page>;

    /// Adds the record's id to every index structure its values derive.
    /// No-op on backends with natively maintained indexes.
    fn add_index_entries(&self, record: &Record, model: &IndexModel) -> DocketResult<()>;

    /// Removes the record's id from every index structure its values
    /// derive. No-op on backends with natively maintained indexes.
    fn remove_index_entries(&self, record: &Record, model: &IndexModel) -> DocketResult<()>;

    /// Flushes pending writes. No-op for in-memory strategies.
    fn flush(&self) -> DocketResult<()>;
}

/// Handle to a registered storage backend.
///
/// Cheap to clone; all clones share the provider and its open state. Every
/// operation fails with a `ResourceError` until the backend has been
/// opened.
#[derive(Clone)]
pub struct Backend {
    provider: Arc<dyn BackendProvider>,
    opened: Atomic<bool>,
}

impl Backend {
    pub fn new(provider: Arc<dyn BackendProvider>) -> Self {
        Backend {
            provider,
            opened: atomic(false),
        }
    }

    pub fn open_or_create(&self) -> DocketResult<()> {
        self.provider.open_or_create()?;
        *self.opened.write() = true;
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        *self.opened.read()
    }

    fn check_opened(&self) -> DocketResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            log::error!("backend {} used before it was opened", self.backend_id());
            Err(DocketError::new(
                &format!("backend {} is not open", self.backend_id()),
                ErrorKind::ResourceError,
            ))
        }
    }

    pub fn backend_id(&self) -> &str {
        self.provider.backend_id()
    }

    pub fn kind(&self) -> BackendKind {
        self.provider.kind()
    }

    pub fn case_sensitive(&self) -> bool {
        self.provider.case_sensitive()
    }

    pub fn put(
        &self,
        record: &Record,
        stale: &[StaleIndexEntry],
        model: &IndexModel,
    ) -> DocketResult<()> {
        self.check_opened()?;
        self.provider.put(record, stale, model)
    }

    pub fn get(&self, id: &str) -> DocketResult<Option<Record>> {
        self.check_opened()?;
        self.provider.get(id)
    }

    pub fn delete(&self, record: &Record, model: &IndexModel) -> DocketResult<()> {
        self.check_opened()?;
        self.provider.delete(record, model)
    }

    pub fn query(
        &self,
        plan: &QueryPlan,
        token: Option<&ContinuationToken>,
        model: &IndexModel,
    ) -> DocketResult<Page> {
        self.check_opened()?;
        self.provider.query(plan, token, model)
    }

    pub fn scan(
        &self,
        token: Option<&ContinuationToken>,
        page_size: usize,
    ) -> DocketResult<Page> {
        self.check_opened()?;
        self.provider.scan(token, page_size)
    }

    pub fn add_index_entries(&self, record: &Record, model: &IndexModel) -> DocketResult<()> {
        self.check_opened()?;
        self.provider.add_index_entries(record, model)
    }

    pub fn remove_index_entries(&self, record: &Record, model: &IndexModel) -> DocketResult<()> {
        self.check_opened()?;
        self.provider.remove_index_entries(record, model)
    }

    pub fn flush(&self) -> DocketResult<()> {
        self.check_opened()?;
        self.provider.flush()
    }
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend")
            .field("backend_id", &self.backend_id())
            .field("kind", &self.kind())
            .field("open", &self.is_open())
            .finish()
    }
}

/// Pages an ordered candidate id list: ids strictly after the token, at
/// most `page_size` of them, plus the token for the next page.
pub(crate) fn page_ids(
    ids: &[String],
    token: Option<&ContinuationToken>,
    page_size: usize,
) -> (Vec<String>, Option<ContinuationToken>) {
    let start = match token {
        Some(t) => match ids.iter().position(|id| id.as_str() > t.last_key()) {
            Some(i) => i,
            None => return (Vec::new(), None),
        },
        None => 0,
    };
    let page: Vec<String> = ids[start..].iter().take(page_size).cloned().collect();
    let next = if start + page.len() < ids.len() {
        page.last().map(|id| ContinuationToken::new(id))
    } else {
        None
    };
    (page, next)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_page_ids_first_page() {
        let all = ids(&["a", "b", "c", "d"]);
        let (page, token) = page_ids(&all, None, 2);
        assert_eq!(page, ids(&["a", "b"]));
        assert_eq!(token.unwrap().last_key(), "b");
    }

    #[test]
    fn test_page_ids_resume_after_token() {
        let all = ids(&["a", "b", "c", "d"]);
        let token = ContinuationToken::new("b");
        let (page, next) = page_ids(&all, Some(&token), 2);
        assert_eq!(page, ids(&["c", "d"]));
        assert!(next.is_none());
    }

    #[test]
    fn test_page_ids_exhausted() {
        let all = ids(&["a", "b"]);
        let token = ContinuationToken::new("b");
        let (page, next) = page_ids(&all, Some(&token), 2);
        assert!(page.is_empty());
        assert!(next.is_none());
    }

    #[test]
    fn test_page_ids_exact_boundary_has_no_token() {
        let all = ids(&["a", "b"]);
        let (page, token) = page_ids(&all, None, 2);
        assert_eq!(page.len(), 2);
        assert!(token.is_none());
    }

    #[test]
    fn test_unopened_backend_is_a_resource_error() {
        let backend = Backend::new(Arc::new(KeyValueBackend::new("kv")));
        let err = backend.get("abc:id:kv:Student").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ResourceError);
        backend.open_or_create().unwrap();
        assert!(backend.get("abc:id:kv:Student").unwrap().is_none());
    }
}
