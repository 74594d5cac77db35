//! The per-type document store: the surface every read and write of one
//! document type goes through.

use std::sync::Arc;

use crate::backend::Backend;
use crate::common::Value;
use crate::docket_config::DocketConfig;
use crate::document::{Document, UniquenessCheck};
use crate::errors::{DocketError, DocketResult, ErrorKind};
use crate::filter::FilterSpec;
use crate::index::IndexModel;
use crate::query::executor::execute_plan;
use crate::query::{QueryOptions, QueryPlan, QuerySet};
use crate::schema::DocumentType;

/// Binds one [DocumentType] to one storage backend.
///
/// All persistence for the type flows through this handle: creating
/// documents, saving them with index maintenance and uniqueness
/// enforcement, deleting, fetching by identifier, and querying. Cheap to
/// clone; clones share the binding.
#[derive(Clone)]
pub struct DocumentStore {
    inner: Arc<DocumentStoreInner>,
}

struct DocumentStoreInner {
    doc_type: DocumentType,
    backend: Backend,
    model: IndexModel,
    config: DocketConfig,
}

impl DocumentStore {
    pub(crate) fn new(doc_type: DocumentType, backend: Backend, config: DocketConfig) -> Self {
        let model = IndexModel::new(
            doc_type.clone(),
            backend.backend_id(),
            backend.case_sensitive(),
        );
        DocumentStore {
            inner: Arc::new(DocumentStoreInner {
                doc_type,
                backend,
                model,
                config,
            }),
        }
    }

    pub fn doc_type(&self) -> &DocumentType {
        &self.inner.doc_type
    }

    pub fn backend_id(&self) -> &str {
        self.inner.backend.backend_id()
    }

    pub(crate) fn index_model(&self) -> &IndexModel {
        &self.inner.model
    }

    /// Creates an empty, unsaved document of this store's type.
    pub fn new_document(&self) -> Document {
        Document::new(self.inner.doc_type.clone())
    }

    /// Validates and persists a document.
    ///
    /// First writes mint the identifier. The backend receives the record
    /// together with the stale index values the save retires, so derived
    /// index structures stay consistent within the write. A validation or
    /// uniqueness failure leaves nothing persisted.
    pub fn save(&self, document: &mut Document) -> DocketResult<()> {
        self.check_type(document)?;
        let record = document.prepare_for_write(self.backend_id(), self)?;
        self.inner.backend.put(&record, document.stale_entries(), &self.inner.model)?;
        // the change list survives a failed put so a retried save still
        // retires the old index memberships
        document.take_stale_entries();
        log::debug!("saved {}", document);
        Ok(())
    }

    /// Saves a batch of documents, stopping at the first failure. Returns
    /// how many were saved.
    pub fn bulk_save(&self, documents: &mut [Document]) -> DocketResult<usize> {
        let mut saved = 0;
        for document in documents.iter_mut() {
            self.save(document)?;
            saved += 1;
        }
        Ok(saved)
    }

    /// Deletes a saved document and retires its index entries.
    pub fn delete(&self, document: &Document) -> DocketResult<()> {
        self.check_type(document)?;
        let id = document.id().ok_or_else(|| {
            DocketError::new(
                "cannot delete an unsaved document",
                ErrorKind::InvalidOperation,
            )
        })?;
        // the stored record is what the index entries were derived from
        let record = self.inner.backend.get(id)?.ok_or_else(|| {
            DocketError::new(&format!("{} does not exist", id), ErrorKind::NotFound)
        })?;
        self.inner.backend.delete(&record, &self.inner.model)?;
        log::debug!("deleted {}", document);
        Ok(())
    }

    /// Fetches one document by identifier. Accepts the short content-hash
    /// form or the full identifier.
    pub fn get(&self, pk: &str) -> DocketResult<Document> {
        let id = self.inner.model.expand_id(pk);
        let record = self.inner.backend.get(&id)?.ok_or_else(|| {
            DocketError::new(&format!("{} does not exist", id), ErrorKind::NotFound)
        })?;
        Document::from_record(self.inner.doc_type.clone(), &record)
    }

    /// Queries this type with default options.
    pub fn filter(&self, spec: FilterSpec) -> DocketResult<QuerySet> {
        self.filter_with(spec, self.default_options())
    }

    /// Queries this type with explicit paging and ordering options.
    pub fn filter_with(&self, spec: FilterSpec, options: QueryOptions) -> DocketResult<QuerySet> {
        let plan = QueryPlan::build(&self.inner.model, &spec, options)?;
        Ok(QuerySet::new(
            self.inner.backend.clone(),
            self.inner.model.clone(),
            plan,
        ))
    }

    /// Every document of this type, in identifier order.
    pub fn all(&self) -> DocketResult<QuerySet> {
        self.all_with(self.default_options())
    }

    pub fn all_with(&self, options: QueryOptions) -> DocketResult<QuerySet> {
        let spec = FilterSpec::new().eq(crate::common::DOC_TYPE, self.inner.doc_type.name());
        self.filter_with(spec, options)
    }

    pub fn flush(&self) -> DocketResult<()> {
        self.inner.backend.flush()
    }

    fn default_options(&self) -> QueryOptions {
        QueryOptions::new().page_size(self.inner.config.page_size())
    }

    fn check_type(&self, document: &Document) -> DocketResult<()> {
        if document.doc_type().name() != self.inner.doc_type.name() {
            log::error!(
                "document of type {} handed to the {} store",
                document.doc_type().name(),
                self.inner.doc_type.name()
            );
            return Err(DocketError::new(
                &format!(
                    "document of type {} does not belong to the {} store",
                    document.doc_type().name(),
                    self.inner.doc_type.name()
                ),
                ErrorKind::InvalidOperation,
            ));
        }
        Ok(())
    }
}

impl UniquenessCheck for DocumentStore {
    /// Read-then-decide: the candidate value is looked up through the
    /// property's implicit index before the write proceeds. Zero holders
    /// pass, one holder passes only when it is the document being written.
    fn check_unique(
        &self,
        property: &str,
        value: &Value,
        current_id: Option<&str>,
    ) -> DocketResult<()> {
        let spec = FilterSpec::new().eq(property, value.clone());
        let plan = QueryPlan::build_probe(&self.inner.model, &spec, self.default_options())?;
        let holders = execute_plan(&self.inner.backend, &self.inner.model, &plan)?;
        let taken = match holders.len() {
            0 => false,
            1 => holders[0].id() != current_id,
            _ => true,
        };
        if taken {
            return Err(DocketError::new(
                &format!(
                    "There is already a {} with the value of {}",
                    property, value
                ),
                ErrorKind::ValidationError,
            ));
        }
        Ok(())
    }
}

impl std::fmt::Debug for DocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentStore")
            .field("doc_type", &self.inner.doc_type.name())
            .field("backend", &self.backend_id())
            .finish()
    }
}
