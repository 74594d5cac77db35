//! The top-level database handle.

use std::sync::Arc;

use dashmap::DashMap;

use crate::backend::Backend;
use crate::docket_builder::DocketBuilder;
use crate::docket_config::DocketConfig;
use crate::errors::{DocketError, DocketResult, ErrorKind};
use crate::schema::DocumentType;
use crate::store::DocumentStore;

/// A running Docket instance: registered backends plus the document stores
/// bound to them.
///
/// Built once through [Docket::builder]. Cheap to clone; all clones share
/// the registries through `Arc`.
#[derive(Clone)]
pub struct Docket {
    inner: Arc<DocketInner>,
}

struct DocketInner {
    config: DocketConfig,
    backends: DashMap<String, Backend>,
    stores: DashMap<String, DocumentStore>,
    default_backend: String,
}

impl Docket {
    pub fn builder() -> DocketBuilder {
        DocketBuilder::new()
    }

    pub(crate) fn new(
        config: DocketConfig,
        backends: Vec<Backend>,
        default_backend: String,
    ) -> Self {
        let registry = DashMap::new();
        for backend in backends {
            registry.insert(backend.backend_id().to_string(), backend);
        }
        Docket {
            inner: Arc::new(DocketInner {
                config,
                backends: registry,
                stores: DashMap::new(),
                default_backend,
            }),
        }
    }

    pub fn config(&self) -> &DocketConfig {
        &self.inner.config
    }

    pub fn backend(&self, backend_id: &str) -> DocketResult<Backend> {
        self.inner
            .backends
            .get(backend_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| {
                log::error!("no backend registered under {}", backend_id);
                DocketError::new(
                    &format!("no backend registered under {}", backend_id),
                    ErrorKind::ResourceError,
                )
            })
    }

    /// Registers a document type on the default backend and returns its
    /// store.
    pub fn register_type(&self, doc_type: DocumentType) -> DocketResult<DocumentStore> {
        let default = self.inner.default_backend.clone();
        self.register_type_on(doc_type, &default)
    }

    /// Registers a document type on a specific backend and returns its
    /// store. A type name may be registered only once.
    pub fn register_type_on(
        &self,
        doc_type: DocumentType,
        backend_id: &str,
    ) -> DocketResult<DocumentStore> {
        if self.inner.stores.contains_key(doc_type.name()) {
            return Err(DocketError::new(
                &format!("document type {} is already registered", doc_type.name()),
                ErrorKind::InvalidOperation,
            ));
        }
        let backend = self.backend(backend_id)?;
        let store = DocumentStore::new(doc_type.clone(), backend, self.inner.config.clone());
        self.inner
            .stores
            .insert(doc_type.name().to_string(), store.clone());
        log::debug!("registered type {} on backend {}", doc_type.name(), backend_id);
        Ok(store)
    }

    /// The store of a registered document type.
    pub fn store(&self, type_name: &str) -> DocketResult<DocumentStore> {
        self.inner
            .stores
            .get(type_name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| {
                DocketError::new(
                    &format!("document type {} is not registered", type_name),
                    ErrorKind::NotFound,
                )
            })
    }

    /// Flushes every registered backend.
    pub fn flush_all(&self) -> DocketResult<()> {
        for entry in self.inner.backends.iter() {
            entry.value().flush()?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Docket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let backends: Vec<String> = self
            .inner
            .backends
            .iter()
            .map(|e| e.key().clone())
            .collect();
        let stores: Vec<String> = self.inner.stores.iter().map(|e| e.key().clone()).collect();
        f.debug_struct("Docket")
            .field("backends", &backends)
            .field("stores", &stores)
            .field("default_backend", &self.inner.default_backend)
            .finish()
    }
}
