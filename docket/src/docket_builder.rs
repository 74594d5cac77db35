use std::sync::Arc;

use crate::backend::{Backend, BackendProvider};
use crate::docket::Docket;
use crate::docket_config::DocketConfig;
use crate::errors::{DocketError, DocketResult, ErrorKind};

/// Builder for a [Docket] instance.
///
/// Configuration errors are captured and reported by `open_or_create()`,
/// so registration calls chain without intermediate results.
///
/// ```rust,ignore
/// let docket = Docket::builder()
///     .with_backend(Arc::new(KeyValueBackend::new("kv")))
///     .default_backend("kv")
///     .page_size(50)
///     .open_or_create()?;
/// ```
#[derive(Default)]
pub struct DocketBuilder {
    error: Option<DocketError>,
    backends: Vec<Backend>,
    default_backend: Option<String>,
    page_size: Option<usize>,
}

impl DocketBuilder {
    pub fn new() -> Self {
        DocketBuilder::default()
    }

    /// Registers a storage backend. Backend ids must be unique.
    pub fn with_backend(mut self, provider: Arc<dyn BackendProvider>) -> Self {
        if self.error.is_some() {
            return self;
        }
        let backend = Backend::new(provider);
        if self
            .backends
            .iter()
            .any(|b| b.backend_id() == backend.backend_id())
        {
            self.error = Some(DocketError::new(
                &format!("backend {} is registered twice", backend.backend_id()),
                ErrorKind::InvalidOperation,
            ));
            return self;
        }
        self.backends.push(backend);
        self
    }

    /// Names the backend new document types bind to when none is given.
    /// Defaults to the first registered backend.
    pub fn default_backend(mut self, backend_id: &str) -> Self {
        self.default_backend = Some(backend_id.to_string());
        self
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Opens every registered backend and returns the database handle.
    pub fn open_or_create(self) -> DocketResult<Docket> {
        if let Some(error) = self.error {
            return Err(error);
        }
        if self.backends.is_empty() {
            return Err(DocketError::new(
                "at least one backend must be registered",
                ErrorKind::InvalidOperation,
            ));
        }
        let default_backend = match self.default_backend {
            Some(id) => {
                if !self.backends.iter().any(|b| b.backend_id() == id) {
                    return Err(DocketError::new(
                        &format!("default backend {} is not registered", id),
                        ErrorKind::InvalidOperation,
                    ));
                }
                id
            }
            None => self.backends[0].backend_id().to_string(),
        };
        for backend in &self.backends {
            backend.open_or_create()?;
        }
        let config = match self.page_size {
            Some(page_size) => DocketConfig::with_page_size(page_size),
            None => DocketConfig::new(),
        };
        log::debug!(
            "opened docket with {} backends, default {}",
            self.backends.len(),
            default_backend
        );
        Ok(Docket::new(config, self.backends, default_backend))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{KeyValueBackend, PartitionedBackend};

    #[test]
    fn test_no_backend_is_an_error() {
        let result = DocketBuilder::new().open_or_create();
        assert_eq!(result.unwrap_err().kind(), &ErrorKind::InvalidOperation);
    }

    #[test]
    fn test_first_backend_is_the_default() {
        let docket = DocketBuilder::new()
            .with_backend(Arc::new(KeyValueBackend::new("kv")))
            .with_backend(Arc::new(PartitionedBackend::new("dyn")))
            .open_or_create()
            .unwrap();
        let doc_type = crate::schema::DocumentType::builder("T")
            .property("name", crate::property::Property::char())
            .build()
            .unwrap();
        assert_eq!(docket.register_type(doc_type).unwrap().backend_id(), "kv");
    }

    #[test]
    fn test_explicit_default_backend() {
        let docket = DocketBuilder::new()
            .with_backend(Arc::new(KeyValueBackend::new("kv")))
            .with_backend(Arc::new(PartitionedBackend::new("dyn")))
            .default_backend("dyn")
            .open_or_create()
            .unwrap();
        let doc_type = crate::schema::DocumentType::builder("T")
            .property("name", crate::property::Property::char())
            .build()
            .unwrap();
        assert_eq!(docket.register_type(doc_type).unwrap().backend_id(), "dyn");
    }

    #[test]
    fn test_unknown_default_backend_rejected() {
        let result = DocketBuilder::new()
            .with_backend(Arc::new(KeyValueBackend::new("kv")))
            .default_backend("ghost")
            .open_or_create();
        assert!(result.is_err());
    }

    #[test]
    fn test_duplicate_backend_id_rejected() {
        let result = DocketBuilder::new()
            .with_backend(Arc::new(KeyValueBackend::new("kv")))
            .with_backend(Arc::new(KeyValueBackend::new("kv")))
            .open_or_create();
        assert!(result.is_err());
    }

    #[test]
    fn test_backends_are_open_after_build() {
        let docket = DocketBuilder::new()
            .with_backend(Arc::new(KeyValueBackend::new("kv")))
            .open_or_create()
            .unwrap();
        assert!(docket.backend("kv").unwrap().is_open());
    }
}
