//! Document type declarations.
//!
//! A [DocumentType] is a named, immutable schema: an ordered mapping of
//! property names to [Property] descriptors, declared once at startup via
//! [DocumentTypeBuilder]. Property lookups resolve against this descriptor;
//! there is no runtime attribute interception.

use indexmap::IndexMap;
use std::sync::Arc;

use crate::common::RESERVED_ATTRS;
use crate::errors::{DocketError, DocketResult, ErrorKind};
use crate::property::Property;

/// A named schema for a class of documents.
///
/// Immutable after construction. Clones share the same underlying
/// declaration through `Arc`.
#[derive(Clone)]
pub struct DocumentType {
    inner: Arc<DocumentTypeInner>,
}

struct DocumentTypeInner {
    name: String,
    properties: IndexMap<String, Property>,
}

impl DocumentType {
    /// Starts declaring a new document type with the given name.
    pub fn builder(name: &str) -> DocumentTypeBuilder {
        DocumentTypeBuilder {
            name: name.to_string(),
            properties: IndexMap::new(),
            error: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Properties in declaration order. The order governs which validation
    /// error surfaces first when multiple fields are invalid.
    pub fn properties(&self) -> impl Iterator<Item = (&str, &Property)> {
        self.inner
            .properties
            .iter()
            .map(|(k, v)| (k.as_str(), v))
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.inner.properties.get(name)
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.inner.properties.contains_key(name)
    }

    /// Names of properties flagged `unique`, in declaration order.
    pub fn unique_properties(&self) -> Vec<String> {
        self.inner
            .properties
            .iter()
            .filter(|(_, p)| p.is_unique())
            .map(|(k, _)| k.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.properties.is_empty()
    }
}

impl std::fmt::Debug for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentType")
            .field("name", &self.inner.name)
            .field("properties", &self.inner.properties.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Builder for [DocumentType].
///
/// Declaration errors (reserved names, duplicate index names) are deferred
/// and reported by `build()`, so declarations chain without intermediate
/// results.
pub struct DocumentTypeBuilder {
    name: String,
    properties: IndexMap<String, Property>,
    error: Option<DocketError>,
}

impl DocumentTypeBuilder {
    /// Declares a property. Names must be unique within the type and must
    /// not collide with the reserved `_id`/`_doc_type` attributes.
    pub fn property(mut self, name: &str, property: Property) -> Self {
        if self.error.is_some() {
            return self;
        }
        if RESERVED_ATTRS.contains(&name) {
            self.error = Some(DocketError::new(
                &format!("{} is a reserved attribute name", name),
                ErrorKind::ValidationError,
            ));
            return self;
        }
        if self.properties.contains_key(name) {
            self.error = Some(DocketError::new(
                &format!("property {} is declared twice", name),
                ErrorKind::ValidationError,
            ));
            return self;
        }
        self.properties.insert(name.to_string(), property);
        self
    }

    pub fn build(self) -> DocketResult<DocumentType> {
        if let Some(error) = self.error {
            return Err(error);
        }
        // an explicit index name may cover at most one property
        let mut seen = std::collections::HashSet::new();
        for (name, property) in &self.properties {
            if let Some(index_name) = property.declared_index_name() {
                if !seen.insert(index_name.to_string()) {
                    log::error!(
                        "Index name {} declared for more than one property ({})",
                        index_name,
                        name
                    );
                    return Err(DocketError::new(
                        &format!("index name {} is declared for more than one property", index_name),
                        ErrorKind::ValidationError,
                    ));
                }
            }
        }
        Ok(DocumentType {
            inner: Arc::new(DocumentTypeInner {
                name: self.name,
                properties: self.properties,
            }),
        })
    }
}
