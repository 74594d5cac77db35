//! The index model: maps a document type's indexed properties to index
//! names and keys, and resolves which index answers a given filter.
//!
//! Index choice is positional, not cost-based: the first filter entry (in
//! caller-supplied order) whose property is global-indexed with an equality
//! condition wins. Callers control the plan by ordering their filter keys.
//! A filter that touches no indexed property falls back to a scan within
//! the type.

use std::fmt::{Display, Formatter};

use crate::common::{
    Value, DEFAULT_INDEX_SUFFIX, DOC_ID, DOC_TYPE, ID_SEGMENT, ID_SEPARATOR, INDEX_SEGMENT,
    MODEL_SET_SUFFIX, PK_ALIAS,
};
use crate::errors::{DocketError, DocketResult, ErrorKind};
use crate::filter::FilterSpec;
use crate::property::KeyType;
use crate::schema::DocumentType;

/// Which class of index to enumerate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexScope {
    /// Secondary indexes queryable independently of the primary key.
    Global,
    /// Indexes usable only alongside the primary key path.
    Local,
}

/// Describes one declared index of a document type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDescriptor {
    pub property: String,
    pub index_name: String,
    pub key_type: KeyType,
    pub global: bool,
}

/// The resolved driving index for one filter specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexChoice {
    /// The primary identifier path: equality on `_doc_type`, optionally
    /// narrowed to a single `_id`. This is the "scan within type" path.
    Primary {
        doc_type: String,
        id: Option<String>,
    },
    /// A global secondary index lookup on one property's value.
    Global {
        index_name: String,
        property: String,
        value: Value,
    },
}

impl Display for IndexChoice {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexChoice::Primary { doc_type, id: None } => {
                write!(f, "primary({})", doc_type)
            }
            IndexChoice::Primary {
                doc_type,
                id: Some(id),
            } => write!(f, "primary({}, {})", doc_type, id),
            IndexChoice::Global {
                index_name,
                property,
                value,
            } => write!(f, "{}[{} == {}]", index_name, property, value),
        }
    }
}

/// Index name and key resolution for one document type on one backend.
///
/// `case_sensitive` distinguishes the partitioned store (native range
/// semantics, values kept verbatim) from the set-index backends, which
/// lowercase derived keys.
#[derive(Clone)]
pub struct IndexModel {
    doc_type: DocumentType,
    backend_id: String,
    case_sensitive: bool,
}

impl IndexModel {
    pub fn new(doc_type: DocumentType, backend_id: &str, case_sensitive: bool) -> Self {
        IndexModel {
            doc_type,
            backend_id: backend_id.to_string(),
            case_sensitive,
        }
    }

    pub fn doc_type(&self) -> &DocumentType {
        &self.doc_type
    }

    pub fn backend_id(&self) -> &str {
        &self.backend_id
    }

    /// Property names indexed under the given scope.
    ///
    /// The global scope always includes the reserved `_doc_type`
    /// pseudo-index that backs the primary path.
    pub fn indexed_properties(&self, scope: IndexScope) -> Vec<String> {
        let mut names = match scope {
            IndexScope::Global => vec![DOC_TYPE.to_string()],
            IndexScope::Local => Vec::new(),
        };
        for (name, property) in self.doc_type.properties() {
            let selected = match scope {
                IndexScope::Global => property.is_global_index(),
                IndexScope::Local => property.is_index() && !property.is_global_index(),
            };
            if selected {
                names.push(name.to_string());
            }
        }
        names
    }

    /// Descriptors for the global secondary indexes of this type.
    pub fn descriptors(&self) -> Vec<IndexDescriptor> {
        self.doc_type
            .properties()
            .filter(|(_, p)| p.is_global_index())
            .map(|(name, property)| IndexDescriptor {
                property: name.to_string(),
                index_name: self.index_name_for(name),
                key_type: property.index_key_type(),
                global: true,
            })
            .collect()
    }

    /// Properties for which index structures must be maintained on write:
    /// local indexes, global indexes, and the implicit uniqueness indexes.
    pub fn maintained_properties(&self) -> Vec<String> {
        self.doc_type
            .properties()
            .filter(|(_, p)| p.is_index_eligible())
            .map(|(name, _)| name.to_string())
            .collect()
    }

    /// The index name for a property: the declared override or the
    /// `{property}-index` default.
    pub fn index_name_for(&self, property: &str) -> String {
        self.doc_type
            .property(property)
            .and_then(|p| p.declared_index_name())
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}{}", property, DEFAULT_INDEX_SUFFIX))
    }

    /// Builds the derived index key for one property value, in the manual
    /// index-set layout: `{backend}:{type}:indexes:{property}:{value}`.
    /// Lowercased end to end unless the backend is case-sensitive.
    pub fn index_key(&self, property: &str, value: &Value) -> String {
        let rendered = value.to_string();
        let rendered = if self.case_sensitive {
            rendered
        } else {
            rendered.to_lowercase()
        };
        format!(
            "{}:{}:{}:{}:{}",
            self.backend_id.to_lowercase(),
            self.doc_type.name().to_lowercase(),
            INDEX_SEGMENT,
            property.to_lowercase(),
            rendered
        )
    }

    /// The membership set holding every id of this type on the manual
    /// index-set backends.
    pub fn model_set_key(&self) -> String {
        format!(
            "{}{}{}",
            self.doc_type.name().to_lowercase(),
            ID_SEPARATOR,
            MODEL_SET_SUFFIX
        )
    }

    /// Expands a short identifier to the full persisted id string. Full ids
    /// pass through unchanged.
    pub fn expand_id(&self, pk: &str) -> String {
        if pk.contains(ID_SEPARATOR) {
            return pk.to_string();
        }
        format!(
            "{}{sep}{}{sep}{}{sep}{}",
            pk,
            ID_SEGMENT,
            self.backend_id,
            self.doc_type.name(),
            sep = ID_SEPARATOR
        )
    }

    /// Decides the driving index for a filter specification.
    ///
    /// `unique_probe` additionally admits unique-flagged properties'
    /// implicit indexes; it is used only by the uniqueness check and never
    /// by general queries.
    pub fn resolve_index_for_filter(
        &self,
        spec: &FilterSpec,
        unique_probe: bool,
    ) -> DocketResult<IndexChoice> {
        self.validate_properties(spec)?;

        if let Some(requested) = spec.requested_index() {
            return self.resolve_named_index(spec, requested);
        }

        let queryable = |name: &str| {
            self.doc_type
                .property(name)
                .map(|p| p.is_global_index() || (unique_probe && p.is_unique()))
                .unwrap_or(false)
        };

        // a filter touching no indexed property scans within the type;
        // every condition it carries becomes residual filtering
        if !spec.entries().iter().any(|e| queryable(e.property())) {
            return Ok(self.primary_choice(spec));
        }

        // first positional equality on a queryable property wins
        for entry in spec.entries() {
            if queryable(entry.property()) && entry.condition().is_equality() {
                return Ok(IndexChoice::Global {
                    index_name: self.index_name_for(entry.property()),
                    property: entry.property().to_string(),
                    value: entry.operand().clone(),
                });
            }
        }

        log::error!(
            "No equality condition on a global-indexed property in filter: {}",
            spec
        );
        Err(DocketError::new(
            "All index queries must use an equality condition on a global-indexed property",
            ErrorKind::QueryError,
        ))
    }

    fn resolve_named_index(&self, spec: &FilterSpec, requested: &str) -> DocketResult<IndexChoice> {
        let property = self
            .doc_type
            .properties()
            .filter(|(_, p)| p.is_global_index())
            .find(|(name, _)| self.index_name_for(name) == requested)
            .map(|(name, _)| name.to_string());
        let property = match property {
            Some(p) => p,
            None => {
                log::error!(
                    "Index {} is not declared for document type {}",
                    requested,
                    self.doc_type.name()
                );
                return Err(DocketError::new(
                    &format!(
                        "index {} is not declared for document type {}",
                        requested,
                        self.doc_type.name()
                    ),
                    ErrorKind::QueryError,
                ));
            }
        };
        let entry = spec.entry_for(&property).ok_or_else(|| {
            DocketError::new(
                &format!("filter has no condition on {} for index {}", property, requested),
                ErrorKind::QueryError,
            )
        })?;
        if !entry.condition().is_equality() {
            return Err(DocketError::new(
                &format!("index {} requires an equality condition on {}", requested, property),
                ErrorKind::QueryError,
            ));
        }
        Ok(IndexChoice::Global {
            index_name: requested.to_string(),
            property,
            value: entry.operand().clone(),
        })
    }

    fn primary_choice(&self, spec: &FilterSpec) -> IndexChoice {
        let doc_type = spec
            .entry_for(DOC_TYPE)
            .and_then(|e| e.operand().as_str().map(str::to_string))
            .unwrap_or_else(|| self.doc_type.name().to_string());
        let id = spec
            .entry_for(DOC_ID)
            .and_then(|e| e.operand().as_str().map(str::to_string))
            .or_else(|| {
                spec.entry_for(PK_ALIAS)
                    .and_then(|e| e.operand().as_str())
                    .map(|pk| self.expand_id(pk))
            });
        IndexChoice::Primary { doc_type, id }
    }

    fn validate_properties(&self, spec: &FilterSpec) -> DocketResult<()> {
        for entry in spec.entries() {
            let name = entry.property();
            let reserved = name == DOC_TYPE || name == DOC_ID || name == PK_ALIAS;
            if !reserved && !self.doc_type.has_property(name) {
                log::error!(
                    "Filter references undeclared property {} on {}",
                    name,
                    self.doc_type.name()
                );
                return Err(DocketError::new(
                    &format!(
                        "property {} is not declared for document type {}",
                        name,
                        self.doc_type.name()
                    ),
                    ErrorKind::QueryError,
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::Property;

    fn model(case_sensitive: bool) -> IndexModel {
        let doc_type = DocumentType::builder("Student")
            .property("name", Property::char().required().unique())
            .property("city", Property::char().global_index())
            .property("email", Property::email().global_index().index_name("mail-index"))
            .property("gpa", Property::float().indexed())
            .build()
            .unwrap();
        IndexModel::new(doc_type, "keyvalue", case_sensitive)
    }

    #[test]
    fn test_indexed_properties_global_includes_doc_type() {
        let model = model(false);
        assert_eq!(
            model.indexed_properties(IndexScope::Global),
            vec!["_doc_type", "city", "email"]
        );
        assert_eq!(model.indexed_properties(IndexScope::Local), vec!["gpa"]);
    }

    #[test]
    fn test_maintained_properties_include_unique() {
        let model = model(false);
        assert_eq!(model.maintained_properties(), vec!["name", "city", "email", "gpa"]);
    }

    #[test]
    fn test_index_name_default_and_override() {
        let model = model(false);
        assert_eq!(model.index_name_for("city"), "city-index");
        assert_eq!(model.index_name_for("email"), "mail-index");
    }

    #[test]
    fn test_index_key_lowercases_for_set_backends() {
        let model = model(false);
        assert_eq!(
            model.index_key("city", &Value::from("Durham")),
            "keyvalue:student:indexes:city:durham"
        );
    }

    #[test]
    fn test_index_key_case_sensitive_backend() {
        let model = model(true);
        assert_eq!(
            model.index_key("city", &Value::from("Durham")),
            "keyvalue:student:indexes:city:Durham"
        );
    }

    #[test]
    fn test_resolve_picks_first_global_equality() {
        let model = model(false);
        let spec = FilterSpec::new().gt("gpa", 2.0).eq("city", "Durham");
        match model.resolve_index_for_filter(&spec, false).unwrap() {
            IndexChoice::Global { index_name, property, .. } => {
                assert_eq!(index_name, "city-index");
                assert_eq!(property, "city");
            }
            other => panic!("unexpected choice {:?}", other),
        }
    }

    #[test]
    fn test_resolve_positional_tie_break() {
        let model = model(false);
        let spec = FilterSpec::new().eq("email", "a@b.co").eq("city", "Durham");
        match model.resolve_index_for_filter(&spec, false).unwrap() {
            IndexChoice::Global { index_name, .. } => assert_eq!(index_name, "mail-index"),
            other => panic!("unexpected choice {:?}", other),
        }
    }

    #[test]
    fn test_resolve_falls_back_to_primary() {
        let model = model(false);
        let spec = FilterSpec::new().eq("_doc_type", "Student").gt("gpa", 2.0);
        match model.resolve_index_for_filter(&spec, false).unwrap() {
            IndexChoice::Primary { doc_type, id } => {
                assert_eq!(doc_type, "Student");
                assert!(id.is_none());
            }
            other => panic!("unexpected choice {:?}", other),
        }
    }

    #[test]
    fn test_resolve_primary_narrows_by_pk() {
        let model = model(false);
        let spec = FilterSpec::new().eq("_doc_type", "Student").eq("pk", "abc123");
        match model.resolve_index_for_filter(&spec, false).unwrap() {
            IndexChoice::Primary { id, .. } => {
                assert_eq!(id.unwrap(), "abc123:id:keyvalue:Student");
            }
            other => panic!("unexpected choice {:?}", other),
        }
    }

    #[test]
    fn test_resolve_global_without_equality_fails() {
        let model = model(false);
        let spec = FilterSpec::new().begins("city", "Dur");
        assert!(model.resolve_index_for_filter(&spec, false).is_err());
    }

    #[test]
    fn test_resolve_undeclared_property_fails() {
        let model = model(false);
        let spec = FilterSpec::new().eq("nickname", "Bo");
        assert!(model.resolve_index_for_filter(&spec, false).is_err());
    }

    #[test]
    fn test_unique_probe_admits_unique_property() {
        let model = model(false);
        let spec = FilterSpec::new().eq("name", "Brian");
        // without the probe the implicit uniqueness index is invisible and
        // the filter degrades to a type scan
        match model.resolve_index_for_filter(&spec, false).unwrap() {
            IndexChoice::Primary { id, .. } => assert!(id.is_none()),
            other => panic!("unexpected choice {:?}", other),
        }
        match model.resolve_index_for_filter(&spec, true).unwrap() {
            IndexChoice::Global { index_name, .. } => assert_eq!(index_name, "name-index"),
            other => panic!("unexpected choice {:?}", other),
        }
    }

    #[test]
    fn test_residual_only_filter_scans_within_type() {
        let model = model(false);
        let spec = FilterSpec::new().gt("gpa", 2.0);
        match model.resolve_index_for_filter(&spec, false).unwrap() {
            IndexChoice::Primary { doc_type, id } => {
                assert_eq!(doc_type, "Student");
                assert!(id.is_none());
            }
            other => panic!("unexpected choice {:?}", other),
        }
    }

    #[test]
    fn test_named_index_must_be_declared() {
        let model = model(false);
        let spec = FilterSpec::new().eq("city", "Durham").use_index("no-such-index");
        assert!(model.resolve_index_for_filter(&spec, false).is_err());
    }

    #[test]
    fn test_named_index_resolution() {
        let model = model(false);
        let spec = FilterSpec::new().eq("email", "a@b.co").use_index("mail-index");
        match model.resolve_index_for_filter(&spec, false).unwrap() {
            IndexChoice::Global { property, .. } => assert_eq!(property, "email"),
            other => panic!("unexpected choice {:?}", other),
        }
    }

    #[test]
    fn test_expand_id() {
        let model = model(false);
        assert_eq!(model.expand_id("abc"), "abc:id:keyvalue:Student");
        assert_eq!(
            model.expand_id("abc:id:keyvalue:Student"),
            "abc:id:keyvalue:Student"
        );
    }
}
