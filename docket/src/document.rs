//! The document entity: a typed bag of attribute values bound to a
//! [DocumentType], carrying everything a save needs to keep derived index
//! structures consistent.

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::common::{
    current_time_string, Record, Value, DOC_ID, DOC_TYPE, ID_HASH_LEN, ID_SEGMENT, ID_SEPARATOR,
    MINT_DATE_ATTR, MINT_UUID_ATTR, PK_ALIAS,
};
use crate::errors::{DocketError, DocketResult, ErrorKind};
use crate::schema::DocumentType;
use indexmap::IndexMap;

/// Records the previous value of an index-maintained property that was
/// overwritten since the last save. Backends use these to remove the
/// document's id from the index entries its old values derived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaleIndexEntry {
    property: String,
    old_value: Value,
}

impl StaleIndexEntry {
    pub fn property(&self) -> &str {
        &self.property
    }

    pub fn old_value(&self) -> &Value {
        &self.old_value
    }
}

/// Checks a candidate value for a unique-flagged property before a write.
///
/// Implemented by the store; a document prepared for write probes through
/// this seam so the entity stays backend-agnostic.
pub trait UniquenessCheck {
    /// Fails with a `ValidationError` when another document of the same type
    /// already holds `value` for `property`. `current_id` is the id of the
    /// document being written, so a re-save of the holder passes.
    fn check_unique(&self, property: &str, value: &Value, current_id: Option<&str>)
        -> DocketResult<()>;
}

/// A single document instance of a declared [DocumentType].
///
/// Attribute writes go through [Document::set], which enforces the schema
/// and tracks stale index values. The document holds raw values; validation
/// and coercion run when the document is prepared for a write.
#[derive(Clone)]
pub struct Document {
    doc_type: DocumentType,
    data: IndexMap<String, Value>,
    id: Option<String>,
    stale_entries: Vec<StaleIndexEntry>,
}

impl Document {
    pub fn new(doc_type: DocumentType) -> Self {
        Document {
            doc_type,
            data: IndexMap::new(),
            id: None,
            stale_entries: Vec::new(),
        }
    }

    /// Rebuilds a document from a persisted record, coercing each stored
    /// attribute back to its native form.
    pub fn from_record(doc_type: DocumentType, record: &Record) -> DocketResult<Document> {
        let mut data = IndexMap::new();
        for (name, property) in doc_type.properties() {
            if let Some(stored) = record.get(name) {
                if !stored.is_empty() {
                    data.insert(name.to_string(), property.to_native(Some(stored))?);
                }
            }
        }
        if let Some(tag) = record.get(DOC_TYPE) {
            if !tag.is_empty() {
                data.insert(DOC_TYPE.to_string(), tag.clone());
            }
        }
        let id = record
            .get(DOC_ID)
            .and_then(|v| v.as_str())
            .map(str::to_string);
        Ok(Document {
            doc_type,
            data,
            id,
            stale_entries: Vec::new(),
        })
    }

    pub fn doc_type(&self) -> &DocumentType {
        &self.doc_type
    }

    /// The full persisted identifier, once the document has been saved or
    /// hydrated.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// The content-hash segment of the identifier.
    pub fn short_id(&self) -> Option<&str> {
        self.id
            .as_deref()
            .and_then(|id| id.split(ID_SEPARATOR).next())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.data.get(name)
    }

    /// Sets an attribute value.
    ///
    /// Fails with a `ValidationError` when the name is not declared on the
    /// document type. Overwriting an index-maintained property records the
    /// old value so the next save can retire its derived index entries.
    /// The reserved `_doc_type` tag may be set without a declaration; it
    /// overrides the type name stamped at save time.
    pub fn set<T: Into<Value>>(&mut self, name: &str, value: T) -> DocketResult<()> {
        if name == DOC_TYPE {
            return self.set_type_tag(value.into());
        }
        let property = self.doc_type.property(name).ok_or_else(|| {
            log::error!(
                "{} is not a declared property of {}",
                name,
                self.doc_type.name()
            );
            DocketError::new(
                &format!(
                    "{} is not a declared property of {}",
                    name,
                    self.doc_type.name()
                ),
                ErrorKind::ValidationError,
            )
        })?;
        let value = value.into();
        if property.is_index_eligible() {
            if let Some(old) = self.data.get(name) {
                if old != &value && !old.is_empty() {
                    self.stale_entries.push(StaleIndexEntry {
                        property: name.to_string(),
                        old_value: old.clone(),
                    });
                }
            }
        }
        if value.is_empty() {
            self.data.shift_remove(name);
        } else {
            self.data.insert(name.to_string(), value);
        }
        Ok(())
    }

    /// Overrides the type tag written at save time. Clearing it restores
    /// the declared type name.
    fn set_type_tag(&mut self, value: Value) -> DocketResult<()> {
        if value.is_empty() {
            self.data.shift_remove(DOC_TYPE);
            return Ok(());
        }
        if !matches!(value, Value::String(_)) {
            return Err(DocketError::new(
                &format!("{} must be a string", DOC_TYPE),
                ErrorKind::ValidationError,
            ));
        }
        self.data.insert(DOC_TYPE.to_string(), value);
        Ok(())
    }

    pub fn stale_entries(&self) -> &[StaleIndexEntry] {
        &self.stale_entries
    }

    /// Drains the accumulated stale index values. Called once the write that
    /// retires them has been handed to the backend.
    pub fn take_stale_entries(&mut self) -> Vec<StaleIndexEntry> {
        std::mem::take(&mut self.stale_entries)
    }

    /// Validates, coerces, and serializes this document into a write-ready
    /// record, minting an identifier on first write.
    ///
    /// Properties are processed in declaration order: automatic timestamps
    /// are stamped, the raw value is validated and coerced to native form,
    /// unique-flagged values are probed through `check`, and the storage
    /// form is emitted. Empty values are omitted entirely (sparse records).
    pub fn prepare_for_write(
        &mut self,
        backend_id: &str,
        check: &dyn UniquenessCheck,
    ) -> DocketResult<Record> {
        let first_write = self.id.is_none();
        let mut record = Record::new();
        for (name, property) in self.doc_type.properties() {
            if let Some(stamp) = property.auto_stamp(first_write) {
                if property.is_index_eligible() {
                    if let Some(old) = self.data.get(name) {
                        if old != &stamp && !old.is_empty() {
                            self.stale_entries.push(StaleIndexEntry {
                                property: name.to_string(),
                                old_value: old.clone(),
                            });
                        }
                    }
                }
                self.data.insert(name.to_string(), stamp);
            }
            let raw = self.data.get(name);
            property.validate(raw, name)?;
            let native = property.to_native(raw)?;
            if native.is_empty() {
                continue;
            }
            let stored = property.to_storage(&native);
            if property.is_unique() {
                check.check_unique(name, &stored, self.id.as_deref())?;
            }
            record.insert(name.to_string(), stored);
        }
        let type_tag = match self.data.get(DOC_TYPE) {
            Some(tag) => tag.clone(),
            None => Value::String(self.doc_type.name().to_string()),
        };
        record.insert(DOC_TYPE.to_string(), type_tag);
        let id = match &self.id {
            Some(id) => id.clone(),
            None => {
                let id = self.mint_identifier(&record, backend_id)?;
                self.id = Some(id.clone());
                id
            }
        };
        record.insert(DOC_ID.to_string(), Value::String(id));
        Ok(record)
    }

    /// Mints the identifier for a first write: a 10-hex-digit digest of the
    /// record content salted with the wall clock and a random UUID, joined
    /// with the backend id and type name. Identical content never collides
    /// because of the salt.
    fn mint_identifier(&self, record: &Record, backend_id: &str) -> DocketResult<String> {
        let mut seeded = record.clone();
        seeded.insert(
            MINT_DATE_ATTR.to_string(),
            Value::String(current_time_string()),
        );
        seeded.insert(
            MINT_UUID_ATTR.to_string(),
            Value::String(Uuid::new_v4().to_string()),
        );
        let payload = serde_json::to_string(&seeded)?;
        let digest = format!("{:x}", Sha256::digest(payload.as_bytes()));
        Ok(format!(
            "{}{sep}{}{sep}{}{sep}{}",
            &digest[..ID_HASH_LEN],
            ID_SEGMENT,
            backend_id,
            self.doc_type.name(),
            sep = ID_SEPARATOR
        ))
    }

    /// The attribute names a caller may address, reserved aliases included.
    pub fn addressable_attrs(&self) -> Vec<String> {
        let mut attrs: Vec<String> = self
            .doc_type
            .properties()
            .map(|(n, _)| n.to_string())
            .collect();
        attrs.push(DOC_ID.to_string());
        attrs.push(DOC_TYPE.to_string());
        attrs.push(PK_ALIAS.to_string());
        attrs
    }
}

impl std::fmt::Display for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "<{}: {}>",
            self.doc_type.name(),
            self.short_id().unwrap_or("unsaved")
        )
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("doc_type", &self.doc_type.name())
            .field("id", &self.id)
            .field("data", &self.data)
            .finish()
    }
}
