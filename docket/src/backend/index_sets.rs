//! Manually maintained index sets, shared by the backends whose native
//! store has no secondary indexes of its own.
//!
//! Each derived index key maps to the ordered set of document ids whose
//! indexed value produced that key. The membership set under the model set
//! key holds every id of a document type.

use std::collections::{BTreeMap, BTreeSet};

use crate::common::{Record, DOC_ID};
use crate::document::StaleIndexEntry;
use crate::errors::{DocketError, DocketResult, ErrorKind};
use crate::index::IndexModel;

#[derive(Debug, Default)]
pub(crate) struct IndexSets {
    sets: BTreeMap<String, BTreeSet<String>>,
}

impl IndexSets {
    pub fn new() -> Self {
        IndexSets::default()
    }

    pub fn add(&mut self, key: &str, id: &str) {
        self.sets
            .entry(key.to_string())
            .or_default()
            .insert(id.to_string());
    }

    pub fn remove(&mut self, key: &str, id: &str) {
        if let Some(set) = self.sets.get_mut(key) {
            set.remove(id);
            if set.is_empty() {
                self.sets.remove(key);
            }
        }
    }

    /// Members of one set, in id order.
    pub fn members(&self, key: &str) -> Vec<String> {
        self.sets
            .get(key)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Ids present in every one of the given sets, in id order. An empty
    /// key list yields an empty result.
    pub fn intersection(&self, keys: &[String]) -> Vec<String> {
        let mut keys = keys.iter();
        let mut acc: BTreeSet<String> = match keys.next() {
            Some(key) => self.sets.get(key).cloned().unwrap_or_default(),
            None => return Vec::new(),
        };
        for key in keys {
            match self.sets.get(key) {
                Some(set) => acc = acc.intersection(set).cloned().collect(),
                None => return Vec::new(),
            }
        }
        acc.into_iter().collect()
    }

    pub fn contains(&self, key: &str, id: &str) -> bool {
        self.sets.get(key).map(|s| s.contains(id)).unwrap_or(false)
    }
}

pub(crate) fn record_id(record: &Record) -> DocketResult<String> {
    record
        .get(DOC_ID)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| {
            log::error!("record has no identifier, cannot maintain index sets");
            DocketError::new("record has no identifier", ErrorKind::InvalidOperation)
        })
}

/// Indexes a record: membership in the model set plus one entry per
/// index-maintained property value, with the stale values' entries retired
/// in the same pass.
pub(crate) fn apply_index_writes(
    sets: &mut IndexSets,
    record: &Record,
    stale: &[StaleIndexEntry],
    model: &IndexModel,
) -> DocketResult<()> {
    let id = record_id(record)?;
    for entry in stale {
        sets.remove(&model.index_key(entry.property(), entry.old_value()), &id);
    }
    sets.add(&model.model_set_key(), &id);
    for property in model.maintained_properties() {
        if let Some(value) = record.get(&property) {
            if !value.is_empty() {
                sets.add(&model.index_key(&property, value), &id);
            }
        }
    }
    Ok(())
}

/// Removes a record's id from the model set and from every index entry its
/// current values derive.
pub(crate) fn retire_index_entries(
    sets: &mut IndexSets,
    record: &Record,
    model: &IndexModel,
) -> DocketResult<()> {
    let id = record_id(record)?;
    sets.remove(&model.model_set_key(), &id);
    for property in model.maintained_properties() {
        if let Some(value) = record.get(&property) {
            if !value.is_empty() {
                sets.remove(&model.index_key(&property, value), &id);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Value;
    use crate::property::Property;
    use crate::schema::DocumentType;
    use indexmap::IndexMap;

    fn model() -> IndexModel {
        let doc_type = DocumentType::builder("Student")
            .property("name", Property::char().required().unique())
            .property("city", Property::char().global_index())
            .property("gpa", Property::float())
            .build()
            .unwrap();
        IndexModel::new(doc_type, "kv", false)
    }

    fn record(id: &str, name: &str, city: &str) -> Record {
        let mut record = IndexMap::new();
        record.insert("name".to_string(), Value::from(name));
        record.insert("city".to_string(), Value::from(city));
        record.insert("_doc_type".to_string(), Value::from("Student"));
        record.insert("_id".to_string(), Value::from(id));
        record
    }

    #[test]
    fn test_apply_index_writes() {
        let model = model();
        let mut sets = IndexSets::new();
        let rec = record("a1:id:kv:Student", "Brian", "Durham");
        apply_index_writes(&mut sets, &rec, &[], &model).unwrap();

        assert!(sets.contains("student:all", "a1:id:kv:Student"));
        assert!(sets.contains("kv:student:indexes:city:durham", "a1:id:kv:Student"));
        assert!(sets.contains("kv:student:indexes:name:brian", "a1:id:kv:Student"));
        // unindexed properties derive nothing
        assert!(sets.members("kv:student:indexes:gpa:3.9").is_empty());
    }

    #[test]
    fn test_stale_values_are_retired_in_same_write() {
        let model = model();
        let mut sets = IndexSets::new();
        let old = record("a1:id:kv:Student", "Brian", "Durham");
        apply_index_writes(&mut sets, &old, &[], &model).unwrap();

        let new = record("a1:id:kv:Student", "Brian", "Raleigh");
        let stale = {
            let mut doc = crate::document::Document::from_record(
                model.doc_type().clone(),
                &old,
            )
            .unwrap();
            doc.set("city", "Raleigh").unwrap();
            doc.take_stale_entries()
        };
        apply_index_writes(&mut sets, &new, &stale, &model).unwrap();

        assert!(!sets.contains("kv:student:indexes:city:durham", "a1:id:kv:Student"));
        assert!(sets.contains("kv:student:indexes:city:raleigh", "a1:id:kv:Student"));
    }

    #[test]
    fn test_retire_index_entries() {
        let model = model();
        let mut sets = IndexSets::new();
        let rec = record("a1:id:kv:Student", "Brian", "Durham");
        apply_index_writes(&mut sets, &rec, &[], &model).unwrap();
        retire_index_entries(&mut sets, &rec, &model).unwrap();

        assert!(sets.members("student:all").is_empty());
        assert!(sets.members("kv:student:indexes:city:durham").is_empty());
    }

    #[test]
    fn test_intersection() {
        let mut sets = IndexSets::new();
        sets.add("k1", "a");
        sets.add("k1", "b");
        sets.add("k2", "b");
        sets.add("k2", "c");
        assert_eq!(
            sets.intersection(&["k1".to_string(), "k2".to_string()]),
            vec!["b".to_string()]
        );
        assert!(sets.intersection(&["k1".to_string(), "k3".to_string()]).is_empty());
        assert!(sets.intersection(&[]).is_empty());
    }

    #[test]
    fn test_remove_drops_empty_sets() {
        let mut sets = IndexSets::new();
        sets.add("k1", "a");
        sets.remove("k1", "a");
        assert!(!sets.contains("k1", "a"));
        assert!(sets.members("k1").is_empty());
    }
}
