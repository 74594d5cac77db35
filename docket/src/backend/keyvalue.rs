//! The flat key-value storage strategy.
//!
//! Records live in a single ordered key space under their full identifier.
//! The native store has no secondary indexes, so every index structure is
//! an explicitly maintained id set, updated inside the same write lock as
//! the record. Derived index keys are lowercased.

use std::collections::BTreeMap;

use crate::backend::index_sets::{apply_index_writes, retire_index_entries, record_id, IndexSets};
use crate::backend::{page_ids, BackendKind, BackendProvider, ContinuationToken, Page};
use crate::common::{atomic, Atomic, Record};
use crate::document::StaleIndexEntry;
use crate::errors::DocketResult;
use crate::index::{IndexChoice, IndexModel};
use crate::query::QueryPlan;

#[derive(Default)]
struct KeyValueState {
    records: BTreeMap<String, Record>,
    indexes: IndexSets,
}

#[derive(Clone)]
pub struct KeyValueBackend {
    backend_id: String,
    state: Atomic<KeyValueState>,
}

impl KeyValueBackend {
    pub fn new(backend_id: &str) -> Self {
        KeyValueBackend {
            backend_id: backend_id.to_string(),
            state: atomic(KeyValueState::default()),
        }
    }

    fn page_records(
        &self,
        state: &KeyValueState,
        ids: &[String],
        token: Option<&ContinuationToken>,
        page_size: usize,
    ) -> Page {
        let (page, next) = page_ids(ids, token, page_size);
        let records = page
            .iter()
            .filter_map(|id| state.records.get(id).cloned())
            .collect();
        Page::new(records, next)
    }
}

impl BackendProvider for KeyValueBackend {
    fn open_or_create(&self) -> DocketResult<()> {
        log::debug!("opened key-value backend {}", self.backend_id);
        Ok(())
    }

    fn backend_id(&self) -> &str {
        &self.backend_id
    }

    fn kind(&self) -> BackendKind {
        BackendKind::KeyValue
    }

    fn case_sensitive(&self) -> bool {
        false
    }

    fn put(
        &self,
        record: &Record,
        stale: &[StaleIndexEntry],
        model: &IndexModel,
    ) -> DocketResult<()> {
        let id = record_id(record)?;
        // one lock for the whole write keeps record and index sets in step
        let mut state = self.state.write();
        apply_index_writes(&mut state.indexes, record, stale, model)?;
        state.records.insert(id, record.clone());
        Ok(())
    }

    fn get(&self, id: &str) -> DocketResult<Option<Record>> {
        Ok(self.state.read().records.get(id).cloned())
    }

    fn delete(&self, record: &Record, model: &IndexModel) -> DocketResult<()> {
        let id = record_id(record)?;
        let mut state = self.state.write();
        retire_index_entries(&mut state.indexes, record, model)?;
        state.records.remove(&id);
        Ok(())
    }

    fn query(
        &self,
        plan: &QueryPlan,
        token: Option<&ContinuationToken>,
        model: &IndexModel,
    ) -> DocketResult<Page> {
        let state = self.state.read();
        match plan.index_choice() {
            IndexChoice::Primary { id: Some(id), .. } => {
                if token.is_some() {
                    return Ok(Page::default());
                }
                let records = state.records.get(id).cloned().into_iter().collect();
                Ok(Page::new(records, None))
            }
            IndexChoice::Primary { id: None, .. } => {
                let ids = state.indexes.members(&model.model_set_key());
                Ok(self.page_records(&state, &ids, token, plan.page_size()))
            }
            IndexChoice::Global { .. } => {
                let keys: Vec<String> = plan
                    .eq_index_conditions()
                    .iter()
                    .map(|(property, value)| model.index_key(property, value))
                    .collect();
                let ids = state.indexes.intersection(&keys);
                Ok(self.page_records(&state, &ids, token, plan.page_size()))
            }
        }
    }

    fn scan(&self, token: Option<&ContinuationToken>, page_size: usize) -> DocketResult<Page> {
        let state = self.state.read();
        let ids: Vec<String> = state.records.keys().cloned().collect();
        Ok(self.page_records(&state, &ids, token, page_size))
    }

    fn add_index_entries(&self, record: &Record, model: &IndexModel) -> DocketResult<()> {
        let mut state = self.state.write();
        apply_index_writes(&mut state.indexes, record, &[], model)
    }

    fn remove_index_entries(&self, record: &Record, model: &IndexModel) -> DocketResult<()> {
        let mut state = self.state.write();
        retire_index_entries(&mut state.indexes, record, model)
    }

    fn flush(&self) -> DocketResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Value;
    use crate::filter::FilterSpec;
    use crate::property::Property;
    use crate::query::QueryOptions;
    use crate::schema::DocumentType;
    use indexmap::IndexMap;

    fn model() -> IndexModel {
        let doc_type = DocumentType::builder("Student")
            .property("name", Property::char().required())
            .property("city", Property::char().global_index())
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
    fn test_put_get_delete() {
        let backend = KeyValueBackend::new("kv");
        let model = model();
        let rec = record("a1:id:kv:Student", "Brian", "Durham");
        backend.put(&rec, &[], &model).unwrap();
        assert_eq!(backend.get("a1:id:kv:Student").unwrap(), Some(rec.clone()));
        backend.delete(&rec, &model).unwrap();
        assert!(backend.get("a1:id:kv:Student").unwrap().is_none());
    }

    #[test]
    fn test_global_query_is_case_insensitive() {
        let backend = KeyValueBackend::new("kv");
        let model = model();
        backend
            .put(&record("a1:id:kv:Student", "Brian", "Durham"), &[], &model)
            .unwrap();

        let spec = FilterSpec::new().eq("city", "durham");
        let plan = QueryPlan::build(&model, &spec, QueryOptions::new()).unwrap();
        let page = backend.query(&plan, None, &model).unwrap();
        assert_eq!(page.records().len(), 1);
    }

    #[test]
    fn test_type_scan_pages_in_id_order() {
        let backend = KeyValueBackend::new("kv");
        let model = model();
        for i in 0..5 {
            let id = format!("a{}:id:kv:Student", i);
            backend
                .put(&record(&id, "N", "Durham"), &[], &model)
                .unwrap();
        }
        let spec = FilterSpec::new().eq("_doc_type", "Student");
        let plan = QueryPlan::build(&model, &spec, QueryOptions::new().page_size(2)).unwrap();

        let first = backend.query(&plan, None, &model).unwrap();
        assert_eq!(first.records().len(), 2);
        let second = backend.query(&plan, first.token(), &model).unwrap();
        assert_eq!(second.records().len(), 2);
        let third = backend.query(&plan, second.token(), &model).unwrap();
        assert_eq!(third.records().len(), 1);
        assert!(third.token().is_none());
    }

    #[test]
    fn test_delete_retires_index_sets() {
        let backend = KeyValueBackend::new("kv");
        let model = model();
        let rec = record("a1:id:kv:Student", "Brian", "Durham");
        backend.put(&rec, &[], &model).unwrap();
        backend.delete(&rec, &model).unwrap();

        let spec = FilterSpec::new().eq("city", "Durham");
        let plan = QueryPlan::build(&model, &spec, QueryOptions::new()).unwrap();
        assert!(backend.query(&plan, None, &model).unwrap().records().is_empty());
    }
}
