//! The partitioned storage strategy.
//!
//! Records are partitioned by document type, and every index-eligible
//! property is kept in a natively maintained secondary index: each put
//! rewrites the record's index entries from the stored record itself, so
//! the protocol-level index maintenance methods are no-ops here. Index
//! values preserve their casing.

use std::collections::{BTreeMap, BTreeSet};

use crate::backend::index_sets::record_id;
use crate::backend::{page_ids, BackendKind, BackendProvider, ContinuationToken, Page};
use crate::common::{atomic, Atomic, Record, DOC_TYPE};
use crate::document::StaleIndexEntry;
use crate::errors::{DocketError, DocketResult, ErrorKind};
use crate::index::{IndexChoice, IndexModel};
use crate::query::QueryPlan;

#[derive(Default)]
struct PartitionedState {
    items: BTreeMap<String, Record>,
    partitions: BTreeMap<String, BTreeSet<String>>,
    // index name -> ordered (rendered value, id) pairs
    global_indexes: BTreeMap<String, BTreeSet<(String, String)>>,
}

impl PartitionedState {
    fn retire(&mut self, record: &Record, id: &str, model: &IndexModel) {
        for property in model.maintained_properties() {
            if let Some(value) = record.get(&property) {
                if !value.is_empty() {
                    let index_name = model.index_name_for(&property);
                    if let Some(index) = self.global_indexes.get_mut(&index_name) {
                        index.remove(&(value.to_string(), id.to_string()));
                        if index.is_empty() {
                            self.global_indexes.remove(&index_name);
                        }
                    }
                }
            }
        }
    }

    fn index(&mut self, record: &Record, id: &str, model: &IndexModel) {
        for property in model.maintained_properties() {
            if let Some(value) = record.get(&property) {
                if !value.is_empty() {
                    self.global_indexes
                        .entry(model.index_name_for(&property))
                        .or_default()
                        .insert((value.to_string(), id.to_string()));
                }
            }
        }
    }
}

#[derive(Clone)]
pub struct PartitionedBackend {
    backend_id: String,
    state: Atomic<PartitionedState>,
}

impl PartitionedBackend {
    pub fn new(backend_id: &str) -> Self {
        PartitionedBackend {
            backend_id: backend_id.to_string(),
            state: atomic(PartitionedState::default()),
        }
    }

    fn page_records(
        &self,
        state: &PartitionedState,
        ids: &[String],
        token: Option<&ContinuationToken>,
        page_size: usize,
    ) -> Page {
        let (page, next) = page_ids(ids, token, page_size);
        let records = page
            .iter()
            .filter_map(|id| state.items.get(id).cloned())
            .collect();
        Page::new(records, next)
    }
}

fn record_doc_type(record: &Record) -> DocketResult<String> {
    record
        .get(DOC_TYPE)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| {
            log::error!("record carries no document type, cannot partition it");
            DocketError::new("record carries no document type", ErrorKind::InvalidOperation)
        })
}

impl BackendProvider for PartitionedBackend {
    fn open_or_create(&self) -> DocketResult<()> {
        log::debug!("opened partitioned backend {}", self.backend_id);
        Ok(())
    }

    fn backend_id(&self) -> &str {
        &self.backend_id
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Partitioned
    }

    fn case_sensitive(&self) -> bool {
        true
    }

    fn put(
        &self,
        record: &Record,
        _stale: &[StaleIndexEntry],
        model: &IndexModel,
    ) -> DocketResult<()> {
        let id = record_id(record)?;
        let doc_type = record_doc_type(record)?;
        let mut state = self.state.write();
        // native maintenance: the previous stored record defines what to
        // retire, not the caller's change tracking
        if let Some(previous) = state.items.get(&id).cloned() {
            state.retire(&previous, &id, model);
        }
        state.index(record, &id, model);
        state
            .partitions
            .entry(doc_type)
            .or_default()
            .insert(id.clone());
        state.items.insert(id, record.clone());
        Ok(())
    }

    fn get(&self, id: &str) -> DocketResult<Option<Record>> {
        Ok(self.state.read().items.get(id).cloned())
    }

    fn delete(&self, record: &Record, model: &IndexModel) -> DocketResult<()> {
        let id = record_id(record)?;
        let doc_type = record_doc_type(record)?;
        let mut state = self.state.write();
        if let Some(stored) = state.items.get(&id).cloned() {
            state.retire(&stored, &id, model);
        }
        if let Some(partition) = state.partitions.get_mut(&doc_type) {
            partition.remove(&id);
            if partition.is_empty() {
                state.partitions.remove(&doc_type);
            }
        }
        state.items.remove(&id);
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
                let records = state.items.get(id).cloned().into_iter().collect();
                Ok(Page::new(records, None))
            }
            IndexChoice::Primary { doc_type, id: None } => {
                let ids: Vec<String> = state
                    .partitions
                    .get(doc_type)
                    .map(|p| p.iter().cloned().collect())
                    .unwrap_or_default();
                Ok(self.page_records(&state, &ids, token, plan.page_size()))
            }
            IndexChoice::Global {
                index_name, value, ..
            } => {
                let rendered = value.to_string();
                let ids: Vec<String> = state
                    .global_indexes
                    .get(index_name)
                    .map(|index| {
                        index
                            .iter()
                            .filter(|(v, _)| v == &rendered)
                            .map(|(_, id)| id.clone())
                            .collect()
                    })
                    .unwrap_or_default();
                Ok(self.page_records(&state, &ids, token, plan.page_size()))
            }
        }
    }

    fn scan(&self, token: Option<&ContinuationToken>, page_size: usize) -> DocketResult<Page> {
        let state = self.state.read();
        let ids: Vec<String> = state.items.keys().cloned().collect();
        Ok(self.page_records(&state, &ids, token, page_size))
    }

    fn add_index_entries(&self, _record: &Record, _model: &IndexModel) -> DocketResult<()> {
        Ok(())
    }

    fn remove_index_entries(&self, _record: &Record, _model: &IndexModel) -> DocketResult<()> {
        Ok(())
    }

    fn flush(&self) -> DocketResult<()> {
        Ok(())
    }
}
