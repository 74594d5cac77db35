//! The hybrid blob storage strategy.
//!
//! Record bodies are kept as encoded JSON blobs in an object space keyed by
//! full identifier, the way a blob store would hold them; the index sets
//! that make them queryable live beside the objects and are maintained in
//! the same write. Derived index keys are lowercased, as on the key-value
//! strategy.

use std::collections::BTreeMap;

use crate::backend::index_sets::{apply_index_writes, retire_index_entries, record_id, IndexSets};
use crate::backend::{page_ids, BackendKind, BackendProvider, ContinuationToken, Page};
use crate::common::{atomic, Atomic, Record};
use crate::document::StaleIndexEntry;
use crate::errors::DocketResult;
use crate::index::{IndexChoice, IndexModel};
use crate::query::QueryPlan;

#[derive(Default)]
struct HybridState {
    objects: BTreeMap<String, String>,
    indexes: IndexSets,
}

#[derive(Clone)]
pub struct HybridBackend {
    backend_id: String,
    state: Atomic<HybridState>,
}

impl HybridBackend {
    pub fn new(backend_id: &str) -> Self {
        HybridBackend {
            backend_id: backend_id.to_string(),
            state: atomic(HybridState::default()),
        }
    }

    fn decode(blob: &str) -> DocketResult<Record> {
        Ok(serde_json::from_str(blob)?)
    }

    fn page_records(
        &self,
        state: &HybridState,
        ids: &[String],
        token: Option<&ContinuationToken>,
        page_size: usize,
    ) -> DocketResult<Page> {
        let (page, next) = page_ids(ids, token, page_size);
        let mut records = Vec::with_capacity(page.len());
        for id in &page {
            if let Some(blob) = state.objects.get(id) {
                records.push(HybridBackend::decode(blob)?);
            }
        }
        Ok(Page::new(records, next))
    }
}

impl BackendProvider for HybridBackend {
    fn open_or_create(&self) -> DocketResult<()> {
        log::debug!("opened hybrid backend {}", self.backend_id);
        Ok(())
    }

    fn backend_id(&self) -> &str {
        &self.backend_id
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Hybrid
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
        // encode before taking the lock; a failed encode leaves no state
        let blob = serde_json::to_string(record)?;
        let mut state = self.state.write();
        apply_index_writes(&mut state.indexes, record, stale, model)?;
        state.objects.insert(id, blob);
        Ok(())
    }

    fn get(&self, id: &str) -> DocketResult<Option<Record>> {
        let state = self.state.read();
        match state.objects.get(id) {
            Some(blob) => Ok(Some(HybridBackend::decode(blob)?)),
            None => Ok(None),
        }
    }

    fn delete(&self, record: &Record, model: &IndexModel) -> DocketResult<()> {
        let id = record_id(record)?;
        let mut state = self.state.write();
        retire_index_entries(&mut state.indexes, record, model)?;
        state.objects.remove(&id);
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
                let records = match state.objects.get(id) {
                    Some(blob) => vec![HybridBackend::decode(blob)?],
                    None => Vec::new(),
                };
                Ok(Page::new(records, None))
            }
            IndexChoice::Primary { id: None, .. } => {
                let ids = state.indexes.members(&model.model_set_key());
                self.page_records(&state, &ids, token, plan.page_size())
            }
            IndexChoice::Global { .. } => {
                let keys: Vec<String> = plan
                    .eq_index_conditions()
                    .iter()
                    .map(|(property, value)| model.index_key(property, value))
                    .collect();
                let ids = state.indexes.intersection(&keys);
                self.page_records(&state, &ids, token, plan.page_size())
            }
        }
    }

    fn scan(&self, token: Option<&ContinuationToken>, page_size: usize) -> DocketResult<Page> {
        let state = self.state.read();
        let ids: Vec<String> = state.objects.keys().cloned().collect();
        self.page_records(&state, &ids, token, page_size)
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
