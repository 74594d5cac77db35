//! Plan execution: the continuation loop, residual filtering, ordering,
//! and hydration back into documents.

use crate::backend::{Backend, ContinuationToken};
use crate::common::{Record, Value};
use crate::document::Document;
use crate::errors::DocketResult;
use crate::index::IndexModel;
use crate::query::QueryPlan;

/// Runs a plan to completion and hydrates the matching records.
///
/// Pages are pulled from the backend until the cursor is exhausted or, for
/// unsorted queries, until enough residual matches have been kept to cover
/// `skip + limit`. Sorted queries always materialize every match first;
/// ordering is applied client-side before paging.
pub(crate) fn execute_plan(
    backend: &Backend,
    model: &IndexModel,
    plan: &QueryPlan,
) -> DocketResult<Vec<Document>> {
    let target = plan.limit().map(|limit| plan.skip() + limit);
    let mut kept: Vec<Record> = Vec::new();
    let mut token: Option<ContinuationToken> = None;
    let mut first = true;

    while first || token.is_some() {
        first = false;
        let page = backend.query(plan, token.as_ref(), model)?;
        let (records, next) = page.into_parts();
        for record in records {
            if plan.residual_match(&record)? {
                kept.push(record);
            }
        }
        token = next;
        if plan.sort_attr().is_none() {
            if let Some(target) = target {
                if kept.len() >= target {
                    break;
                }
            }
        }
    }

    if let Some(attr) = plan.sort_attr() {
        let descending = plan.sort_order().is_descending();
        // stable, with missing attributes ordered as null
        kept.sort_by(|a, b| {
            let left = a.get(attr).unwrap_or(&Value::Null);
            let right = b.get(attr).unwrap_or(&Value::Null);
            let ordering = left.cmp(right);
            if descending {
                ordering.reverse()
            } else {
                ordering
            }
        });
    }

    let sliced = kept.into_iter().skip(plan.skip());
    let records: Vec<Record> = match plan.limit() {
        Some(limit) => sliced.take(limit).collect(),
        None => sliced.collect(),
    };

    log::debug!(
        "plan {:?} kept {} documents for type {}",
        plan.index_choice(),
        records.len(),
        plan.doc_type().name()
    );

    records
        .iter()
        .map(|record| Document::from_record(plan.doc_type().clone(), record))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendProvider, KeyValueBackend};
    use crate::common::SortOrder;
    use crate::filter::FilterSpec;
    use crate::property::Property;
    use crate::query::QueryOptions;
    use crate::schema::DocumentType;
    use indexmap::IndexMap;
    use std::sync::Arc;

    fn model() -> IndexModel {
        let doc_type = DocumentType::builder("Student")
            .property("name", Property::char().required())
            .property("city", Property::char().global_index())
            .property("gpa", Property::float())
            .build()
            .unwrap();
        IndexModel::new(doc_type, "kv", false)
    }

    fn backend(model: &IndexModel, rows: &[(&str, &str, f64)]) -> Backend {
        let provider = KeyValueBackend::new("kv");
        for (i, (name, city, gpa)) in rows.iter().enumerate() {
            let mut record: Record = IndexMap::new();
            record.insert("name".to_string(), Value::from(*name));
            record.insert("city".to_string(), Value::from(*city));
            record.insert("gpa".to_string(), Value::F64(*gpa));
            record.insert("_doc_type".to_string(), Value::from("Student"));
            record.insert(
                "_id".to_string(),
                Value::from(format!("a{}:id:kv:Student", i)),
            );
            provider.put(&record, &[], model).unwrap();
        }
        let backend = Backend::new(Arc::new(provider));
        backend.open_or_create().unwrap();
        backend
    }

    #[test]
    fn test_residual_filtering_spans_pages() {
        let model = model();
        let backend = backend(
            &model,
            &[
                ("A", "Durham", 3.9),
                ("B", "Durham", 1.5),
                ("C", "Durham", 2.7),
                ("D", "Durham", 3.1),
                ("E", "Raleigh", 3.8),
            ],
        );
        let spec = FilterSpec::new().eq("city", "Durham").gte("gpa", 2.5);
        let plan = QueryPlan::build(&model, &spec, QueryOptions::new().page_size(2)).unwrap();
        let docs = execute_plan(&backend, &model, &plan).unwrap();
        assert_eq!(docs.len(), 3);
        assert!(docs.iter().all(|d| d.get("city") == Some(&Value::from("Durham"))));
    }

    #[test]
    fn test_skip_and_limit_count_kept_matches() {
        let model = model();
        let backend = backend(
            &model,
            &[
                ("A", "Durham", 3.9),
                ("B", "Durham", 1.5),
                ("C", "Durham", 2.7),
                ("D", "Durham", 3.1),
            ],
        );
        let spec = FilterSpec::new().eq("city", "Durham").gte("gpa", 2.5);
        let plan = QueryPlan::build(
            &model,
            &spec,
            QueryOptions::new().skip(1).limit(1).page_size(1),
        )
        .unwrap();
        let docs = execute_plan(&backend, &model, &plan).unwrap();
        assert_eq!(docs.len(), 1);
        // ids page in order, so kept matches are A, C, D; skip 1 keeps C
        assert_eq!(docs[0].get("name"), Some(&Value::from("C")));
    }

    #[test]
    fn test_sort_descending_before_paging() {
        let model = model();
        let backend = backend(
            &model,
            &[
                ("A", "Durham", 2.0),
                ("B", "Durham", 3.9),
                ("C", "Durham", 3.1),
            ],
        );
        let spec = FilterSpec::new().eq("city", "Durham");
        let plan = QueryPlan::build(
            &model,
            &spec,
            QueryOptions::new()
                .sort_by("gpa", SortOrder::Descending)
                .limit(2)
                .page_size(1),
        )
        .unwrap();
        let docs = execute_plan(&backend, &model, &plan).unwrap();
        let names: Vec<&Value> = docs.iter().filter_map(|d| d.get("name")).collect();
        assert_eq!(names, vec![&Value::from("B"), &Value::from("C")]);
    }

    #[test]
    fn test_missing_sort_attribute_orders_first_ascending() {
        let model = model();
        let provider = KeyValueBackend::new("kv");
        let mut record: Record = IndexMap::new();
        record.insert("name".to_string(), Value::from("NoGpa"));
        record.insert("city".to_string(), Value::from("Durham"));
        record.insert("_doc_type".to_string(), Value::from("Student"));
        record.insert("_id".to_string(), Value::from("zz:id:kv:Student"));
        provider.put(&record, &[], &model).unwrap();
        let mut record: Record = IndexMap::new();
        record.insert("name".to_string(), Value::from("HasGpa"));
        record.insert("city".to_string(), Value::from("Durham"));
        record.insert("gpa".to_string(), Value::F64(1.0));
        record.insert("_doc_type".to_string(), Value::from("Student"));
        record.insert("_id".to_string(), Value::from("aa:id:kv:Student"));
        provider.put(&record, &[], &model).unwrap();
        let backend = Backend::new(Arc::new(provider));
        backend.open_or_create().unwrap();

        let spec = FilterSpec::new().eq("city", "Durham");
        let plan = QueryPlan::build(
            &model,
            &spec,
            QueryOptions::new().sort_by("gpa", SortOrder::Ascending),
        )
        .unwrap();
        let docs = execute_plan(&backend, &model, &plan).unwrap();
        assert_eq!(docs[0].get("name"), Some(&Value::from("NoGpa")));
    }
}
