use std::sync::Arc;

use crate::common::{Record, SortOrder, Value, DOC_ID, PK_ALIAS};
use crate::errors::DocketResult;
use crate::filter::{Condition, FilterEntry, FilterSpec};
use crate::index::{IndexChoice, IndexModel};
use crate::schema::DocumentType;

const DEFAULT_PAGE_SIZE: usize = 100;

/// Execution options for a query: paging, ordering, and page sizing.
#[derive(Debug, Clone)]
pub struct QueryOptions {
    limit: Option<usize>,
    skip: usize,
    sort_attr: Option<String>,
    sort_order: SortOrder,
    page_size: usize,
}

impl Default for QueryOptions {
    fn default() -> Self {
        QueryOptions {
            limit: None,
            skip: 0,
            sort_attr: None,
            sort_order: SortOrder::Ascending,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl QueryOptions {
    pub fn new() -> Self {
        QueryOptions::default()
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    /// Sorts results by an attribute before paging is applied. Documents
    /// missing the attribute sort first in ascending order.
    pub fn sort_by(mut self, attr: &str, order: SortOrder) -> Self {
        self.sort_attr = Some(attr.to_string());
        self.sort_order = order;
        self
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }
}

/// An immutable, resolved execution plan for one query.
///
/// Built once per query from the filter specification and the document
/// type's index model. The plan fixes the driving index, the equality
/// conditions backends may narrow candidates with, and the residual
/// conditions applied in memory to every candidate record.
#[derive(Clone)]
pub struct QueryPlan {
    inner: Arc<QueryPlanInner>,
}

struct QueryPlanInner {
    doc_type: DocumentType,
    choice: IndexChoice,
    eq_index_conditions: Vec<(String, Value)>,
    residuals: Vec<FilterEntry>,
    limit: Option<usize>,
    skip: usize,
    sort_attr: Option<String>,
    sort_order: SortOrder,
    page_size: usize,
}

impl QueryPlan {
    /// Resolves a plan for a regular query.
    pub fn build(
        model: &IndexModel,
        spec: &FilterSpec,
        options: QueryOptions,
    ) -> DocketResult<QueryPlan> {
        QueryPlan::build_inner(model, spec, options, false)
    }

    /// Resolves a plan for the internal uniqueness probe, which may drive
    /// off a unique-flagged property's implicit index.
    pub(crate) fn build_probe(
        model: &IndexModel,
        spec: &FilterSpec,
        options: QueryOptions,
    ) -> DocketResult<QueryPlan> {
        QueryPlan::build_inner(model, spec, options, true)
    }

    fn build_inner(
        model: &IndexModel,
        spec: &FilterSpec,
        options: QueryOptions,
        unique_probe: bool,
    ) -> DocketResult<QueryPlan> {
        let choice = model.resolve_index_for_filter(spec, unique_probe)?;

        // position of the entry satisfied by the driving index itself
        let driving = match &choice {
            IndexChoice::Global { property, .. } => spec
                .entries()
                .iter()
                .position(|e| e.property() == property && e.condition().is_equality()),
            IndexChoice::Primary { .. } => None,
        };

        let mut residuals = Vec::new();
        let mut eq_index_conditions = Vec::new();
        for (i, entry) in spec.entries().iter().enumerate() {
            let global = model
                .doc_type()
                .property(entry.property())
                .map(|p| p.is_global_index() || (unique_probe && p.is_unique()))
                .unwrap_or(false);
            if global && entry.condition().is_equality() {
                eq_index_conditions.push((entry.property().to_string(), entry.operand().clone()));
            }
            if Some(i) == driving {
                continue;
            }
            match entry.property() {
                DOC_ID | PK_ALIAS if matches!(choice, IndexChoice::Primary { id: Some(_), .. }) => {
                    // satisfied by the primary id lookup itself
                    continue
                }
                PK_ALIAS => {
                    // records carry the full id under _id, never the alias
                    let operand = match entry.operand().as_str() {
                        Some(pk) if entry.condition() == Condition::Eq => {
                            Value::String(model.expand_id(pk))
                        }
                        _ => entry.operand().clone(),
                    };
                    residuals.push(FilterEntry::new(DOC_ID, entry.condition(), operand));
                }
                _ => residuals.push(entry.clone()),
            }
        }

        Ok(QueryPlan {
            inner: Arc::new(QueryPlanInner {
                doc_type: model.doc_type().clone(),
                choice,
                eq_index_conditions,
                residuals,
                limit: options.limit,
                skip: options.skip,
                sort_attr: options.sort_attr,
                sort_order: options.sort_order,
                page_size: options.page_size.max(1),
            }),
        })
    }

    pub fn doc_type(&self) -> &DocumentType {
        &self.inner.doc_type
    }

    pub fn index_choice(&self) -> &IndexChoice {
        &self.inner.choice
    }

    /// Equality conditions on globally indexed properties, driving entry
    /// included. Set-index backends intersect these to narrow candidates.
    pub fn eq_index_conditions(&self) -> &[(String, Value)] {
        &self.inner.eq_index_conditions
    }

    /// Conditions not satisfied by the driving index; evaluated in memory
    /// against every candidate record.
    pub fn residuals(&self) -> &[FilterEntry] {
        &self.inner.residuals
    }

    pub fn limit(&self) -> Option<usize> {
        self.inner.limit
    }

    pub fn skip(&self) -> usize {
        self.inner.skip
    }

    pub fn sort_attr(&self) -> Option<&str> {
        self.inner.sort_attr.as_deref()
    }

    pub fn sort_order(&self) -> SortOrder {
        self.inner.sort_order
    }

    pub fn page_size(&self) -> usize {
        self.inner.page_size
    }

    /// Evaluates the residual conjunction against one candidate record.
    pub fn residual_match(&self, record: &Record) -> DocketResult<bool> {
        for entry in &self.inner.residuals {
            if !entry.matches(record)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl std::fmt::Debug for QueryPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryPlan")
            .field("doc_type", &self.inner.doc_type.name())
            .field("choice", &self.inner.choice)
            .field("residuals", &self.inner.residuals.len())
            .field("limit", &self.inner.limit)
            .field("skip", &self.inner.skip)
            .field("sort_attr", &self.inner.sort_attr)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::Property;
    use indexmap::IndexMap;

    fn model() -> IndexModel {
        let doc_type = DocumentType::builder("Student")
            .property("name", Property::char().required().unique())
            .property("city", Property::char().global_index())
            .property("email", Property::email().global_index())
            .property("gpa", Property::float())
            .build()
            .unwrap();
        IndexModel::new(doc_type, "keyvalue", false)
    }

    #[test]
    fn test_driving_entry_is_not_residual() {
        let spec = FilterSpec::new().eq("city", "Durham").gt("gpa", 2.0);
        let plan = QueryPlan::build(&model(), &spec, QueryOptions::new()).unwrap();
        assert!(matches!(plan.index_choice(), IndexChoice::Global { .. }));
        assert_eq!(plan.residuals().len(), 1);
        assert_eq!(plan.residuals()[0].property(), "gpa");
    }

    #[test]
    fn test_second_equality_is_both_narrowing_and_residual() {
        let spec = FilterSpec::new().eq("city", "Durham").eq("email", "a@b.co");
        let plan = QueryPlan::build(&model(), &spec, QueryOptions::new()).unwrap();
        assert_eq!(plan.eq_index_conditions().len(), 2);
        assert_eq!(plan.residuals().len(), 1);
        assert_eq!(plan.residuals()[0].property(), "email");
    }

    #[test]
    fn test_primary_plan_keeps_type_tag_residual() {
        let spec = FilterSpec::new().eq("_doc_type", "Student").eq("pk", "abc");
        let plan = QueryPlan::build(&model(), &spec, QueryOptions::new()).unwrap();
        match plan.index_choice() {
            IndexChoice::Primary { id, .. } => assert!(id.is_some()),
            other => panic!("unexpected choice {:?}", other),
        }
        // the pk entry is satisfied by the id lookup; the type tag is
        // re-checked against each candidate record
        assert_eq!(plan.residuals().len(), 1);
        assert_eq!(plan.residuals()[0].property(), "_doc_type");
    }

    #[test]
    fn test_type_tag_mismatch_filters_out_candidates() {
        let spec = FilterSpec::new().eq("_doc_type", "Course");
        let plan = QueryPlan::build(&model(), &spec, QueryOptions::new()).unwrap();
        let mut record: Record = IndexMap::new();
        record.insert("_doc_type".to_string(), Value::from("Student"));
        assert!(!plan.residual_match(&record).unwrap());
    }

    #[test]
    fn test_residual_only_filter_builds_type_scan_plan() {
        let spec = FilterSpec::new().gt("gpa", 2.0);
        let plan = QueryPlan::build(&model(), &spec, QueryOptions::new()).unwrap();
        match plan.index_choice() {
            IndexChoice::Primary { doc_type, id } => {
                assert_eq!(doc_type, "Student");
                assert!(id.is_none());
            }
            other => panic!("unexpected choice {:?}", other),
        }
        assert_eq!(plan.residuals().len(), 1);
        assert_eq!(plan.residuals()[0].property(), "gpa");
    }

    #[test]
    fn test_pk_alias_residual_expands_to_full_id() {
        let spec = FilterSpec::new().eq("city", "Durham").eq("pk", "abc");
        let plan = QueryPlan::build(&model(), &spec, QueryOptions::new()).unwrap();
        let residual = plan
            .residuals()
            .iter()
            .find(|e| e.property() == DOC_ID)
            .unwrap();
        assert_eq!(residual.operand(), &Value::from("abc:id:keyvalue:Student"));
    }

    #[test]
    fn test_residual_match() {
        let spec = FilterSpec::new().eq("city", "Durham").between("gpa", 2.0, 3.0);
        let plan = QueryPlan::build(&model(), &spec, QueryOptions::new()).unwrap();
        let mut record: Record = IndexMap::new();
        record.insert("city".to_string(), Value::from("Durham"));
        record.insert("gpa".to_string(), Value::F64(2.5));
        assert!(plan.residual_match(&record).unwrap());
        record.insert("gpa".to_string(), Value::F64(3.5));
        assert!(!plan.residual_match(&record).unwrap());
    }

    #[test]
    fn test_options_carry_through() {
        let spec = FilterSpec::new().eq("city", "Durham");
        let options = QueryOptions::new()
            .limit(5)
            .skip(2)
            .sort_by("gpa", SortOrder::Descending)
            .page_size(10);
        let plan = QueryPlan::build(&model(), &spec, options).unwrap();
        assert_eq!(plan.limit(), Some(5));
        assert_eq!(plan.skip(), 2);
        assert_eq!(plan.sort_attr(), Some("gpa"));
        assert!(plan.sort_order().is_descending());
        assert_eq!(plan.page_size(), 10);
    }

    #[test]
    fn test_probe_plan_uses_unique_index() {
        let spec = FilterSpec::new().eq("name", "Brian");
        let plan = QueryPlan::build_probe(&model(), &spec, QueryOptions::new()).unwrap();
        assert!(matches!(plan.index_choice(), IndexChoice::Global { .. }));
        assert!(plan.residuals().is_empty());
    }
}
