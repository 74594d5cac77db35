use rust_decimal::Decimal;

use crate::backend::Backend;
use crate::common::{atomic, Atomic, Value};
use crate::document::Document;
use crate::errors::{DocketError, DocketResult, ErrorKind};
use crate::index::IndexModel;
use crate::query::executor::execute_plan;
use crate::query::QueryPlan;

/// The lazily evaluated result of one query.
///
/// Execution is deferred until the first access and the materialized
/// documents are cached, so repeated reads of the same query set never hit
/// the backend twice. Clones share the cache.
#[derive(Clone)]
pub struct QuerySet {
    backend: Backend,
    model: IndexModel,
    plan: QueryPlan,
    cache: Atomic<Option<Vec<Document>>>,
}

impl QuerySet {
    pub(crate) fn new(backend: Backend, model: IndexModel, plan: QueryPlan) -> Self {
        QuerySet {
            backend,
            model,
            plan,
            cache: atomic(None),
        }
    }

    pub fn plan(&self) -> &QueryPlan {
        &self.plan
    }

    fn materialize(&self) -> DocketResult<Vec<Document>> {
        if let Some(cached) = self.cache.read().as_ref() {
            return Ok(cached.clone());
        }
        let documents = execute_plan(&self.backend, &self.model, &self.plan)?;
        *self.cache.write() = Some(documents.clone());
        Ok(documents)
    }

    /// The matching documents, in result order.
    pub fn documents(&self) -> DocketResult<Vec<Document>> {
        self.materialize()
    }

    pub fn iter(&self) -> DocketResult<std::vec::IntoIter<Document>> {
        Ok(self.materialize()?.into_iter())
    }

    pub fn count(&self) -> DocketResult<usize> {
        Ok(self.materialize()?.len())
    }

    pub fn is_empty(&self) -> DocketResult<bool> {
        Ok(self.materialize()?.is_empty())
    }

    pub fn first(&self) -> DocketResult<Option<Document>> {
        Ok(self.materialize()?.into_iter().next())
    }

    /// The single matching document.
    ///
    /// Fails with a `QueryError` when the query matched no document or more
    /// than one.
    pub fn get(&self) -> DocketResult<Document> {
        let mut documents = self.materialize()?;
        match documents.len() {
            1 => Ok(documents.remove(0)),
            0 => Err(DocketError::new(
                "This query did not return a result.",
                ErrorKind::QueryError,
            )),
            n => Err(DocketError::new(
                &format!(
                    "This query should return exactly one result. Your query returned {}",
                    n
                ),
                ErrorKind::QueryError,
            )),
        }
    }

    /// The value of one attribute across every matching document. Documents
    /// without the attribute contribute a null; an undeclared attribute is
    /// a `QueryError`.
    pub fn attr_list(&self, attr: &str) -> DocketResult<Vec<Value>> {
        if !self.plan.doc_type().has_property(attr) {
            return Err(DocketError::new(
                &format!(
                    "{} is not a declared property of {}",
                    attr,
                    self.plan.doc_type().name()
                ),
                ErrorKind::QueryError,
            ));
        }
        Ok(self
            .materialize()?
            .iter()
            .map(|doc| doc.get(attr).cloned().unwrap_or(Value::Null))
            .collect())
    }

    /// Sums a numeric attribute across the matching documents. Nulls are
    /// skipped; a non-numeric value is an error.
    pub fn sum(&self, attr: &str) -> DocketResult<Decimal> {
        let mut total = Decimal::ZERO;
        for value in self.attr_list(attr)? {
            if value.is_null() {
                continue;
            }
            match value.as_decimal() {
                Some(d) => total += d,
                None => {
                    return Err(DocketError::new(
                        &format!("{} is not a numeric attribute", attr),
                        ErrorKind::InvalidOperation,
                    ))
                }
            }
        }
        Ok(total)
    }

    /// Averages a numeric attribute across the matching documents that
    /// carry it.
    pub fn mean(&self, attr: &str) -> DocketResult<Decimal> {
        let mut total = Decimal::ZERO;
        let mut count = 0i64;
        for value in self.attr_list(attr)? {
            if value.is_null() {
                continue;
            }
            match value.as_decimal() {
                Some(d) => {
                    total += d;
                    count += 1;
                }
                None => {
                    return Err(DocketError::new(
                        &format!("{} is not a numeric attribute", attr),
                        ErrorKind::InvalidOperation,
                    ))
                }
            }
        }
        if count == 0 {
            return Err(DocketError::new(
                &format!("cannot average {} over an empty result", attr),
                ErrorKind::InvalidOperation,
            ));
        }
        Ok(total / Decimal::from(count))
    }
}

impl std::fmt::Debug for QuerySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuerySet")
            .field("plan", &self.plan)
            .field("materialized", &self.cache.read().is_some())
            .finish()
    }
}
