//! Query planning and execution.
//!
//! A filter specification is resolved once into a [QueryPlan] against the
//! document type's index model, then executed page by page through the
//! backend's continuation protocol. Results come back as a lazily
//! materialized [QuerySet].

pub(crate) mod executor;
mod plan;
mod query_set;

pub use plan::{QueryOptions, QueryPlan};
pub use query_set::QuerySet;
