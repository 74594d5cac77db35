//! The filter language: conditions and filter specifications.
//!
//! A query is an unordered-looking but order-sensitive conjunction of
//! `property[__condition] -> value` entries. The planner resolves the
//! driving index from the entries positionally; everything that does not
//! drive the index is applied as secondary, in-memory filtering.

mod condition;
mod spec;

pub use condition::Condition;
pub use spec::{FilterEntry, FilterSpec};

pub(crate) use spec::parse_filter_key;
