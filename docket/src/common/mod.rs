//! Common types, constants, and utilities shared across the crate.

pub mod constants;
pub mod sort_order;
pub mod util;
pub mod value;

pub use constants::*;
pub use sort_order::SortOrder;
pub use util::{atomic, current_time_string, Atomic};
pub use value::Value;

use indexmap::IndexMap;

/// A write-ready persisted record: attribute name to storage value, in
/// declaration order. Backends never retain entity references, only these
/// serialized snapshots.
pub type Record = IndexMap<String, Value>;
