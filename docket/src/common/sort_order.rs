/// Specifies the direction for sorting query results.
///
/// Used with `QueryOptions::sort_by()` to control result ordering. Sorting is
/// performed client-side over the fully materialized result set, because the
/// secondary indexes used by the backends do not guarantee arbitrary
/// attribute ordering across pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Sort from smallest to largest value (A to Z, 0 to 9).
    #[default]
    Ascending,
    /// Sort from largest to smallest value (Z to A, 9 to 0).
    Descending,
}

impl SortOrder {
    /// Returns true when this order reverses the natural ordering.
    pub fn is_descending(&self) -> bool {
        matches!(self, SortOrder::Descending)
    }
}
