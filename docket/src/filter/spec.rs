use crate::common::{Record, Value, CONDITION_SEPARATOR};
use crate::errors::DocketResult;
use crate::filter::Condition;
use std::fmt::{Display, Formatter};

/// One parsed filter condition: a property, a condition, and an operand.
#[derive(Debug, Clone)]
pub struct FilterEntry {
    property: String,
    condition: Condition,
    operand: Value,
}

impl FilterEntry {
    pub fn new(property: &str, condition: Condition, operand: Value) -> Self {
        FilterEntry {
            property: property.to_string(),
            condition,
            operand,
        }
    }

    pub fn property(&self) -> &str {
        &self.property
    }

    pub fn condition(&self) -> Condition {
        self.condition
    }

    pub fn operand(&self) -> &Value {
        &self.operand
    }

    /// Evaluates this entry against a raw record.
    pub fn matches(&self, record: &Record) -> DocketResult<bool> {
        self.condition
            .matches(record.get(&self.property), &self.operand)
    }
}

impl Display for FilterEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "({} {} {})", self.property, self.condition, self.operand)
    }
}

/// An ordered conjunction of filter conditions over a document type's
/// declared properties.
///
/// Entry order matters: index selection is positional, so callers control
/// the query plan by the order in which they add conditions. Keys accept the
/// `property__condition` suffix form; a bare property name means equality.
///
/// ```rust,ignore
/// let spec = FilterSpec::new()
///     .eq("city", "Durham")
///     .with("gpa__between", vec![2, 3])?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct FilterSpec {
    entries: Vec<FilterEntry>,
    index_name: Option<String>,
}

impl FilterSpec {
    pub fn new() -> Self {
        FilterSpec::default()
    }

    /// Adds a condition from a `property[__condition]` key.
    ///
    /// Fails with `QueryError` when the suffix is not a known condition.
    pub fn with<T: Into<Value>>(mut self, key: &str, value: T) -> DocketResult<Self> {
        let (property, condition) = parse_filter_key(key)?;
        self.entries
            .push(FilterEntry::new(&property, condition, value.into()));
        Ok(self)
    }

    pub fn eq<T: Into<Value>>(self, property: &str, value: T) -> Self {
        self.push(property, Condition::Eq, value.into())
    }

    pub fn ne<T: Into<Value>>(self, property: &str, value: T) -> Self {
        self.push(property, Condition::Ne, value.into())
    }

    pub fn lt<T: Into<Value>>(self, property: &str, value: T) -> Self {
        self.push(property, Condition::Lt, value.into())
    }

    pub fn lte<T: Into<Value>>(self, property: &str, value: T) -> Self {
        self.push(property, Condition::Lte, value.into())
    }

    pub fn gt<T: Into<Value>>(self, property: &str, value: T) -> Self {
        self.push(property, Condition::Gt, value.into())
    }

    pub fn gte<T: Into<Value>>(self, property: &str, value: T) -> Self {
        self.push(property, Condition::Gte, value.into())
    }

    pub fn in_values<T: Into<Value>>(self, property: &str, values: Vec<T>) -> Self {
        let operand = Value::Array(values.into_iter().map(Into::into).collect());
        self.push(property, Condition::In, operand)
    }

    /// Inclusive range condition over `(low, high)`.
    pub fn between<T: Into<Value>>(self, property: &str, low: T, high: T) -> Self {
        let operand = Value::Array(vec![low.into(), high.into()]);
        self.push(property, Condition::Between, operand)
    }

    pub fn begins(self, property: &str, prefix: &str) -> Self {
        self.push(property, Condition::Begins, Value::from(prefix))
    }

    pub fn contains<T: Into<Value>>(self, property: &str, value: T) -> Self {
        self.push(property, Condition::Contains, value.into())
    }

    pub fn attr_exists(self, property: &str) -> Self {
        self.push(property, Condition::AttrExists, Value::Null)
    }

    pub fn attr_not_exists(self, property: &str) -> Self {
        self.push(property, Condition::AttrNotExists, Value::Null)
    }

    pub fn attr_type(self, property: &str, tag: &str) -> Self {
        self.push(property, Condition::AttrType, Value::from(tag))
    }

    /// Requests a specific declared index by name.
    pub fn use_index(mut self, index_name: &str) -> Self {
        self.index_name = Some(index_name.to_string());
        self
    }

    fn push(mut self, property: &str, condition: Condition, operand: Value) -> Self {
        self.entries.push(FilterEntry::new(property, condition, operand));
        self
    }

    pub fn entries(&self) -> &[FilterEntry] {
        &self.entries
    }

    pub fn requested_index(&self) -> Option<&str> {
        self.index_name.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Finds the first entry for a property, in caller-supplied order.
    pub fn entry_for(&self, property: &str) -> Option<&FilterEntry> {
        self.entries.iter().find(|e| e.property == property)
    }

    /// Evaluates the whole conjunction against a raw record.
    pub fn matches(&self, record: &Record) -> DocketResult<bool> {
        for entry in &self.entries {
            if !entry.matches(record)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl Display for FilterSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, " AND ")?;
            }
            write!(f, "{}", entry)?;
        }
        Ok(())
    }
}

/// Splits a filter key into its property and condition parts.
pub(crate) fn parse_filter_key(key: &str) -> DocketResult<(String, Condition)> {
    match key.split_once(CONDITION_SEPARATOR) {
        Some((property, suffix)) => Ok((property.to_string(), Condition::parse(suffix)?)),
        None => Ok((key.to_string(), Condition::Eq)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    fn record(pairs: Vec<(&str, Value)>) -> Record {
        let mut record = IndexMap::new();
        for (k, v) in pairs {
            record.insert(k.to_string(), v);
        }
        record
    }

    #[test]
    fn test_parse_filter_key() {
        let (prop, cond) = parse_filter_key("gpa__between").unwrap();
        assert_eq!(prop, "gpa");
        assert_eq!(cond, Condition::Between);

        let (prop, cond) = parse_filter_key("city").unwrap();
        assert_eq!(prop, "city");
        assert_eq!(cond, Condition::Eq);

        assert!(parse_filter_key("city__similar").is_err());
    }

    #[test]
    fn test_entries_keep_caller_order() {
        let spec = FilterSpec::new().eq("city", "X").gt("gpa", 2.0).eq("name", "A");
        let props: Vec<&str> = spec.entries().iter().map(|e| e.property()).collect();
        assert_eq!(props, vec!["city", "gpa", "name"]);
    }

    #[test]
    fn test_conjunction_matches() {
        let spec = FilterSpec::new().eq("city", "X").between("gpa", 2.0, 3.0);
        let hit = record(vec![("city", Value::from("X")), ("gpa", Value::F64(2.5))]);
        let miss = record(vec![("city", Value::from("X")), ("gpa", Value::F64(3.9))]);
        assert!(spec.matches(&hit).unwrap());
        assert!(!spec.matches(&miss).unwrap());
    }

    #[test]
    fn test_attr_not_exists_on_sparse_record() {
        let spec = FilterSpec::new().attr_not_exists("email");
        let sparse = record(vec![("name", Value::from("A"))]);
        assert!(spec.matches(&sparse).unwrap());
    }

    #[test]
    fn test_with_parses_suffix() {
        let spec = FilterSpec::new()
            .with("city", "X")
            .unwrap()
            .with("gpa__gte", 2.0)
            .unwrap();
        assert_eq!(spec.entries()[1].condition(), Condition::Gte);
    }

    #[test]
    fn test_requested_index() {
        let spec = FilterSpec::new().eq("name", "A").use_index("name-index");
        assert_eq!(spec.requested_index(), Some("name-index"));
    }
}
