use crate::common::Value;
use crate::errors::{DocketError, DocketResult, ErrorKind};
use std::fmt::{Display, Formatter};

/// A comparison condition in a filter entry.
///
/// Filter keys carry the condition as a `__suffix` (`"gpa__between"`); a bare
/// key means [Condition::Eq]. Only equality-compatible conditions may drive
/// an index lookup; the rest are legal in filter position only and are
/// evaluated in memory against candidate records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    In,
    Between,
    Begins,
    Contains,
    AttrExists,
    AttrNotExists,
    AttrType,
}

impl Condition {
    /// Parses a condition suffix, e.g. `"between"` from `"gpa__between"`.
    pub fn parse(suffix: &str) -> DocketResult<Condition> {
        match suffix {
            "eq" => Ok(Condition::Eq),
            "ne" => Ok(Condition::Ne),
            "lt" => Ok(Condition::Lt),
            "lte" => Ok(Condition::Lte),
            "gt" => Ok(Condition::Gt),
            "gte" => Ok(Condition::Gte),
            "in" => Ok(Condition::In),
            "between" => Ok(Condition::Between),
            "begins" => Ok(Condition::Begins),
            "contains" => Ok(Condition::Contains),
            "attr_exists" => Ok(Condition::AttrExists),
            "attr_not_exists" => Ok(Condition::AttrNotExists),
            "attr_type" => Ok(Condition::AttrType),
            other => {
                log::error!("{} is not a valid condition", other);
                Err(DocketError::new(
                    &format!("{} not a valid condition", other),
                    ErrorKind::QueryError,
                ))
            }
        }
    }

    /// True for conditions that may drive an index key lookup.
    pub fn is_equality(&self) -> bool {
        matches!(self, Condition::Eq)
    }

    /// Evaluates the condition against a record attribute.
    ///
    /// `attr` is `None` when the record does not carry the attribute at all
    /// (sparse storage), which is what the presence conditions test.
    pub fn matches(&self, attr: Option<&Value>, operand: &Value) -> DocketResult<bool> {
        match self {
            Condition::AttrExists => return Ok(attr.is_some()),
            Condition::AttrNotExists => return Ok(attr.is_none()),
            _ => {}
        }
        let value = match attr {
            Some(v) => v,
            None => return Ok(false),
        };
        match self {
            Condition::Eq => Ok(value == operand),
            Condition::Ne => Ok(value != operand),
            Condition::Lt => Ok(value < operand),
            Condition::Lte => Ok(value <= operand),
            Condition::Gt => Ok(value > operand),
            Condition::Gte => Ok(value >= operand),
            Condition::In => match operand {
                Value::Array(candidates) => Ok(candidates.contains(value)),
                _ => Err(operand_error("in", "a list of values")),
            },
            Condition::Between => match operand {
                Value::Array(bounds) if bounds.len() == 2 => {
                    // inclusive on both ends
                    Ok(&bounds[0] <= value && value <= &bounds[1])
                }
                _ => Err(operand_error("between", "a (low, high) pair")),
            },
            Condition::Begins => match (value, operand) {
                (Value::String(s), Value::String(prefix)) => Ok(s.starts_with(prefix.as_str())),
                _ => Ok(false),
            },
            Condition::Contains => match (value, operand) {
                (Value::String(s), Value::String(needle)) => Ok(s.contains(needle.as_str())),
                (Value::Array(items), needle) => Ok(items.contains(needle)),
                _ => Ok(false),
            },
            Condition::AttrType => match operand {
                Value::String(tag) => Ok(value.storage_type() == tag),
                _ => Err(operand_error("attr_type", "a storage type tag")),
            },
            Condition::AttrExists | Condition::AttrNotExists => unreachable!(),
        }
    }
}

fn operand_error(condition: &str, expected: &str) -> DocketError {
    DocketError::new(
        &format!("{} condition requires {}", condition, expected),
        ErrorKind::QueryError,
    )
}

impl Display for Condition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Condition::Eq => "eq",
            Condition::Ne => "ne",
            Condition::Lt => "lt",
            Condition::Lte => "lte",
            Condition::Gt => "gt",
            Condition::Gte => "gte",
            Condition::In => "in",
            Condition::Between => "between",
            Condition::Begins => "begins",
            Condition::Contains => "contains",
            Condition::AttrExists => "attr_exists",
            Condition::AttrNotExists => "attr_not_exists",
            Condition::AttrType => "attr_type",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_and_unknown() {
        assert_eq!(Condition::parse("lte").unwrap(), Condition::Lte);
        assert!(Condition::parse("like").is_err());
    }

    #[test]
    fn test_between_is_inclusive() {
        let bounds = Value::Array(vec![Value::I64(2), Value::I64(3)]);
        assert!(Condition::Between.matches(Some(&Value::F64(2.0)), &bounds).unwrap());
        assert!(Condition::Between.matches(Some(&Value::F64(2.5)), &bounds).unwrap());
        assert!(Condition::Between.matches(Some(&Value::F64(3.0)), &bounds).unwrap());
        assert!(!Condition::Between.matches(Some(&Value::F64(3.9)), &bounds).unwrap());
    }

    #[test]
    fn test_between_requires_pair() {
        let bad = Value::Array(vec![Value::I64(2)]);
        assert!(Condition::Between.matches(Some(&Value::I64(2)), &bad).is_err());
    }

    #[test]
    fn test_in_membership() {
        let set = Value::Array(vec![Value::from("X"), Value::from("Y")]);
        assert!(Condition::In.matches(Some(&Value::from("X")), &set).unwrap());
        assert!(!Condition::In.matches(Some(&Value::from("Z")), &set).unwrap());
    }

    #[test]
    fn test_presence_conditions_ignore_value() {
        let operand = Value::Null;
        assert!(Condition::AttrExists.matches(Some(&Value::from("x")), &operand).unwrap());
        assert!(!Condition::AttrExists.matches(None, &operand).unwrap());
        assert!(Condition::AttrNotExists.matches(None, &operand).unwrap());
        assert!(!Condition::AttrNotExists.matches(Some(&Value::I64(0)), &operand).unwrap());
    }

    #[test]
    fn test_begins_and_contains() {
        assert!(Condition::Begins
            .matches(Some(&Value::from("Durham")), &Value::from("Dur"))
            .unwrap());
        assert!(Condition::Contains
            .matches(Some(&Value::from("Durham")), &Value::from("urh"))
            .unwrap());
        assert!(!Condition::Contains
            .matches(Some(&Value::from("Durham")), &Value::from("xyz"))
            .unwrap());
    }

    #[test]
    fn test_attr_type_compares_storage_tag() {
        assert!(Condition::AttrType
            .matches(Some(&Value::I64(5)), &Value::from("N"))
            .unwrap());
        assert!(!Condition::AttrType
            .matches(Some(&Value::from("five")), &Value::from("N"))
            .unwrap());
    }

    #[test]
    fn test_missing_attribute_fails_value_conditions() {
        assert!(!Condition::Eq.matches(None, &Value::I64(1)).unwrap());
        assert!(!Condition::Gt.matches(None, &Value::I64(1)).unwrap());
    }
}
