//! Typed field descriptors for document schemas.
//!
//! A [Property] declares how one attribute of a document type is validated,
//! coerced to its native form, rendered for storage, and whether it takes
//! part in indexing or uniqueness enforcement. The query planner and the
//! backends consume properties only through this contract.

use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::common::{current_time_string, Value, TYPE_TAG_NUMBER, TYPE_TAG_STRING};
use crate::errors::{DocketError, DocketResult, ErrorKind};

static SLUG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-a-zA-Z0-9_]+$").unwrap());
static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[a-zA-Z]{2,}$").unwrap());

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMATS: [&str; 3] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
];

/// The serialization kind of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    /// Free-form text.
    Char,
    /// Text restricted to letters, digits, hyphens, and underscores.
    Slug,
    /// An e-mail address.
    Email,
    /// A signed 64-bit integer.
    Integer,
    /// A floating point number, stored as an exact decimal.
    Float,
    /// A boolean flag.
    Boolean,
    /// A calendar date, stored as ISO-8601 text.
    Date,
    /// A date and time, stored as ISO-8601 text.
    DateTime,
}

/// Index key type of a property's declared index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyType {
    /// Hash-only key, equality lookups.
    #[default]
    Hash,
    /// Hash plus range key.
    HashRange,
}

/// A typed, validated, index-eligible field descriptor.
///
/// Built with fluent constructors in declaration position:
///
/// ```rust,ignore
/// let name = Property::char().required().unique().global_index();
/// let gpa = Property::float().indexed();
/// ```
#[derive(Debug, Clone)]
pub struct Property {
    kind: PropertyKind,
    required: bool,
    unique: bool,
    index: bool,
    global_index: bool,
    index_name: Option<String>,
    key_type: KeyType,
    default_value: Option<Value>,
    auto_now: bool,
    auto_now_add: bool,
}

impl Property {
    fn new(kind: PropertyKind, required: bool) -> Self {
        Property {
            kind,
            required,
            unique: false,
            index: false,
            global_index: false,
            index_name: None,
            key_type: KeyType::Hash,
            default_value: None,
            auto_now: false,
            auto_now_add: false,
        }
    }

    pub fn char() -> Self {
        Property::new(PropertyKind::Char, false)
    }

    pub fn slug() -> Self {
        Property::new(PropertyKind::Slug, false)
    }

    pub fn email() -> Self {
        Property::new(PropertyKind::Email, false)
    }

    pub fn integer() -> Self {
        Property::new(PropertyKind::Integer, false)
    }

    pub fn float() -> Self {
        Property::new(PropertyKind::Float, false)
    }

    pub fn boolean() -> Self {
        Property::new(PropertyKind::Boolean, false)
    }

    // date and datetime properties are required by default, matching the
    // usual schema shape for timestamp fields
    pub fn date() -> Self {
        Property::new(PropertyKind::Date, true)
    }

    pub fn datetime() -> Self {
        Property::new(PropertyKind::DateTime, true)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Marks the property as locally indexed (usable only alongside the
    /// primary key path).
    pub fn indexed(mut self) -> Self {
        self.index = true;
        self
    }

    /// Marks the property as globally indexed. Global indexes are always
    /// hash-keyed.
    pub fn global_index(mut self) -> Self {
        self.global_index = true;
        self.key_type = KeyType::Hash;
        self
    }

    /// Overrides the default `{property}-index` index name.
    pub fn index_name(mut self, name: &str) -> Self {
        self.index_name = Some(name.to_string());
        self
    }

    pub fn key_type(mut self, key_type: KeyType) -> Self {
        if !self.global_index {
            self.key_type = key_type;
        }
        self
    }

    pub fn default_value<T: Into<Value>>(mut self, value: T) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// Stamps the current date/datetime on every write.
    pub fn auto_now(mut self) -> Self {
        self.auto_now = true;
        self
    }

    /// Stamps the current date/datetime on first write only.
    pub fn auto_now_add(mut self) -> Self {
        self.auto_now_add = true;
        self
    }

    pub fn kind(&self) -> PropertyKind {
        self.kind
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    pub fn is_index(&self) -> bool {
        self.index
    }

    pub fn is_global_index(&self) -> bool {
        self.global_index
    }

    pub fn declared_index_name(&self) -> Option<&str> {
        self.index_name.as_deref()
    }

    pub fn index_key_type(&self) -> KeyType {
        self.key_type
    }

    /// True when any index structure must be maintained for this property:
    /// a local index, a global index, or the implicit uniqueness index.
    pub fn is_index_eligible(&self) -> bool {
        self.index || self.global_index || self.unique
    }

    /// Returns the backend-level storage type tag for this property.
    pub fn storage_type(&self) -> &'static str {
        match self.kind {
            PropertyKind::Integer | PropertyKind::Float => TYPE_TAG_NUMBER,
            _ => TYPE_TAG_STRING,
        }
    }

    /// Returns the automatic timestamp for this write, when the property is
    /// an auto-now date/datetime. `first_write` distinguishes `auto_now_add`.
    pub fn auto_stamp(&self, first_write: bool) -> Option<Value> {
        if !matches!(self.kind, PropertyKind::Date | PropertyKind::DateTime) {
            return None;
        }
        if self.auto_now || (self.auto_now_add && first_write) {
            let now = match self.kind {
                PropertyKind::Date => chrono::Local::now().format(DATE_FORMAT).to_string(),
                _ => current_time_string(),
            };
            Some(Value::String(now))
        } else {
            None
        }
    }

    /// Validates a raw value for this property.
    ///
    /// Checks the required flag and that the raw value coerces to the
    /// property's native form. Fails with a `ValidationError` naming the
    /// property.
    pub fn validate(&self, value: Option<&Value>, name: &str) -> DocketResult<()> {
        let absent = value.map(Value::is_empty).unwrap_or(true);
        if absent {
            if self.required
                && self.default_value.is_none()
                && !self.auto_now
                && !self.auto_now_add
            {
                return Err(DocketError::new(
                    &format!("{} is required", name),
                    ErrorKind::ValidationError,
                ));
            }
            return Ok(());
        }
        self.to_native_named(value, name).map(|_| ())
    }

    /// Coerces a raw value to the property's native [Value] form.
    ///
    /// Absent values resolve to the declared default, or `Value::Null`.
    pub fn to_native(&self, value: Option<&Value>) -> DocketResult<Value> {
        self.to_native_named(value, "value")
    }

    fn to_native_named(&self, value: Option<&Value>, name: &str) -> DocketResult<Value> {
        let raw = match value {
            Some(v) if !v.is_empty() => v,
            _ => {
                return Ok(self.default_value.clone().unwrap_or(Value::Null));
            }
        };
        let invalid = |detail: &str| {
            DocketError::new(
                &format!("{} is not a valid {}", name, detail),
                ErrorKind::ValidationError,
            )
        };
        match self.kind {
            PropertyKind::Char => Ok(Value::String(raw.to_string())),
            PropertyKind::Slug => {
                let s = raw.to_string();
                if SLUG_RE.is_match(&s) {
                    Ok(Value::String(s))
                } else {
                    Err(invalid("slug"))
                }
            }
            PropertyKind::Email => {
                let s = raw.to_string();
                if EMAIL_RE.is_match(&s) {
                    Ok(Value::String(s))
                } else {
                    Err(invalid("email address"))
                }
            }
            PropertyKind::Integer => match raw {
                Value::I64(i) => Ok(Value::I64(*i)),
                Value::Decimal(d) if d.fract().is_zero() => {
                    match rust_decimal::prelude::ToPrimitive::to_i64(d) {
                        Some(i) => Ok(Value::I64(i)),
                        None => Err(invalid("integer")),
                    }
                }
                Value::String(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(Value::I64)
                    .map_err(|_| invalid("integer")),
                _ => Err(invalid("integer")),
            },
            PropertyKind::Float => match raw {
                Value::F64(f) => Ok(Value::F64(*f)),
                Value::I64(i) => Ok(Value::F64(*i as f64)),
                Value::Decimal(d) => Ok(Value::Decimal(*d)),
                Value::String(s) => Decimal::from_str(s.trim())
                    .map(Value::Decimal)
                    .map_err(|_| invalid("number")),
                _ => Err(invalid("number")),
            },
            PropertyKind::Boolean => match raw {
                Value::Bool(b) => Ok(Value::Bool(*b)),
                Value::String(s) => match s.trim().to_lowercase().as_str() {
                    "true" | "1" => Ok(Value::Bool(true)),
                    "false" | "0" => Ok(Value::Bool(false)),
                    _ => Err(invalid("boolean")),
                },
                _ => Err(invalid("boolean")),
            },
            PropertyKind::Date => match raw {
                Value::String(s) => NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
                    .map(|d| Value::String(d.format(DATE_FORMAT).to_string()))
                    .map_err(|_| invalid("date")),
                _ => Err(invalid("date")),
            },
            PropertyKind::DateTime => match raw {
                Value::String(s) => {
                    let trimmed = s.trim();
                    for fmt in DATETIME_FORMATS {
                        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
                            return Ok(Value::String(
                                dt.format("%Y-%m-%d %H:%M:%S%.6f").to_string(),
                            ));
                        }
                    }
                    Err(invalid("datetime"))
                }
                _ => Err(invalid("datetime")),
            },
        }
    }

    /// Converts a native value to its storage representation.
    ///
    /// Floats become exact decimals parsed from their shortest round-trip
    /// rendering, so every backend persists identical digits.
    pub fn to_storage(&self, native: &Value) -> Value {
        match (self.kind, native) {
            (PropertyKind::Float, Value::F64(f)) => Decimal::from_str(&format!("{}", f))
                .map(Value::Decimal)
                .unwrap_or(Value::F64(*f)),
            _ => native.clone(),
        }
    }
}
