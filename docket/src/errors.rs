use backtrace::Backtrace;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::result::Result;

use crate::common::{atomic, Atomic};

/// Error kinds for Docket operations.
///
/// Each kind describes one category of failure so that callers can decide
/// whether an error is worth retrying. Validation and query errors are never
/// retryable; resource errors may be retried after provisioning.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ErrorKind {
    /// A field value failed validation, or a unique constraint was violated.
    ValidationError,
    /// A filter could not be satisfied by any index, used an unknown
    /// condition, or a get-style query returned zero or more than one result.
    QueryError,
    /// No record exists for the given identifier.
    NotFound,
    /// Backend-level infrastructure problem, e.g. the store was never opened
    /// or the underlying table/collection is missing.
    ResourceError,
    /// Error reported by a storage backend while executing an operation.
    BackendError,
    /// Failed to encode or decode a stored record snapshot.
    EncodingError,
    /// The operation is not valid in the current context.
    InvalidOperation,
    /// Internal error (usually indicates a bug).
    InternalError,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::ValidationError => write!(f, "Validation error"),
            ErrorKind::QueryError => write!(f, "Query error"),
            ErrorKind::NotFound => write!(f, "Not found"),
            ErrorKind::ResourceError => write!(f, "Resource error"),
            ErrorKind::BackendError => write!(f, "Backend error"),
            ErrorKind::EncodingError => write!(f, "Encoding error"),
            ErrorKind::InvalidOperation => write!(f, "Invalid operation"),
            ErrorKind::InternalError => write!(f, "Internal error"),
        }
    }
}

/// Custom Docket error type.
///
/// `DocketError` carries the error message, its [ErrorKind], an optional
/// cause for error chaining, and a backtrace captured at construction time.
///
/// # Examples
///
/// ```rust,ignore
/// use docket::errors::{DocketError, ErrorKind, DocketResult};
///
/// fn example() -> DocketResult<()> {
///     Err(DocketError::new("no such index", ErrorKind::QueryError))
/// }
/// ```
#[derive(Clone)]
pub struct DocketError {
    message: String,
    error_kind: ErrorKind,
    cause: Option<Box<DocketError>>,
    backtrace: Atomic<Backtrace>,
}

impl DocketError {
    /// Creates a new `DocketError` with the specified message and error kind.
    pub fn new(message: &str, error_kind: ErrorKind) -> Self {
        DocketError {
            message: message.to_string(),
            error_kind,
            cause: None,
            backtrace: atomic(Backtrace::new()),
        }
    }

    /// Creates a new `DocketError` with a cause error attached.
    ///
    /// The cause is preserved in the chain and reported by `source()`.
    pub fn new_with_cause(message: &str, error_kind: ErrorKind, cause: DocketError) -> Self {
        DocketError {
            message: message.to_string(),
            error_kind,
            cause: Some(Box::new(cause)),
            backtrace: atomic(Backtrace::new()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.error_kind
    }

    pub fn cause(&self) -> Option<&DocketError> {
        self.cause.as_deref()
    }
}

impl Display for DocketError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Debug for DocketError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "{}\nCaused by: {:?}", self.message, cause),
            None => write!(f, "{}\n{:?}", self.message, self.backtrace.read()),
        }
    }
}

impl Error for DocketError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.cause {
            Some(cause) => Some(cause.as_ref()),
            None => None,
        }
    }
}

/// A result type alias for Docket operations.
///
/// `DocketResult<T>` is shorthand for `Result<T, DocketError>`. All fallible
/// Docket operations return this type.
pub type DocketResult<T> = Result<T, DocketError>;

impl From<serde_json::Error> for DocketError {
    fn from(err: serde_json::Error) -> Self {
        DocketError::new(
            &format!("JSON encoding error: {}", err),
            ErrorKind::EncodingError,
        )
    }
}

impl From<std::num::ParseIntError> for DocketError {
    fn from(err: std::num::ParseIntError) -> Self {
        DocketError::new(
            &format!("Integer parsing error: {}", err),
            ErrorKind::ValidationError,
        )
    }
}

impl From<std::num::ParseFloatError> for DocketError {
    fn from(err: std::num::ParseFloatError) -> Self {
        DocketError::new(
            &format!("Float parsing error: {}", err),
            ErrorKind::ValidationError,
        )
    }
}

impl From<String> for DocketError {
    fn from(msg: String) -> Self {
        DocketError::new(&msg, ErrorKind::InternalError)
    }
}

impl From<&str> for DocketError {
    fn from(msg: &str) -> Self {
        DocketError::new(msg, ErrorKind::InternalError)
    }
}
