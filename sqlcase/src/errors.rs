use backtrace::Backtrace;
use parking_lot::Mutex;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::result::Result;
use std::sync::Arc;

/// Error kinds for test-case execution.
///
/// Every kind maps to a fixed negative status code (see [`ErrorKind::status_code`]).
/// The codes exist for a human reading a CI log; callers branch on the kind itself.
///
/// # Examples
///
/// ```rust,ignore
/// use sqlcase::errors::{SqlCaseError, ErrorKind, SqlCaseResult};
///
/// fn example() -> SqlCaseResult<()> {
///     Err(SqlCaseError::new("bad result: 2/1", ErrorKind::ShapeMismatch))
/// }
/// ```
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum ErrorKind {
    // Case file errors
    /// The case file is truncated or malformed
    ParseError,
    /// The case file or a suite directory could not be read
    IOError,

    // Connection errors
    /// The database could not be opened or closed
    ConnectionError,
    /// Spatial metadata / stored procedure initialization failed
    InitError,
    /// The dynamic extension could not be loaded
    ExtensionError,

    // Comparison errors
    /// SQL execution failed and the case did not declare that failure
    ExecutionError,
    /// Row or column count differs from the declared shape
    ShapeMismatch,
    /// The engine returned NULL where a value was expected
    UnexpectedNull,
    /// The engine returned an empty string
    UnexpectedEmpty,
    /// A cell differs from its expected value
    ValueMismatch,

    // Runner errors
    /// A suite directory or its fixture could not be prepared
    SuiteError,
    /// The operation is not valid in the current state
    InvalidOperation,
    /// Internal error (usually indicates a bug)
    InternalError,
}

impl ErrorKind {
    /// Returns the negative status code reported for this kind of failure.
    pub fn status_code(&self) -> i32 {
        match self {
            ErrorKind::ConnectionError => -1,
            ErrorKind::InitError => -2,
            ErrorKind::ExtensionError => -3,
            ErrorKind::SuiteError => -4,
            ErrorKind::ParseError | ErrorKind::IOError => -5,
            ErrorKind::InvalidOperation | ErrorKind::InternalError => -6,
            ErrorKind::ExecutionError => -10,
            ErrorKind::ShapeMismatch => -11,
            ErrorKind::UnexpectedNull => -12,
            ErrorKind::UnexpectedEmpty => -13,
            ErrorKind::ValueMismatch => -14,
        }
    }

    /// True for the kinds produced by comparing a result against a case.
    pub fn is_comparison_failure(&self) -> bool {
        matches!(
            self,
            ErrorKind::ExecutionError
                | ErrorKind::ShapeMismatch
                | ErrorKind::UnexpectedNull
                | ErrorKind::UnexpectedEmpty
                | ErrorKind::ValueMismatch
        )
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::ParseError => write!(f, "Parse error"),
            ErrorKind::IOError => write!(f, "IO error"),
            ErrorKind::ConnectionError => write!(f, "Connection error"),
            ErrorKind::InitError => write!(f, "Initialization error"),
            ErrorKind::ExtensionError => write!(f, "Extension error"),
            ErrorKind::ExecutionError => write!(f, "Execution error"),
            ErrorKind::ShapeMismatch => write!(f, "Shape mismatch"),
            ErrorKind::UnexpectedNull => write!(f, "Unexpected NULL"),
            ErrorKind::UnexpectedEmpty => write!(f, "Unexpected empty value"),
            ErrorKind::ValueMismatch => write!(f, "Value mismatch"),
            ErrorKind::SuiteError => write!(f, "Suite error"),
            ErrorKind::InvalidOperation => write!(f, "Invalid operation"),
            ErrorKind::InternalError => write!(f, "Internal error"),
        }
    }
}

/// Error type shared by every crate of the runner.
///
/// Carries a message, an [`ErrorKind`], an optional cause and a backtrace captured
/// unresolved at construction; symbols are resolved only when the error is printed
/// with `{:?}`.
#[derive(Clone)]
pub struct SqlCaseError {
    message: String,
    error_kind: ErrorKind,
    cause: Option<Box<SqlCaseError>>,
    backtrace: Arc<Mutex<Backtrace>>,
}

impl SqlCaseError {
    /// Creates a new error with the specified message and kind.
    pub fn new(message: &str, error_kind: ErrorKind) -> Self {
        SqlCaseError {
            message: message.to_string(),
            error_kind,
            cause: None,
            backtrace: Arc::new(Mutex::new(Backtrace::new_unresolved())),
        }
    }

    /// Creates a new error wrapping `cause`.
    pub fn new_with_cause(message: &str, error_kind: ErrorKind, cause: SqlCaseError) -> Self {
        SqlCaseError {
            message: message.to_string(),
            error_kind,
            cause: Some(Box::new(cause)),
            backtrace: Arc::new(Mutex::new(Backtrace::new_unresolved())),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.error_kind
    }

    pub fn cause(&self) -> Option<&SqlCaseError> {
        self.cause.as_deref()
    }

    /// Shorthand for `self.kind().status_code()`.
    pub fn status_code(&self) -> i32 {
        self.error_kind.status_code()
    }
}

impl Display for SqlCaseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Debug for SqlCaseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.cause {
            Some(cause) => write!(
                f,
                "{}: {}\nCaused by: {:?}",
                self.error_kind, self.message, cause
            ),
            None => {
                let mut backtrace = self.backtrace.lock();
                backtrace.resolve();
                write!(f, "{}: {}\n{:?}", self.error_kind, self.message, *backtrace)
            }
        }
    }
}

impl Error for SqlCaseError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.cause {
            Some(cause) => Some(cause.as_ref()),
            None => None,
        }
    }
}

/// `SqlCaseResult<T>` is shorthand for `Result<T, SqlCaseError>`.
pub type SqlCaseResult<T> = Result<T, SqlCaseError>;

impl From<std::io::Error> for SqlCaseError {
    fn from(err: std::io::Error) -> Self {
        SqlCaseError::new(&format!("IO error: {}", err), ErrorKind::IOError)
    }
}
