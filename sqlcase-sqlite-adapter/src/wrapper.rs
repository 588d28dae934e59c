use sqlcase::errors::{ErrorKind, SqlCaseError};
use thiserror::Error;

/// Message SQLite's `get_table` API reports when statements of one batch
/// disagree on their column count.
pub const INCOMPATIBLE_QUERIES: &str =
    "sqlite3_get_table() called with two or more incompatible queries";

/// Error type for the SQLite adapter.
///
/// The `Display` text of [`SqliteAdapterError::Sqlite`] is the engine's own
/// message, which is what expected-failure cases compare against.
#[derive(Error, Debug)]
pub enum SqliteAdapterError {
    /// The database file could not be opened
    #[error("{}", engine_message(.source))]
    Open {
        path: String,
        #[source]
        source: rusqlite::Error,
    },
    /// A statement failed to prepare or step
    #[error("{}", engine_message(.0))]
    Sqlite(#[from] rusqlite::Error),
    /// Statements of one batch returned different column counts
    #[error("{}", INCOMPATIBLE_QUERIES)]
    IncompatibleQueries,
    /// A dynamic extension could not be loaded
    #[error("{}", engine_message(.source))]
    ExtensionLoad {
        name: String,
        #[source]
        source: rusqlite::Error,
    },
    /// The shared cache handed to a connection was not built by this adapter
    #[error("shared cache '{0}' is not a SQLite cache")]
    CacheMismatch(String),
}

/// The bare message SQLite reported, without the statement text and offset
/// rusqlite appends to input errors.
pub(crate) fn engine_message(err: &rusqlite::Error) -> String {
    match err {
        rusqlite::Error::SqliteFailure(_, Some(message)) => message.clone(),
        rusqlite::Error::SqlInputError { msg, .. } => msg.clone(),
        other => other.to_string(),
    }
}

/// Result type for SQLite adapter operations.
pub type SqliteAdapterResult<T> = Result<T, SqliteAdapterError>;

impl From<SqliteAdapterError> for SqlCaseError {
    /// Maps adapter failures onto core error kinds, keeping the engine text as
    /// the message.
    fn from(err: SqliteAdapterError) -> Self {
        let kind = match &err {
            SqliteAdapterError::Open { .. } => ErrorKind::ConnectionError,
            SqliteAdapterError::Sqlite(_) | SqliteAdapterError::IncompatibleQueries => {
                ErrorKind::ExecutionError
            }
            SqliteAdapterError::ExtensionLoad { .. } => ErrorKind::ExtensionError,
            SqliteAdapterError::CacheMismatch(_) => ErrorKind::InvalidOperation,
        };
        SqlCaseError::new(&err.to_string(), kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::ffi;

    fn failure(message: &str) -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(
            ffi::Error::new(ffi::SQLITE_ERROR),
            Some(message.to_string()),
        )
    }

    #[test]
    fn test_sqlite_error_keeps_engine_message() {
        let err: SqlCaseError = SqliteAdapterError::from(failure("no such table: t")).into();
        assert_eq!(err.message(), "no such table: t");
        assert_eq!(err.kind(), &ErrorKind::ExecutionError);
    }

    #[test]
    fn test_incompatible_queries_message() {
        let err: SqlCaseError = SqliteAdapterError::IncompatibleQueries.into();
        assert_eq!(err.message(), INCOMPATIBLE_QUERIES);
        assert_eq!(err.status_code(), -10);
    }

    #[test]
    fn test_kinds_follow_variant() {
        let open: SqlCaseError = SqliteAdapterError::Open {
            path: "x.sqlite".to_string(),
            source: failure("unable to open database file"),
        }
        .into();
        assert_eq!(open.kind(), &ErrorKind::ConnectionError);
        assert_eq!(open.message(), "unable to open database file");

        let ext: SqlCaseError = SqliteAdapterError::ExtensionLoad {
            name: "mod_x".to_string(),
            source: failure("mod_x.so: cannot open shared object file"),
        }
        .into();
        assert_eq!(ext.kind(), &ErrorKind::ExtensionError);

        let cache: SqlCaseError = SqliteAdapterError::CacheMismatch("other".to_string()).into();
        assert_eq!(cache.kind(), &ErrorKind::InvalidOperation);
        assert_eq!(cache.message(), "shared cache 'other' is not a SQLite cache");
    }
}
