use crate::errors::{ErrorKind, SqlCaseError, SqlCaseResult};
use std::any::Any;
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;

/// How a database file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    ReadOnly,
    /// Read-write, creating the file when absent.
    ReadWriteCreate,
}

impl Display for OpenMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OpenMode::ReadOnly => write!(f, "read-only"),
            OpenMode::ReadWriteCreate => write!(f, "read-write"),
        }
    }
}

/// Text table produced by running a statement.
///
/// Cells are row-major and start with one header row holding the column names,
/// so `cells.len() == (rows + 1) * columns`. A statement that yields no row
/// reports a `0 x 0` table with no header, like SQLite's `get_table` API.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResultTable {
    rows: usize,
    columns: usize,
    cells: Vec<Option<String>>,
}

impl ResultTable {
    pub fn empty() -> ResultTable {
        ResultTable::default()
    }

    /// Starts a table whose header row is `names`.
    pub fn with_header<I, S>(names: I) -> ResultTable
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let cells: Vec<Option<String>> = names.into_iter().map(|n| Some(n.into())).collect();
        ResultTable {
            rows: 0,
            columns: cells.len(),
            cells,
        }
    }

    /// Builds a table from raw parts, checking the cell count.
    pub fn from_parts(
        rows: usize,
        columns: usize,
        cells: Vec<Option<String>>,
    ) -> SqlCaseResult<ResultTable> {
        if cells.len() != (rows + 1) * columns && !(columns == 0 && cells.is_empty()) {
            return Err(SqlCaseError::new(
                &format!(
                    "result table {}x{} cannot hold {} cells",
                    rows,
                    columns,
                    cells.len()
                ),
                ErrorKind::InternalError,
            ));
        }
        Ok(ResultTable {
            rows,
            columns,
            cells,
        })
    }

    /// Appends one data row. The row must be as wide as the header.
    pub fn push_row(&mut self, row: Vec<Option<String>>) -> SqlCaseResult<()> {
        if row.len() != self.columns {
            return Err(SqlCaseError::new(
                &format!(
                    "row has {} values but the table has {} columns",
                    row.len(),
                    self.columns
                ),
                ErrorKind::InternalError,
            ));
        }
        self.cells.extend(row);
        self.rows += 1;
        Ok(())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Cell `index` in row-major order, header included. `None` inside means NULL.
    pub fn cell(&self, index: usize) -> Option<Option<&str>> {
        self.cells.get(index).map(|c| c.as_deref())
    }

    pub fn cells(&self) -> &[Option<String>] {
        &self.cells
    }
}

/// First column of the first row of a probe statement.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl ScalarValue {
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            ScalarValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ScalarValue::Text(v) => Some(v),
            _ => None,
        }
    }
}

/// Engine-level cache owned outside the connection manager.
///
/// Handing one to the manager transfers nothing: the caller keeps ownership and
/// the manager never tears down engine runtime state while a cache is present.
/// The payload is engine specific and recovered with [`SharedCache::downcast_ref`].
#[derive(Clone)]
pub struct SharedCache {
    label: String,
    inner: Arc<dyn Any + Send + Sync>,
}

impl SharedCache {
    pub fn new<T: Any + Send + Sync>(label: &str, payload: T) -> SharedCache {
        SharedCache {
            label: label.to_string(),
            inner: Arc::new(payload),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    /// Number of live clones of this cache handle.
    pub fn holders(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}

impl Debug for SharedCache {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedCache")
            .field("label", &self.label)
            .field("holders", &self.holders())
            .finish()
    }
}

/// A live handle to one database.
///
/// Errors returned by [`EngineConnection::get_table`] carry the engine's own error
/// text as their message; expected-failure cases compare against it verbatim.
pub trait EngineConnection: Send {
    /// Runs `sql` (possibly several statements) and collects a text table.
    fn get_table(&mut self, sql: &str) -> SqlCaseResult<ResultTable>;

    /// Runs `sql`, discarding any rows.
    fn exec(&mut self, sql: &str) -> SqlCaseResult<()>;

    /// Returns the first column of the first row, or `Null` when no row comes back.
    fn query_scalar(&mut self, sql: &str) -> SqlCaseResult<ScalarValue>;

    /// Binds an externally owned cache to this handle.
    fn attach_cache(&mut self, cache: &SharedCache) -> SqlCaseResult<()>;

    /// Loads a dynamic extension by name or path.
    fn load_extension(&mut self, name: &str) -> SqlCaseResult<()>;

    fn close(self: Box<Self>) -> SqlCaseResult<()>;
}

/// Contract every database engine implementation follows.
///
/// Besides opening handles, an engine owns process-wide runtime state that is
/// set up before opening a handle without a shared cache and released when that
/// handle closes. Implementations reference-count it.
pub trait SqlEngineProvider: Send + Sync {
    /// Human-readable engine name and version for logs.
    fn name(&self) -> String;

    fn open(&self, path: &str, mode: OpenMode) -> SqlCaseResult<Box<dyn EngineConnection>>;

    fn acquire_runtime(&self) -> SqlCaseResult<()>;

    fn release_runtime(&self);
}

/// Cloneable handle over any [`SqlEngineProvider`].
#[derive(Clone)]
pub struct SqlEngine {
    inner: Arc<dyn SqlEngineProvider>,
}

impl SqlEngine {
    pub fn new<T: SqlEngineProvider + 'static>(provider: T) -> SqlEngine {
        SqlEngine {
            inner: Arc::new(provider),
        }
    }

    pub fn name(&self) -> String {
        self.inner.name()
    }

    pub fn open(&self, path: &str, mode: OpenMode) -> SqlCaseResult<Box<dyn EngineConnection>> {
        self.inner.open(path, mode)
    }

    pub fn acquire_runtime(&self) -> SqlCaseResult<()> {
        self.inner.acquire_runtime()
    }

    pub fn release_runtime(&self) {
        self.inner.release_runtime()
    }
}
