use crate::config::SqliteConfig;
use crate::connection::SqliteConnection;
use crate::version::rusqlite_version;
use crate::wrapper::SqliteAdapterError;
use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags};
use sqlcase::engine::{EngineConnection, OpenMode, SqlEngine, SqlEngineProvider};
use sqlcase::errors::SqlCaseResult;
use std::sync::Arc;
use std::time::Duration;

/// SQLite engine backed by `rusqlite` with the bundled library.
///
/// Cloning shares the runtime reference count, so every clone sees the same
/// acquire/release balance.
///
/// # Examples
///
/// ```rust,ignore
/// use sqlcase_sqlite_adapter::SqliteEngine;
///
/// let engine = SqliteEngine::with_config()
///     .busy_timeout(Duration::from_secs(1))
///     .build();
/// let runner = SuiteRunner::new(engine.into_engine(), None, config);
/// ```
#[derive(Clone)]
pub struct SqliteEngine {
    inner: Arc<SqliteEngineInner>,
}

struct SqliteEngineInner {
    config: SqliteConfig,
    runtime_refs: Mutex<usize>,
}

impl SqliteEngine {
    pub fn new(config: SqliteConfig) -> SqliteEngine {
        SqliteEngine {
            inner: Arc::new(SqliteEngineInner {
                config,
                runtime_refs: Mutex::new(0),
            }),
        }
    }

    /// Starts a builder seeded with the default configuration.
    pub fn with_config() -> SqliteEngineBuilder {
        SqliteEngineBuilder::new()
    }

    pub fn config(&self) -> &SqliteConfig {
        &self.inner.config
    }

    /// Outstanding runtime acquisitions.
    pub fn runtime_refs(&self) -> usize {
        *self.inner.runtime_refs.lock()
    }

    /// Version of the linked SQLite library.
    pub fn sqlite_version(&self) -> &'static str {
        rusqlite::version()
    }

    pub fn into_engine(self) -> SqlEngine {
        SqlEngine::new(self)
    }

    fn flags(mode: OpenMode) -> OpenFlags {
        match mode {
            OpenMode::ReadOnly => OpenFlags::SQLITE_OPEN_READ_ONLY,
            OpenMode::ReadWriteCreate => {
                OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE
            }
        }
    }

    fn open_connection(&self, path: &str, mode: OpenMode) -> SqlCaseResult<SqliteConnection> {
        let config = &self.inner.config;
        let conn = Connection::open_with_flags(path, Self::flags(mode)).map_err(|source| {
            SqliteAdapterError::Open {
                path: path.to_string(),
                source,
            }
        })?;
        conn.busy_timeout(config.busy_timeout())
            .map_err(SqliteAdapterError::from)?;
        conn.set_prepared_statement_cache_capacity(config.statement_cache_capacity());

        let mut connection = SqliteConnection::new(
            conn,
            path,
            config.extension_entry_point().map(str::to_string),
        );
        if let Some(extension) = config.runtime_extension() {
            if self.runtime_refs() > 0 {
                connection.load_extension(extension)?;
            }
        }
        Ok(connection)
    }
}

impl SqlEngineProvider for SqliteEngine {
    fn name(&self) -> String {
        match rusqlite_version() {
            Ok(binding) => format!("SQLite {} (rusqlite {})", rusqlite::version(), binding),
            Err(err) => {
                log::warn!("cannot read rusqlite version: {}", err);
                format!("SQLite {}", rusqlite::version())
            }
        }
    }

    fn open(&self, path: &str, mode: OpenMode) -> SqlCaseResult<Box<dyn EngineConnection>> {
        let connection = self.open_connection(path, mode)?;
        log::debug!("sqlite opened {} ({})", path, mode);
        Ok(Box::new(connection))
    }

    fn acquire_runtime(&self) -> SqlCaseResult<()> {
        let mut refs = self.inner.runtime_refs.lock();
        if *refs == 0 {
            log::debug!("sqlite runtime initialized");
        }
        *refs += 1;
        Ok(())
    }

    fn release_runtime(&self) {
        let mut refs = self.inner.runtime_refs.lock();
        match *refs {
            0 => log::warn!("sqlite runtime released more often than acquired"),
            1 => {
                *refs = 0;
                log::debug!("sqlite runtime cleaned up");
            }
            _ => *refs -= 1,
        }
    }
}

impl From<SqliteEngine> for SqlEngine {
    fn from(engine: SqliteEngine) -> Self {
        engine.into_engine()
    }
}

/// Fluent builder for [`SqliteEngine`].
pub struct SqliteEngineBuilder {
    config: SqliteConfig,
}

impl SqliteEngineBuilder {
    fn new() -> Self {
        SqliteEngineBuilder {
            config: SqliteConfig::new(),
        }
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.config.set_busy_timeout(timeout);
        self
    }

    pub fn statement_cache_capacity(mut self, capacity: usize) -> Self {
        self.config.set_statement_cache_capacity(capacity);
        self
    }

    pub fn extension_entry_point(mut self, entry_point: &str) -> Self {
        self.config.set_extension_entry_point(Some(entry_point.to_string()));
        self
    }

    /// Extension loaded into connections opened while the runtime is held.
    pub fn runtime_extension(mut self, extension: &str) -> Self {
        self.config.set_runtime_extension(Some(extension.to_string()));
        self
    }

    pub fn build(self) -> SqliteEngine {
        SqliteEngine::new(self.config)
    }
}
