use crate::cache::SqliteCache;
use crate::value::{cell_text, scalar_value};
use crate::wrapper::{SqliteAdapterError, SqliteAdapterResult};
use rusqlite::{Batch, Connection, LoadExtensionGuard, OptionalExtension};
use rusqlite::fallible_iterator::FallibleIterator;
use sqlcase::engine::{EngineConnection, ResultTable, ScalarValue, SharedCache};
use sqlcase::errors::SqlCaseResult;

/// One open SQLite database.
pub(crate) struct SqliteConnection {
    conn: Connection,
    path: String,
    entry_point: Option<String>,
}

impl SqliteConnection {
    pub(crate) fn new(conn: Connection, path: &str, entry_point: Option<String>) -> Self {
        SqliteConnection {
            conn,
            path: path.to_string(),
            entry_point,
        }
    }

    /// Runs every statement of `sql` and collects rows the way `sqlite3_get_table`
    /// does: the header comes from the first row-producing statement, statements
    /// without rows add nothing, and a later statement with a different column
    /// count is an error.
    fn collect_table(&self, sql: &str) -> SqliteAdapterResult<ResultTable> {
        let mut table: Option<ResultTable> = None;
        let mut batch = Batch::new(&self.conn, sql);

        while let Some(mut stmt) = batch.next()? {
            let names: Vec<String> = stmt
                .column_names()
                .into_iter()
                .map(String::from)
                .collect();
            let width = names.len();

            let mut rows = stmt.query([])?;
            while let Some(row) = rows.next()? {
                let values = (0..width)
                    .map(|i| row.get_ref(i).map(cell_text))
                    .collect::<Result<Vec<_>, _>>()?;

                let target = table.get_or_insert_with(|| ResultTable::with_header(names.clone()));
                if target.columns() != width {
                    return Err(SqliteAdapterError::IncompatibleQueries);
                }
                target
                    .push_row(values)
                    .map_err(|_| SqliteAdapterError::IncompatibleQueries)?;
            }
        }
        Ok(table.unwrap_or_else(ResultTable::empty))
    }

    /// Runs every statement of `sql`, stepping through and discarding rows.
    fn run_batch(&self, sql: &str) -> SqliteAdapterResult<()> {
        let mut batch = Batch::new(&self.conn, sql);
        while let Some(mut stmt) = batch.next()? {
            let mut rows = stmt.query([])?;
            while rows.next()?.is_some() {}
        }
        Ok(())
    }

    fn load(&self, name: &str) -> SqliteAdapterResult<()> {
        log::debug!("loading extension {} into {}", name, self.path);
        // SAFETY: loading is enabled only for the duration of this call and the
        // extension is a trusted library chosen by whoever configured the run.
        let loaded = unsafe {
            LoadExtensionGuard::new(&self.conn).and_then(|_guard| {
                self.conn
                    .load_extension(name, self.entry_point.as_deref())
            })
        };
        loaded.map_err(|source| SqliteAdapterError::ExtensionLoad {
            name: name.to_string(),
            source,
        })
    }

    fn apply_cache(&self, cache: &SqliteCache) -> SqliteAdapterResult<()> {
        for (name, value) in cache.pragmas() {
            self.run_batch(&format!("PRAGMA {} = {}", name, value))?;
        }
        if let Some(extension) = cache.extension_name() {
            self.load(extension)?;
        }
        cache.record_attach();
        Ok(())
    }
}

impl EngineConnection for SqliteConnection {
    fn get_table(&mut self, sql: &str) -> SqlCaseResult<ResultTable> {
        Ok(self.collect_table(sql)?)
    }

    fn exec(&mut self, sql: &str) -> SqlCaseResult<()> {
        Ok(self.run_batch(sql)?)
    }

    fn query_scalar(&mut self, sql: &str) -> SqlCaseResult<ScalarValue> {
        let value = self
            .conn
            .query_row(sql, [], |row| row.get_ref(0).map(scalar_value))
            .optional()
            .map_err(SqliteAdapterError::from)?;
        Ok(value.unwrap_or(ScalarValue::Null))
    }

    fn attach_cache(&mut self, cache: &SharedCache) -> SqlCaseResult<()> {
        let sqlite_cache = cache
            .downcast_ref::<SqliteCache>()
            .ok_or_else(|| SqliteAdapterError::CacheMismatch(cache.label().to_string()))?;
        Ok(self.apply_cache(sqlite_cache)?)
    }

    fn load_extension(&mut self, name: &str) -> SqlCaseResult<()> {
        Ok(self.load(name)?)
    }

    fn close(self: Box<Self>) -> SqlCaseResult<()> {
        let path = self.path;
        self.conn.close().map_err(|(_, source)| {
            log::error!("failed to close {}: {}", path, source);
            SqliteAdapterError::from(source)
        })?;
        Ok(())
    }
}
