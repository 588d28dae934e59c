use std::time::Duration;

/// Settings applied to every connection the SQLite engine opens.
///
/// Create via [`SqliteConfig::new`] or through `SqliteEngine::with_config()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteConfig {
    busy_timeout: Duration,
    statement_cache_capacity: usize,
    extension_entry_point: Option<String>,
    runtime_extension: Option<String>,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        SqliteConfig {
            busy_timeout: Duration::from_secs(5),
            statement_cache_capacity: 16,
            extension_entry_point: None,
            runtime_extension: None,
        }
    }
}

impl SqliteConfig {
    pub fn new() -> SqliteConfig {
        SqliteConfig::default()
    }

    /// How long a statement waits on a locked database before failing.
    #[inline]
    pub fn busy_timeout(&self) -> Duration {
        self.busy_timeout
    }

    #[inline]
    pub fn set_busy_timeout(&mut self, timeout: Duration) {
        self.busy_timeout = timeout;
    }

    /// Prepared statements kept per connection.
    #[inline]
    pub fn statement_cache_capacity(&self) -> usize {
        self.statement_cache_capacity
    }

    #[inline]
    pub fn set_statement_cache_capacity(&mut self, capacity: usize) {
        self.statement_cache_capacity = capacity;
    }

    /// Entry point passed to the extension loader; `None` lets SQLite derive it
    /// from the file name.
    #[inline]
    pub fn extension_entry_point(&self) -> Option<&str> {
        self.extension_entry_point.as_deref()
    }

    #[inline]
    pub fn set_extension_entry_point(&mut self, entry_point: Option<String>) {
        self.extension_entry_point = entry_point;
    }

    /// Extension loaded into every connection opened while the engine runtime
    /// is held. Plays the role of a statically registered extension.
    #[inline]
    pub fn runtime_extension(&self) -> Option<&str> {
        self.runtime_extension.as_deref()
    }

    #[inline]
    pub fn set_runtime_extension(&mut self, extension: Option<String>) {
        self.runtime_extension = extension;
    }
}
