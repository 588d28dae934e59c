use sqlcase::engine::SharedCache;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Connection state shared by every handle of a run, owned by the caller.
///
/// Attaching it to a connection applies its pragmas and loads its extension,
/// if any. Wrap it with [`SqliteCache::shared`] before handing it to the
/// runner.
///
/// # Examples
///
/// ```rust,ignore
/// let cache = SqliteCache::new("spatial")
///     .pragma("foreign_keys", "ON")
///     .shared();
/// let runner = SuiteRunner::new(engine, Some(cache), config);
/// ```
#[derive(Debug, Default)]
pub struct SqliteCache {
    label: String,
    pragmas: Vec<(String, String)>,
    extension: Option<String>,
    attached: AtomicUsize,
}

impl SqliteCache {
    pub fn new(label: &str) -> SqliteCache {
        SqliteCache {
            label: label.to_string(),
            ..SqliteCache::default()
        }
    }

    pub fn pragma(mut self, name: &str, value: &str) -> Self {
        self.pragmas.push((name.to_string(), value.to_string()));
        self
    }

    pub fn extension(mut self, name: &str) -> Self {
        self.extension = Some(name.to_string());
        self
    }

    pub fn shared(self) -> SharedCache {
        let label = self.label.clone();
        SharedCache::new(&label, self)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn pragmas(&self) -> &[(String, String)] {
        &self.pragmas
    }

    pub fn extension_name(&self) -> Option<&str> {
        self.extension.as_deref()
    }

    /// Number of connections this cache was attached to.
    pub fn attached(&self) -> usize {
        self.attached.load(Ordering::Relaxed)
    }

    pub(crate) fn record_attach(&self) {
        self.attached.fetch_add(1, Ordering::Relaxed);
    }
}
