use crate::engine::{EngineConnection, OpenMode, ScalarValue, SharedCache, SqlEngine};
use crate::errors::{ErrorKind, SqlCaseError, SqlCaseResult};
use crate::suite::{Capabilities, Capability, Library, LibraryVersion};

/// Single-value SQL checks over a dedicated in-memory connection.
///
/// Used to detect what the engine supports before picking suites, and by
/// hand-written checker programs that assert one value at a time.
///
/// # Examples
///
/// ```rust,ignore
/// let mut probe = Probe::open(&engine, None, Some("mod_spatialite"))?;
/// if probe.check("SELECT HasGeos()")? {
///     let version = probe.check_text("SELECT geos_version()");
/// }
/// probe.close()?;
/// ```
pub struct Probe {
    engine: SqlEngine,
    handle: Option<Box<dyn EngineConnection>>,
    holds_runtime: bool,
}

impl Probe {
    /// Opens a fresh `:memory:` database, bound to `cache` when given and with
    /// `extension` loaded when given.
    pub fn open(
        engine: &SqlEngine,
        cache: Option<&SharedCache>,
        extension: Option<&str>,
    ) -> SqlCaseResult<Probe> {
        let holds_runtime = cache.is_none() && extension.is_none();
        if holds_runtime {
            engine.acquire_runtime()?;
        }

        // Built before the open so a failure below still releases the runtime on drop.
        let mut probe = Probe {
            engine: engine.clone(),
            handle: None,
            holds_runtime,
        };

        let mut handle = engine.open(":memory:", OpenMode::ReadWriteCreate)?;
        let prepared = cache
            .map_or(Ok(()), |cache| handle.attach_cache(cache))
            .and_then(|_| match extension {
                Some(name) => handle.load_extension(name).map_err(|err| {
                    SqlCaseError::new_with_cause(
                        &format!("load_extension() error: {}", err.message()),
                        ErrorKind::ExtensionError,
                        err,
                    )
                }),
                None => Ok(()),
            });

        probe.handle = Some(handle);
        prepared?;
        Ok(probe)
    }

    /// True when the first column of the first row is the integer `1`.
    pub fn check(&mut self, sql: &str) -> SqlCaseResult<bool> {
        let value = self.scalar(sql)?;
        Ok(matches!(value, ScalarValue::Integer(1)))
    }

    /// Integer value of `sql`, or `None` when it fails or is not an integer.
    pub fn check_int(&mut self, sql: &str) -> Option<i64> {
        match self.scalar(sql) {
            Ok(value) => value.as_integer(),
            Err(err) => {
                log::debug!("probe '{}' failed: {}", sql, err);
                None
            }
        }
    }

    /// Text value of `sql`, or `None` when it fails or is not text.
    pub fn check_text(&mut self, sql: &str) -> Option<String> {
        match self.scalar(sql) {
            Ok(value) => value.as_text().map(str::to_string),
            Err(err) => {
                log::debug!("probe '{}' failed: {}", sql, err);
                None
            }
        }
    }

    fn scalar(&mut self, sql: &str) -> SqlCaseResult<ScalarValue> {
        match self.handle.as_mut() {
            Some(handle) => handle.query_scalar(sql),
            None => Err(SqlCaseError::new(
                "probe connection is closed",
                ErrorKind::InvalidOperation,
            )),
        }
    }

    pub fn close(mut self) -> SqlCaseResult<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> SqlCaseResult<()> {
        let closed = match self.handle.take() {
            Some(handle) => handle.close(),
            None => Ok(()),
        };
        if self.holds_runtime {
            self.holds_runtime = false;
            self.engine.release_runtime();
        }
        closed
    }
}

impl Drop for Probe {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            log::error!("failed to close probe connection: {}", err);
        }
    }
}

impl Capabilities {
    /// Asks the engine what it supports. A probe that fails counts as absent.
    pub fn detect(probe: &mut Probe) -> Capabilities {
        const FLAGS: [(Capability, &str); 15] = [
            (Capability::TinyPoint, "SELECT IsTinyPointEnabled()"),
            (Capability::Geos, "SELECT HasGeos()"),
            (Capability::GeosAdvanced, "SELECT HasGeosAdvanced()"),
            (Capability::GeosReentrant, "SELECT HasGeosReentrant()"),
            (Capability::GeosOnlyReentrant, "SELECT HasGeosOnlyReentrant()"),
            (Capability::Proj, "SELECT HasProj()"),
            (Capability::Proj6, "SELECT HasProj6()"),
            (Capability::Epsg, "SELECT HasEpsg()"),
            (Capability::MathSql, "SELECT HasMathSql()"),
            (Capability::Iconv, "SELECT HasIconv()"),
            (Capability::LibXml2, "SELECT HasLibXML2()"),
            (Capability::RtTopo, "SELECT HasRtTopo()"),
            (Capability::GeoPackage, "SELECT HasGeoPackage()"),
            (Capability::FreeXl, "SELECT HasFreeXL()"),
            (Capability::MiniZip, "SELECT HasMiniZip()"),
        ];
        const VERSIONS: [(Library, &str); 3] = [
            (Library::Sqlite, "SELECT sqlite_version()"),
            (Library::Geos, "SELECT geos_version()"),
            (Library::Proj, "SELECT proj_version()"),
        ];

        let mut capabilities = Capabilities::new();
        for (capability, sql) in FLAGS {
            let present = probe.check(sql).unwrap_or_else(|err| {
                log::debug!("{} unavailable: {}", sql, err);
                false
            });
            capabilities.set(capability, present);
        }
        for (library, sql) in VERSIONS {
            let version = probe
                .check_text(sql)
                .as_deref()
                .and_then(LibraryVersion::parse);
            capabilities.set_version(library, version);
        }
        log::debug!("detected engine capabilities: {:?}", capabilities);
        capabilities
    }
}
