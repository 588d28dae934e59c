use crate::case::Target;
use crate::config::RunnerConfig;
use crate::engine::{EngineConnection, OpenMode, SharedCache, SqlEngine};
use crate::errors::{ErrorKind, SqlCaseError, SqlCaseResult};

/// The single live database of a run.
pub struct Connection {
    handle: Box<dyn EngineConnection>,
    path: String,
    read_only: bool,
    holds_runtime: bool,
}

impl Connection {
    /// Stored path: the descriptor without `_RO`, or `:memory:` for fresh databases.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn read_only(&self) -> bool {
        self.read_only
    }

    pub fn handle(&mut self) -> &mut dyn EngineConnection {
        self.handle.as_mut()
    }
}

/// Counters describing how connections were obtained during a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionStats {
    pub opened: usize,
    pub reused: usize,
    pub closed: usize,
}

/// Owns at most one open connection and decides, per case, whether it can be
/// reused or must be replaced.
///
/// | open? | fresh-memory target | same location and read-only flag | action |
/// |---|---|---|---|
/// | no | - | - | open |
/// | yes | yes | - | close, open fresh `:memory:` |
/// | yes | no | yes | reuse |
/// | yes | no | no | close, open |
///
/// Engine runtime state is acquired before each open and released on close,
/// unless an externally owned [`SharedCache`] was supplied or an extension is
/// being loaded into the connection.
pub struct ConnectionManager {
    engine: SqlEngine,
    cache: Option<SharedCache>,
    extension: Option<String>,
    init_statements: Vec<String>,
    current: Option<Connection>,
    stats: ConnectionStats,
}

impl ConnectionManager {
    pub fn new(engine: SqlEngine, cache: Option<SharedCache>, config: &RunnerConfig) -> Self {
        ConnectionManager {
            engine,
            cache,
            extension: config.extension().map(str::to_string),
            init_statements: config.init_statements().to_vec(),
            current: None,
            stats: ConnectionStats::default(),
        }
    }

    pub fn engine(&self) -> &SqlEngine {
        &self.engine
    }

    pub fn shared_cache(&self) -> Option<&SharedCache> {
        self.cache.as_ref()
    }

    pub fn current(&self) -> Option<&Connection> {
        self.current.as_ref()
    }

    pub fn is_open(&self) -> bool {
        self.current.is_some()
    }

    pub fn stats(&self) -> ConnectionStats {
        self.stats
    }

    /// Returns a connection serving `target`, reusing the open one when possible.
    ///
    /// With `load_extension` set, a newly opened connection gets the configured
    /// extension. Spatial metadata initialization runs only on newly opened,
    /// writable in-memory databases.
    pub fn ensure(&mut self, target: &Target, load_extension: bool) -> SqlCaseResult<&mut Connection> {
        let read_only = target.is_read_only();
        let reusable = match &self.current {
            Some(conn) => {
                !target.is_fresh_memory()
                    && target.same_location(&conn.path)
                    && conn.read_only == read_only
            }
            None => false,
        };

        if reusable {
            self.stats.reused += 1;
            return self.current.as_mut().ok_or_else(|| {
                SqlCaseError::new("no connection to reuse", ErrorKind::InternalError)
            });
        }

        self.close()?;
        let conn = self.open(target, load_extension)?;
        let needs_init = !read_only && target.is_memory();
        let conn = self.current.insert(conn);
        self.stats.opened += 1;

        if needs_init {
            for statement in &self.init_statements {
                conn.handle.exec(statement).map_err(|err| {
                    SqlCaseError::new_with_cause(
                        &format!("{} error: {}", statement, err.message()),
                        ErrorKind::InitError,
                        err,
                    )
                })?;
            }
        }
        Ok(conn)
    }

    fn open(&mut self, target: &Target, load_extension: bool) -> SqlCaseResult<Connection> {
        let extension = if load_extension {
            self.extension.as_deref()
        } else {
            None
        };
        let holds_runtime = self.cache.is_none() && extension.is_none();
        if holds_runtime {
            self.engine.acquire_runtime()?;
        }

        let read_only = target.is_read_only();
        let mode = if read_only {
            OpenMode::ReadOnly
        } else {
            OpenMode::ReadWriteCreate
        };

        let mut handle = match self.engine.open(target.open_path(), mode) {
            Ok(handle) => handle,
            Err(err) => {
                if holds_runtime {
                    self.engine.release_runtime();
                }
                return Err(SqlCaseError::new_with_cause(
                    &format!("cannot open {} db: {}", target.open_path(), err.message()),
                    ErrorKind::ConnectionError,
                    err,
                ));
            }
        };

        let prepared = self
            .cache
            .as_ref()
            .map_or(Ok(()), |cache| handle.attach_cache(cache))
            .map_err(|err| {
                SqlCaseError::new_with_cause(
                    &format!("cannot attach shared cache: {}", err.message()),
                    ErrorKind::ConnectionError,
                    err,
                )
            })
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

        if let Err(err) = prepared {
            if let Err(close_err) = handle.close() {
                log::error!("failed to close {}: {}", target.open_path(), close_err);
            }
            if holds_runtime {
                self.engine.release_runtime();
            }
            return Err(err);
        }

        log::debug!("opened {} ({})", target.open_path(), mode);
        Ok(Connection {
            handle,
            path: target.stored_path().to_string(),
            read_only,
            holds_runtime,
        })
    }

    /// Closes the open connection, if any.
    pub fn close(&mut self) -> SqlCaseResult<()> {
        let Some(conn) = self.current.take() else {
            return Ok(());
        };
        let Connection {
            handle,
            path,
            holds_runtime,
            ..
        } = conn;

        log::debug!("closing connection to {}", path);
        self.stats.closed += 1;
        let closed = handle.close();
        if holds_runtime {
            self.engine.release_runtime();
        }
        closed.map_err(|err| {
            SqlCaseError::new_with_cause(
                &format!("cannot close {}: {}", path, err.message()),
                ErrorKind::ConnectionError,
                err,
            )
        })
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            log::error!("failed to close connection during cleanup: {}", err);
        }
    }
}
