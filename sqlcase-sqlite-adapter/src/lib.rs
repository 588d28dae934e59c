//! # SQLite engine for sqlcase
//!
//! Runs case files against SQLite through `rusqlite`, with the library bundled
//! and dynamic extension loading enabled so a spatial extension such as
//! `mod_spatialite` can be loaded into each connection.
//!
//! ```rust,ignore
//! use sqlcase::config::RunnerConfig;
//! use sqlcase::suite::SuiteRunner;
//! use sqlcase_sqlite_adapter::{SqliteCache, SqliteEngine};
//!
//! let engine = SqliteEngine::with_config().build();
//! let cache = SqliteCache::new("spatialite").shared();
//! let config = RunnerConfig::with_config().load_extension("mod_spatialite").build();
//! let mut runner = SuiteRunner::new(engine.into_engine(), Some(cache), config);
//! runner.run_specified(&["test/sql_stmt_tests/version.testcase"])?;
//! ```

mod cache;
mod config;
mod connection;
mod engine;
mod value;
mod version;
mod wrapper;

pub use cache::*;
pub use config::*;
pub use engine::*;
pub use wrapper::{SqliteAdapterError, SqliteAdapterResult, INCOMPATIBLE_QUERIES};

#[cfg(test)]
#[ctor::ctor]
fn init() {
    colog::init();
}
