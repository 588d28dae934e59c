use sqlcase::config::{RunnerConfig, RunnerConfigBuilder};
use sqlcase::engine::{OpenMode, SqlEngineProvider};
use sqlcase::errors::{ErrorKind, SqlCaseError, SqlCaseResult};
use sqlcase::suite::SuiteRunner;
use sqlcase_sqlite_adapter::SqliteEngine;
use std::backtrace::Backtrace;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tempfile::TempDir;

/// Stand-in for the spatial metadata initialization, so that fresh in-memory
/// databases get a recognisable schema without the extension.
pub const INIT_STATEMENTS: [&str; 2] = [
    "CREATE TABLE spatial_ref_sys(srid INTEGER PRIMARY KEY, auth_name TEXT)",
    "INSERT INTO spatial_ref_sys VALUES (4326, 'epsg')",
];

/// Runs `test` between `before` and `after`, reporting failures and panics
/// with the captured backtrace. `after` runs even when the test fails.
pub fn run_test<T, B, A>(before: B, test: T, after: A)
where
    T: Fn(TestContext) -> SqlCaseResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    B: Fn() -> SqlCaseResult<TestContext> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    A: Fn(TestContext) -> SqlCaseResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
{
    let start_time = Instant::now();
    let result = std::panic::catch_unwind(|| {
        let backtrace = Backtrace::capture();
        let ctx = before().map_err(|e| (format!("Before run failed: {:?}", e), String::new()))?;
        match test(ctx.clone()) {
            Ok(_) => after(ctx)
                .map_err(|e| (format!("After run failed: {:?}", e), backtrace.to_string())),
            Err(e) => {
                let _ = after(ctx);
                Err((format!("Test failed: {:?}", e), backtrace.to_string()))
            }
        }
    });

    let last_error = match result {
        Ok(Ok(_)) => return,
        Ok(Err((e, bt))) => {
            if !bt.is_empty() && !bt.contains("disabled") {
                eprintln!("\nBacktrace:\n{}", bt);
            }
            e
        }
        Err(panic_err) => {
            if let Some(s) = panic_err.downcast_ref::<&str>() {
                format!("Panic: {}", s)
            } else if let Some(s) = panic_err.downcast_ref::<String>() {
                format!("Panic: {}", s)
            } else {
                "Panic: unknown payload".to_string()
            }
        }
    };

    panic!(
        "Test failed after {:?}. Last error: {}",
        start_time.elapsed(),
        last_error
    );
}

/// A scratch directory holding suites, case files and database files.
#[derive(Clone)]
pub struct TestContext {
    dir: Arc<TempDir>,
}

impl TestContext {
    pub fn new() -> SqlCaseResult<TestContext> {
        let dir = tempfile::Builder::new()
            .prefix(&format!("sqlcase-{}", uuid::Uuid::new_v4()))
            .tempdir()
            .map_err(|e| io_error("cannot create scratch directory", e))?;
        Ok(TestContext { dir: Arc::new(dir) })
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Absolute path of a database file inside the scratch directory.
    pub fn db_path(&self, name: &str) -> String {
        self.root().join(name).to_string_lossy().into_owned()
    }

    /// Creates `name` with the given statements, outside of any runner.
    pub fn create_db(&self, name: &str, sql: &str) -> SqlCaseResult<String> {
        let path = self.db_path(name);
        let engine = SqliteEngine::with_config().build();
        let mut conn = engine.open(&path, OpenMode::ReadWriteCreate)?;
        conn.exec(sql)?;
        conn.close()?;
        Ok(path)
    }

    pub fn suite_dir(&self, suite: &str) -> SqlCaseResult<PathBuf> {
        let dir = self.root().join(suite);
        fs::create_dir_all(&dir).map_err(|e| io_error("cannot create suite directory", e))?;
        Ok(dir)
    }

    /// Writes a case file named `file` into the `suite` directory.
    pub fn write_case(&self, suite: &str, file: &str, content: &str) -> SqlCaseResult<PathBuf> {
        let path = self.suite_dir(suite)?.join(file);
        fs::write(&path, content).map_err(|e| io_error("cannot write case file", e))?;
        Ok(path)
    }

    /// Runner over plain SQLite with no extension, rooted at the scratch directory.
    pub fn runner(&self) -> SuiteRunner {
        self.runner_with(self.config().build())
    }

    pub fn runner_with(&self, config: RunnerConfig) -> SuiteRunner {
        let engine = SqliteEngine::with_config().build();
        SuiteRunner::new(engine.into_engine(), None, config)
    }

    /// Config builder pre-set for tests: scratch root, no extension and
    /// [`INIT_STATEMENTS`] for fresh in-memory databases.
    pub fn config(&self) -> RunnerConfigBuilder {
        RunnerConfig::with_config()
            .suites_root(self.root())
            .no_extension()
            .init_statements(INIT_STATEMENTS)
    }
}

/// Renders a case file: header lines, then the cells one per line.
pub fn case_file(
    name: &str,
    target: &str,
    sql: &str,
    rows: usize,
    columns: usize,
    cells: &[&str],
) -> String {
    let mut text = format!(
        "{}\n{}\n{}\n{} # rows (not including the header row)\n{} # columns\n",
        name, target, sql, rows, columns
    );
    for cell in cells {
        text.push_str(cell);
        text.push('\n');
    }
    text
}

pub fn create_test_context() -> SqlCaseResult<TestContext> {
    TestContext::new()
}

pub fn cleanup(_ctx: TestContext) -> SqlCaseResult<()> {
    Ok(())
}

fn io_error(context: &str, err: std::io::Error) -> SqlCaseError {
    SqlCaseError::new(&format!("{}: {}", context, err), ErrorKind::IOError)
}
