use crate::case::{read_case_file, TestCase};
use crate::compare::Comparator;
use crate::config::{RunnerConfig, SecurityTier};
use crate::connection::{ConnectionManager, ConnectionStats};
use crate::engine::{ResultTable, SharedCache, SqlEngine};
use crate::errors::{SqlCaseError, SqlCaseResult};
use crate::probe::Probe;
use crate::suite::{
    list_case_files, Capabilities, ExtensionPolicy, SelectionContext, SuiteCatalog,
    SuiteDescriptor,
};
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// The first failure of a run. Nothing after it was executed.
#[derive(Debug)]
pub struct CaseFailure {
    path: PathBuf,
    case_name: Option<String>,
    error: SqlCaseError,
}

impl CaseFailure {
    pub fn new(path: &Path, case_name: Option<String>, error: SqlCaseError) -> CaseFailure {
        CaseFailure {
            path: path.to_path_buf(),
            case_name,
            error,
        }
    }

    /// Case file, or suite directory for failures outside any case.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Name declared by the case, when it could be parsed.
    pub fn case_name(&self) -> Option<&str> {
        self.case_name.as_deref()
    }

    pub fn error(&self) -> &SqlCaseError {
        &self.error
    }

    pub fn status_code(&self) -> i32 {
        self.error.status_code()
    }

    /// Process exit status: the negative code truncated to a byte.
    pub fn exit_status(&self) -> u8 {
        self.status_code() as u8
    }
}

impl Display for CaseFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.case_name {
            Some(name) => write!(
                f,
                "{} ({}): {}",
                name,
                self.path.display(),
                self.error
            ),
            None => write!(f, "{}: {}", self.path.display(), self.error),
        }
    }
}

impl std::error::Error for CaseFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Summary of a successful run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub suites_run: Vec<String>,
    pub suites_skipped: Vec<String>,
    pub cases_passed: usize,
    pub connections: ConnectionStats,
}

/// Runs case files in order against one engine, stopping at the first failure.
///
/// Cases share a single connection: consecutive cases naming the same database
/// reuse it, see [`ConnectionManager`].
pub struct SuiteRunner {
    config: RunnerConfig,
    manager: ConnectionManager,
    comparator: Comparator,
}

impl SuiteRunner {
    pub fn new(engine: SqlEngine, cache: Option<SharedCache>, config: RunnerConfig) -> SuiteRunner {
        let manager = ConnectionManager::new(engine, cache, &config);
        let comparator = Comparator::new(config.precision_mode());
        SuiteRunner {
            config,
            manager,
            comparator,
        }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub fn connections(&self) -> &ConnectionManager {
        &self.manager
    }

    /// Probes the engine and reads the security tier and legacy flag.
    pub fn selection_context(&self) -> SqlCaseResult<SelectionContext> {
        let mut probe = Probe::open(
            self.manager.engine(),
            self.manager.shared_cache(),
            self.config.extension(),
        )?;
        let capabilities = Capabilities::detect(&mut probe);
        probe.close()?;

        let security = SecurityTier::from_env(self.config.security_variable());
        Ok(SelectionContext::new(
            capabilities,
            security,
            self.config.legacy(),
        ))
    }

    /// Runs every suite of `catalog` selected by `selection`, in catalog order.
    pub fn run_all(
        &mut self,
        catalog: &SuiteCatalog,
        selection: &SelectionContext,
    ) -> Result<RunReport, CaseFailure> {
        let selected = catalog.select(selection);
        let suites_skipped = catalog
            .suites()
            .iter()
            .filter(|suite| !selected.iter().any(|s| s.name() == suite.name()))
            .map(|suite| suite.name().to_string())
            .collect();

        let initial = RunReport {
            suites_skipped,
            ..RunReport::default()
        };
        let mut report = selected.into_iter().try_fold(initial, |mut report, suite| {
            self.run_suite(suite, &mut report)?;
            Ok(report)
        })?;

        report.connections = self.manager.stats();
        log::info!(
            "{} cases passed in {} suites",
            report.cases_passed,
            report.suites_run.len()
        );
        Ok(report)
    }

    /// Runs the given case files in order.
    pub fn run_specified<P: AsRef<Path>>(&mut self, paths: &[P]) -> Result<RunReport, CaseFailure> {
        let load_extension = self.config.extension().is_some();
        let mut report = paths
            .iter()
            .try_fold(RunReport::default(), |mut report, path| {
                self.run_case(path.as_ref(), load_extension, false)?;
                report.cases_passed += 1;
                Ok(report)
            })?;
        report.connections = self.manager.stats();
        Ok(report)
    }

    /// Runs one suite directory under the suites root.
    pub fn run_suite(
        &mut self,
        suite: &SuiteDescriptor,
        report: &mut RunReport,
    ) -> Result<(), CaseFailure> {
        let suite_dir = self.config.suites_root().join(suite.name());
        log::debug!("running suite {}", suite.name());

        if let Some(fixture) = suite.fixture() {
            fixture
                .prepare(&suite_dir)
                .map_err(|err| self.fail(&suite_dir, None, err))?;
        }

        let files = list_case_files(&suite_dir, self.config.case_suffix())
            .map_err(|err| self.fail(&suite_dir, None, err))?;

        let load_extension = match suite.extension_policy() {
            ExtensionPolicy::Inherit => self.config.extension().is_some(),
            ExtensionPolicy::Never => false,
        };
        for file in &files {
            self.run_case(file, load_extension, suite.gpkg_amphibious())?;
            report.cases_passed += 1;
        }
        report.suites_run.push(suite.name().to_string());
        Ok(())
    }

    /// Parses, executes and checks one case file.
    pub fn run_case(
        &mut self,
        path: &Path,
        load_extension: bool,
        gpkg_amphibious: bool,
    ) -> Result<(), CaseFailure> {
        let mut case = read_case_file(path).map_err(|err| self.fail(path, None, err))?;
        log::info!("Test case: {}", case.name);

        let outcome = self
            .execute(&case, load_extension, gpkg_amphibious)
            .map_err(|err| self.fail(path, Some(&case), err))?;

        self.comparator
            .compare(&outcome, &mut case)
            .map_err(|err| self.fail(path, Some(&case), err))
    }

    fn execute(
        &mut self,
        case: &TestCase,
        load_extension: bool,
        gpkg_amphibious: bool,
    ) -> SqlCaseResult<SqlCaseResult<ResultTable>> {
        let conn = self.manager.ensure(&case.target, load_extension)?;
        let handle = conn.handle();

        if gpkg_amphibious {
            if let Err(err) = handle.exec(self.config.amphibious_enter()) {
                log::debug!("ignoring amphibious mode failure: {}", err);
            }
        }
        let outcome = handle.get_table(&case.statement);
        if gpkg_amphibious {
            if let Err(err) = handle.exec(self.config.amphibious_leave()) {
                log::debug!("ignoring amphibious mode failure: {}", err);
            }
        }
        Ok(outcome)
    }

    fn fail(&self, path: &Path, case: Option<&TestCase>, error: SqlCaseError) -> CaseFailure {
        log::error!("{}", error);
        CaseFailure::new(path, case.map(|c| c.name.clone()), error)
    }

    /// Closes the shared connection.
    pub fn close(&mut self) -> SqlCaseResult<()> {
        self.manager.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::scripted::ScriptedEngine;
    use crate::errors::ErrorKind;
    use crate::suite::{Capability, Fixture, Gate};
    use std::fs;
    use tempfile::{tempdir, TempDir};

    fn case_text(name: &str, target: &str, sql: &str, cells: &[&str]) -> String {
        let mut text = format!("{}\n{}\n{}\n1 # rows\n1 # columns\n", name, target, sql);
        for cell in cells {
            text.push_str(cell);
            text.push('\n');
        }
        text
    }

    fn write_case(dir: &Path, file: &str, text: &str) -> PathBuf {
        fs::create_dir_all(dir).unwrap();
        let path = dir.join(file);
        fs::write(&path, text).unwrap();
        path
    }

    fn one_value(value: &str) -> ResultTable {
        let mut table = ResultTable::with_header(["v"]);
        table.push_row(vec![Some(value.to_string())]).unwrap();
        table
    }

    fn runner(scripted: &ScriptedEngine, root: &TempDir) -> SuiteRunner {
        let config = RunnerConfig::with_config()
            .suites_root(root.path())
            .init_statements(["SELECT init()"])
            .build();
        SuiteRunner::new(scripted.engine(), None, config)
    }

    #[test]
    fn test_run_specified_stops_at_first_failure() {
        let root = tempdir().unwrap();
        let scripted = ScriptedEngine::new();
        scripted
            .respond("SELECT 'a'", one_value("a"))
            .respond("SELECT 'b'", one_value("x"))
            .respond("SELECT 'c'", one_value("c"));

        let first = write_case(root.path(), "1.testcase", &case_text("first", ":memory:", "SELECT 'a'", &["v", "a"]));
        let second = write_case(root.path(), "2.testcase", &case_text("second", ":memory:", "SELECT 'b'", &["v", "b"]));
        let third = write_case(root.path(), "3.testcase", &case_text("third", ":memory:", "SELECT 'c'", &["v", "c"]));

        let mut runner = runner(&scripted, &root);
        let failure = runner.run_specified(&[first, second.clone(), third]).unwrap_err();

        assert_eq!(failure.path(), second.as_path());
        assert_eq!(failure.case_name(), Some("second"));
        assert_eq!(failure.error().kind(), &ErrorKind::ValueMismatch);
        assert_eq!(failure.status_code(), -14);
        assert_eq!(failure.exit_status(), 242);
        assert_eq!(scripted.count("query SELECT 'c'"), 0);
        assert_eq!(scripted.count("open"), 1);
    }

    #[test]
    fn test_run_specified_success_reuses_connection() {
        let root = tempdir().unwrap();
        let scripted = ScriptedEngine::new();
        scripted
            .respond("SELECT 'a'", one_value("a"))
            .respond("SELECT 'b'", one_value("b"));

        let first = write_case(root.path(), "1.testcase", &case_text("first", "db.sqlite", "SELECT 'a'", &["v", "a"]));
        let second = write_case(root.path(), "2.testcase", &case_text("second", "db.sqlite", "SELECT 'b'", &["v", "b"]));

        let mut runner = runner(&scripted, &root);
        let report = runner.run_specified(&[first, second]).unwrap();
        assert_eq!(report.cases_passed, 2);
        assert_eq!(report.connections.opened, 1);
        assert_eq!(report.connections.reused, 1);
        assert_eq!(scripted.count("exec SELECT init()"), 0);
    }

    #[test]
    fn test_expected_failure_passes() {
        let root = tempdir().unwrap();
        let scripted = ScriptedEngine::new();
        scripted.fail("SELECT boom()", "no such function: boom");
        let path = write_case(
            root.path(),
            "err.testcase",
            &case_text("err", ":memory:", "SELECT boom()", &["boom()", "no such function: boom"]),
        );
        let mut runner = runner(&scripted, &root);
        assert!(runner.run_specified(&[path]).is_ok());
    }

    #[test]
    fn test_unparseable_case_is_reported() {
        let root = tempdir().unwrap();
        let scripted = ScriptedEngine::new();
        let path = write_case(root.path(), "bad.testcase", "only a name\n");
        let mut runner = runner(&scripted, &root);
        let failure = runner.run_specified(&[path]).unwrap_err();
        assert_eq!(failure.error().kind(), &ErrorKind::ParseError);
        assert_eq!(failure.case_name(), None);
        assert_eq!(scripted.count("open"), 0);
    }

    #[test]
    fn test_connection_failure_is_reported() {
        let root = tempdir().unwrap();
        let scripted = ScriptedEngine::new();
        scripted.refuse_open("locked.sqlite");
        let path = write_case(
            root.path(),
            "c.testcase",
            &case_text("c", "locked.sqlite", "SELECT 1", &["1", "1"]),
        );
        let mut runner = runner(&scripted, &root);
        let failure = runner.run_specified(&[path]).unwrap_err();
        assert_eq!(failure.status_code(), -1);
        assert_eq!(failure.exit_status(), 255);
        assert_eq!(scripted.count("query"), 0);
    }

    #[test]
    fn test_run_all_walks_selected_suites_in_order() {
        let root = tempdir().unwrap();
        let scripted = ScriptedEngine::new();
        scripted
            .respond("SELECT 'a'", one_value("a"))
            .respond("SELECT 'b'", one_value("b"));

        let alpha = root.path().join("alpha");
        write_case(&alpha, "2.testcase", &case_text("alpha-2", ":memory:", "SELECT 'b'", &["v", "b"]));
        write_case(&alpha, "1.testcase", &case_text("alpha-1", ":memory:", "SELECT 'a'", &["v", "a"]));
        write_case(&alpha, ".skip.testcase", "garbage");
        let beta = root.path().join("beta");
        write_case(&beta, "1.testcase", &case_text("beta-1", "NEW:memory:", "SELECT 'a'", &["v", "a"]));

        let catalog = SuiteCatalog::new()
            .push(SuiteDescriptor::new("alpha", Gate::Always))
            .push(SuiteDescriptor::new("gated", Gate::requires(Capability::Geos)))
            .push(SuiteDescriptor::new("beta", Gate::Always));

        let mut runner = runner(&scripted, &root);
        let report = runner.run_all(&catalog, &SelectionContext::default()).unwrap();

        assert_eq!(report.suites_run, vec!["alpha", "beta"]);
        assert_eq!(report.suites_skipped, vec!["gated"]);
        assert_eq!(report.cases_passed, 3);

        let queries: Vec<String> = scripted
            .journal()
            .into_iter()
            .filter(|e| e.starts_with("query"))
            .collect();
        assert_eq!(queries, vec!["query SELECT 'a'", "query SELECT 'b'", "query SELECT 'a'"]);
        assert_eq!(scripted.count("open :memory:"), 2);
        assert_eq!(scripted.count("exec SELECT init()"), 2);
    }

    #[test]
    fn test_run_all_fails_fast_across_suites() {
        let root = tempdir().unwrap();
        let scripted = ScriptedEngine::new();
        scripted.respond("SELECT 'a'", one_value("a"));

        write_case(&root.path().join("first"), "1.testcase", &case_text("ok", ":memory:", "SELECT 'a'", &["v", "a"]));
        write_case(&root.path().join("first"), "2.testcase", &case_text("bad", ":memory:", "SELECT 'a'", &["v", "z"]));
        write_case(&root.path().join("second"), "1.testcase", &case_text("never", ":memory:", "SELECT 'n'", &["v", "n"]));

        let catalog = SuiteCatalog::new()
            .push(SuiteDescriptor::new("first", Gate::Always))
            .push(SuiteDescriptor::new("second", Gate::Always));

        let mut runner = runner(&scripted, &root);
        let failure = runner.run_all(&catalog, &SelectionContext::default()).unwrap_err();
        assert_eq!(failure.case_name(), Some("bad"));
        assert_eq!(scripted.count("query SELECT 'n'"), 0);
    }

    #[test]
    fn test_missing_suite_directory_is_suite_error() {
        let root = tempdir().unwrap();
        let scripted = ScriptedEngine::new();
        let catalog = SuiteCatalog::new().push(SuiteDescriptor::new("absent", Gate::Always));
        let mut runner = runner(&scripted, &root);
        let failure = runner.run_all(&catalog, &SelectionContext::default()).unwrap_err();
        assert_eq!(failure.status_code(), -4);
        assert_eq!(failure.path(), root.path().join("absent").as_path());
    }

    #[test]
    fn test_amphibious_suite_wraps_statement() {
        let root = tempdir().unwrap();
        let scripted = ScriptedEngine::new();
        scripted
            .respond("SELECT 'a'", one_value("a"))
            .fail("SELECT DisableGpkgAmphibiousMode()", "no such function");
        write_case(&root.path().join("gpkg"), "1.testcase", &case_text("g", "x.sqlite", "SELECT 'a'", &["v", "a"]));

        let catalog = SuiteCatalog::new().push(SuiteDescriptor::new("gpkg", Gate::Always).amphibious());
        let mut runner = runner(&scripted, &root);
        runner.run_all(&catalog, &SelectionContext::default()).unwrap();

        let journal = scripted.journal();
        let tail = &journal[journal.len() - 3..];
        assert_eq!(
            tail,
            &[
                "exec SELECT EnableGpkgAmphibiousMode()",
                "query SELECT 'a'",
                "exec SELECT DisableGpkgAmphibiousMode()",
            ]
        );
    }

    #[test]
    fn test_extension_policy_and_fixture() {
        let root = tempdir().unwrap();
        let scripted = ScriptedEngine::new();
        scripted.respond("SELECT 'a'", one_value("a"));

        let proc_dir = root.path().join("proc");
        write_case(&proc_dir, "1.testcase", &case_text("p", "storproc_x.sqlite", "SELECT 'a'", &["v", "a"]));
        fs::write(proc_dir.join("storproc.sqlite"), b"db").unwrap();
        write_case(&root.path().join("plain"), "1.testcase", &case_text("q", "other.sqlite", "SELECT 'a'", &["v", "a"]));

        let catalog = SuiteCatalog::new()
            .push(
                SuiteDescriptor::new("proc", Gate::Always)
                    .with_fixture(Fixture::copy("storproc.sqlite", "storproc_x.sqlite")),
            )
            .push(SuiteDescriptor::new("plain", Gate::Always).without_extension());

        let config = RunnerConfig::with_config()
            .suites_root(root.path())
            .load_extension("mod_spatialite")
            .build();
        let mut runner = SuiteRunner::new(scripted.engine(), None, config);
        runner.run_all(&catalog, &SelectionContext::default()).unwrap();

        assert!(proc_dir.join("storproc_x.sqlite").exists());
        assert_eq!(scripted.count("load mod_spatialite"), 1);
        assert_eq!(scripted.count("acquire"), 1);
    }

    #[test]
    fn test_selection_context_probes_engine() {
        let root = tempdir().unwrap();
        let scripted = ScriptedEngine::new();
        scripted.scalar("SELECT HasGeos()", crate::engine::ScalarValue::Integer(1));
        let runner = runner(&scripted, &root);
        let context = runner.selection_context().unwrap();
        assert!(context.capabilities.has(Capability::Geos));
        assert!(!context.legacy);
        assert_eq!(scripted.runtime_refs(), 0);
    }
}
