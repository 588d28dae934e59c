use crate::compare::PrecisionMode;
use crate::config::SECURITY_VARIABLE;
use std::path::{Path, PathBuf};

/// File-name suffix of case files inside a suite directory.
pub const DEFAULT_CASE_SUFFIX: &str = ".testcase";

/// Extension loaded when dynamic loading is requested without a name.
pub const DEFAULT_EXTENSION: &str = "mod_spatialite";

/// Statements run on every freshly opened writable in-memory database.
pub const DEFAULT_INIT_STATEMENTS: [&str; 2] = [
    "SELECT InitSpatialMetadataFull(1)",
    "SELECT StoredProc_CreateTables()",
];

pub const AMPHIBIOUS_ENTER: &str = "SELECT EnableGpkgAmphibiousMode()";
pub const AMPHIBIOUS_LEAVE: &str = "SELECT DisableGpkgAmphibiousMode()";

/// Settings of one test run.
///
/// # Examples
///
/// ```rust,ignore
/// let config = RunnerConfig::with_config()
///     .suites_root("test")
///     .load_extension("mod_spatialite")
///     .legacy(false)
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    suites_root: PathBuf,
    case_suffix: String,
    security_variable: String,
    legacy: bool,
    extension: Option<String>,
    init_statements: Vec<String>,
    amphibious_enter: String,
    amphibious_leave: String,
    precision_mode: PrecisionMode,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        RunnerConfig {
            suites_root: PathBuf::from("."),
            case_suffix: DEFAULT_CASE_SUFFIX.to_string(),
            security_variable: SECURITY_VARIABLE.to_string(),
            legacy: false,
            extension: None,
            init_statements: DEFAULT_INIT_STATEMENTS.iter().map(|s| s.to_string()).collect(),
            amphibious_enter: AMPHIBIOUS_ENTER.to_string(),
            amphibious_leave: AMPHIBIOUS_LEAVE.to_string(),
            precision_mode: PrecisionMode::default(),
        }
    }
}

impl RunnerConfig {
    pub fn new() -> RunnerConfig {
        RunnerConfig::default()
    }

    /// Starts a builder seeded with the defaults.
    pub fn with_config() -> RunnerConfigBuilder {
        RunnerConfigBuilder::new()
    }

    /// Directory holding one subdirectory per suite.
    pub fn suites_root(&self) -> &Path {
        &self.suites_root
    }

    pub fn case_suffix(&self) -> &str {
        &self.case_suffix
    }

    pub fn security_variable(&self) -> &str {
        &self.security_variable
    }

    /// Legacy mode drops suites that depend on post-legacy extension features.
    pub fn legacy(&self) -> bool {
        self.legacy
    }

    /// Extension loaded into each new connection, if any.
    pub fn extension(&self) -> Option<&str> {
        self.extension.as_deref()
    }

    pub fn init_statements(&self) -> &[String] {
        &self.init_statements
    }

    pub fn amphibious_enter(&self) -> &str {
        &self.amphibious_enter
    }

    pub fn amphibious_leave(&self) -> &str {
        &self.amphibious_leave
    }

    pub fn precision_mode(&self) -> PrecisionMode {
        self.precision_mode
    }
}

/// Fluent builder for [`RunnerConfig`].
pub struct RunnerConfigBuilder {
    config: RunnerConfig,
}

impl RunnerConfigBuilder {
    fn new() -> Self {
        RunnerConfigBuilder {
            config: RunnerConfig::default(),
        }
    }

    pub fn suites_root<P: Into<PathBuf>>(mut self, root: P) -> Self {
        self.config.suites_root = root.into();
        self
    }

    pub fn case_suffix(mut self, suffix: &str) -> Self {
        self.config.case_suffix = suffix.to_string();
        self
    }

    pub fn security_variable(mut self, variable: &str) -> Self {
        self.config.security_variable = variable.to_string();
        self
    }

    pub fn legacy(mut self, legacy: bool) -> Self {
        self.config.legacy = legacy;
        self
    }

    pub fn load_extension(mut self, name: &str) -> Self {
        self.config.extension = Some(name.to_string());
        self
    }

    pub fn no_extension(mut self) -> Self {
        self.config.extension = None;
        self
    }

    /// Replaces the statements run on fresh in-memory databases.
    pub fn init_statements<I, S>(mut self, statements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.init_statements = statements.into_iter().map(Into::into).collect();
        self
    }

    pub fn amphibious_statements(mut self, enter: &str, leave: &str) -> Self {
        self.config.amphibious_enter = enter.to_string();
        self.config.amphibious_leave = leave.to_string();
        self
    }

    pub fn precision_mode(mut self, mode: PrecisionMode) -> Self {
        self.config.precision_mode = mode;
        self
    }

    pub fn build(self) -> RunnerConfig {
        self.config
    }
}
