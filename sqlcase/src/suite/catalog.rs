use crate::errors::{ErrorKind, SqlCaseError, SqlCaseResult};
use crate::suite::{Capability, Gate, Library, SelectionContext};
use once_cell::sync::Lazy;
use std::path::Path;

/// Whether a suite's connections get the configured extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExtensionPolicy {
    /// Load the extension when the run loads it.
    #[default]
    Inherit,
    /// Never load it, even when the run does.
    Never,
}

/// File copied inside the suite directory before its cases run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fixture {
    source: String,
    destination: String,
}

impl Fixture {
    pub fn copy(source: &str, destination: &str) -> Fixture {
        Fixture {
            source: source.to_string(),
            destination: destination.to_string(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Copies the fixture, overwriting a previous copy.
    pub fn prepare(&self, suite_dir: &Path) -> SqlCaseResult<()> {
        let source = suite_dir.join(&self.source);
        let destination = suite_dir.join(&self.destination);
        std::fs::copy(&source, &destination).map_err(|err| {
            SqlCaseError::new(
                &format!(
                    "cannot copy {} to {}: {}",
                    source.display(),
                    destination.display(),
                    err
                ),
                ErrorKind::SuiteError,
            )
        })?;
        log::debug!("copied fixture {} to {}", source.display(), destination.display());
        Ok(())
    }
}

/// Warning logged when a suite is skipped while `when` holds.
#[derive(Debug, Clone, PartialEq)]
pub struct SkipWarning {
    when: Gate,
    message: String,
}

impl SkipWarning {
    pub fn when(&self) -> &Gate {
        &self.when
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// One suite subdirectory and the conditions under which it runs.
#[derive(Debug, Clone, PartialEq)]
pub struct SuiteDescriptor {
    name: String,
    gate: Gate,
    gpkg_amphibious: bool,
    extension_policy: ExtensionPolicy,
    fixture: Option<Fixture>,
    skip_warnings: Vec<SkipWarning>,
}

impl SuiteDescriptor {
    pub fn new(name: &str, gate: Gate) -> SuiteDescriptor {
        SuiteDescriptor {
            name: name.to_string(),
            gate,
            gpkg_amphibious: false,
            extension_policy: ExtensionPolicy::Inherit,
            fixture: None,
            skip_warnings: Vec::new(),
        }
    }

    /// Wraps every statement of the suite in GeoPackage amphibious mode.
    pub fn amphibious(mut self) -> Self {
        self.gpkg_amphibious = true;
        self
    }

    pub fn without_extension(mut self) -> Self {
        self.extension_policy = ExtensionPolicy::Never;
        self
    }

    pub fn with_fixture(mut self, fixture: Fixture) -> Self {
        self.fixture = Some(fixture);
        self
    }

    /// Logs `message` when the suite is skipped and `when` holds.
    pub fn warn_when(mut self, when: Gate, message: &str) -> Self {
        self.skip_warnings.push(SkipWarning {
            when,
            message: message.to_string(),
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn gate(&self) -> &Gate {
        &self.gate
    }

    pub fn gpkg_amphibious(&self) -> bool {
        self.gpkg_amphibious
    }

    pub fn extension_policy(&self) -> ExtensionPolicy {
        self.extension_policy
    }

    pub fn fixture(&self) -> Option<&Fixture> {
        self.fixture.as_ref()
    }

    pub fn skip_warnings(&self) -> &[SkipWarning] {
        &self.skip_warnings
    }

    pub fn is_selected(&self, context: &SelectionContext) -> bool {
        self.gate.evaluate(context)
    }
}

/// Ordered list of suites.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SuiteCatalog {
    suites: Vec<SuiteDescriptor>,
}

impl SuiteCatalog {
    pub fn new() -> SuiteCatalog {
        SuiteCatalog::default()
    }

    /// The suites of the spatial extension's regression tree, in run order.
    pub fn spatial() -> &'static SuiteCatalog {
        &SPATIAL_CATALOG
    }

    pub fn push(mut self, suite: SuiteDescriptor) -> Self {
        self.suites.push(suite);
        self
    }

    pub fn suites(&self) -> &[SuiteDescriptor] {
        &self.suites
    }

    pub fn len(&self) -> usize {
        self.suites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.suites.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&SuiteDescriptor> {
        self.suites.iter().find(|s| s.name == name)
    }

    /// Suites whose gate holds, in catalog order. Skipped suites log their
    /// applicable warnings.
    pub fn select(&self, context: &SelectionContext) -> Vec<&SuiteDescriptor> {
        self.suites
            .iter()
            .filter(|suite| {
                if suite.is_selected(context) {
                    return true;
                }
                suite
                    .skip_warnings
                    .iter()
                    .filter(|w| w.when.evaluate(context))
                    .for_each(|w| log::warn!("WARNING: {} !!!", w.message));
                false
            })
            .collect()
    }
}

static SPATIAL_CATALOG: Lazy<SuiteCatalog> = Lazy::new(build_spatial_catalog);

fn geos_gate() -> Gate {
    Gate::requires(Capability::Geos)
        .and(Gate::at_least(Library::Geos, 3, 3, 0))
        .and(only_reentrant_in_legacy().negate())
}

fn geos_advanced_gate() -> Gate {
    Gate::requires(Capability::GeosAdvanced)
        .and(Gate::at_least(Library::Geos, 3, 4, 0))
        .and(only_reentrant_in_legacy().negate())
}

fn only_reentrant_in_legacy() -> Gate {
    Gate::requires(Capability::GeosOnlyReentrant).and(Gate::Legacy)
}

fn obsolete_geos(minor: u32) -> Gate {
    Gate::at_least(Library::Geos, 3, minor, 0).negate()
}

fn relaxed_modern() -> Gate {
    Gate::RelaxedSecurity.and(Gate::not_legacy())
}

fn proj_gate() -> Gate {
    Gate::requires(Capability::Epsg).and(Gate::requires(Capability::Proj))
}

fn gpkg_gate() -> Gate {
    Gate::requires(Capability::GeoPackage).and(Gate::not_legacy())
}

fn build_spatial_catalog() -> SuiteCatalog {
    let tiny_point = Gate::requires(Capability::TinyPoint);
    let proj6 = Gate::requires(Capability::Proj6);
    let proj_720 = Gate::at_least(Library::Proj, 7, 2, 0);
    let proj_493 = Gate::at_least(Library::Proj, 4, 9, 3);
    let geos_380 = Gate::at_least(Library::Geos, 3, 8, 0);
    let geos_390 = Gate::at_least(Library::Geos, 3, 9, 0);
    let reentrant = Gate::requires(Capability::GeosReentrant);
    let rttopo = Gate::requires(Capability::RtTopo).and(Gate::not_legacy());
    let iconv = Gate::requires(Capability::Iconv);
    let libxml2 = Gate::requires(Capability::LibXml2);
    let sqlite_3250 = Gate::at_least(Library::Sqlite, 3, 25, 0);

    SuiteCatalog::new()
        .push(SuiteDescriptor::new("sql_stmt_tests", Gate::Always))
        .push(SuiteDescriptor::new("sql_stmt_tiny_point", tiny_point.clone()))
        .push(SuiteDescriptor::new("sql_stmt_point_geom", tiny_point.negate()))
        .push(SuiteDescriptor::new("sql_stmt_security_tests", Gate::RelaxedSecurity))
        .push(SuiteDescriptor::new("sql_stmt_logfile_tests", relaxed_modern()))
        .push(SuiteDescriptor::new(
            "sql_stmt_minizip",
            relaxed_modern().and(Gate::requires(Capability::MiniZip)),
        ))
        .push(SuiteDescriptor::new(
            "sql_stmt_proj600security_tests",
            relaxed_modern().and(proj6.clone()),
        ))
        .push(SuiteDescriptor::new(
            "sql_stmt_zip_proj6",
            relaxed_modern()
                .and(proj6.clone())
                .and(Gate::requires(Capability::MiniZip)),
        ))
        .push(
            SuiteDescriptor::new("sql_stmt_sequence_tests", Gate::not_legacy())
                .warn_when(Gate::Legacy, "skipping Sequence testcases in legacy mode"),
        )
        .push(
            SuiteDescriptor::new("sql_stmt_routing_tests", Gate::not_legacy())
                .warn_when(Gate::Legacy, "skipping CreateRouting testcases in legacy mode"),
        )
        .push(
            SuiteDescriptor::new("sql_stmt_postgres_tests", Gate::not_legacy())
                .warn_when(Gate::Legacy, "skipping Postgres testcases in legacy mode"),
        )
        .push(SuiteDescriptor::new(
            "sql_stmt_mathsql_tests",
            Gate::requires(Capability::MathSql),
        ))
        .push(SuiteDescriptor::new("sql_stmt_proj_tests", proj_gate()))
        .push(SuiteDescriptor::new(
            "sql_stmt_proj720_tests",
            proj_gate()
                .and(proj6.clone())
                .and(Gate::not_legacy())
                .and(proj_720.clone()),
        ))
        .push(SuiteDescriptor::new(
            "sql_stmt_proj600_tests",
            proj_gate()
                .and(proj6.clone())
                .and(Gate::not_legacy())
                .and(proj_720.negate()),
        ))
        .push(SuiteDescriptor::new(
            "sql_stmt_proj493_tests",
            proj_gate().and(proj6.clone().negate()).and(proj_493.clone()),
        ))
        .push(SuiteDescriptor::new(
            "sql_stmt_proj492_tests",
            proj_gate()
                .and(proj6.clone().negate())
                .and(proj_493.clone().negate()),
        ))
        .push(
            SuiteDescriptor::new("sql_stmt_geos_tests", geos_gate())
                .warn_when(
                    Gate::requires(Capability::Geos).and(obsolete_geos(3)),
                    "skipping GEOS testcases; obsolete version found",
                )
                .warn_when(
                    Gate::requires(Capability::Geos).and(only_reentrant_in_legacy()),
                    "skipping GEOS testcases in legacy mode:  GEOS_USE_ONLY_R_API defined",
                ),
        )
        .push(SuiteDescriptor::new(
            "sql_stmt_geos_380",
            geos_gate().and(geos_380.clone()),
        ))
        .push(SuiteDescriptor::new(
            "sql_stmt_geos_non380",
            geos_gate().and(geos_380.negate()),
        ))
        .push(SuiteDescriptor::new(
            "sql_stmt_geos_390",
            geos_gate().and(geos_390.clone()),
        ))
        .push(SuiteDescriptor::new(
            "sql_stmt_geos_non390",
            geos_gate().and(geos_390.clone().negate()),
        ))
        .push(
            SuiteDescriptor::new("sql_stmt_geosadvanced_tests", geos_advanced_gate())
                .warn_when(
                    Gate::requires(Capability::GeosAdvanced).and(obsolete_geos(4)),
                    "skipping GEOS_ADVANCED testcases; obsolete version found",
                )
                .warn_when(
                    Gate::requires(Capability::GeosAdvanced).and(only_reentrant_in_legacy()),
                    "skipping GEOS_ADVANCED testcases in legacy mode:  GEOS_USE_ONLY_R_API defined",
                ),
        )
        .push(SuiteDescriptor::new(
            "sql_stmt_voronoj2_tests",
            geos_advanced_gate().and(reentrant.clone()),
        ))
        .push(SuiteDescriptor::new(
            "sql_stmt_voronoj_390",
            geos_advanced_gate()
                .and(reentrant.clone())
                .and(geos_390.clone()),
        ))
        .push(SuiteDescriptor::new(
            "sql_stmt_voronoj_non390",
            geos_advanced_gate()
                .and(reentrant.clone())
                .and(geos_390.clone().negate()),
        ))
        .push(SuiteDescriptor::new(
            "sql_stmt_voronoj1_tests",
            geos_advanced_gate().and(reentrant.negate()),
        ))
        .push(SuiteDescriptor::new(
            "sql_stmt_geos370_tests",
            Gate::requires(Capability::Geos).and(Gate::at_least(Library::Geos, 3, 7, 0)),
        ))
        .push(
            SuiteDescriptor::new("sql_stmt_rtgeom_tests", rttopo.clone()).warn_when(
                Gate::requires(Capability::RtTopo).and(Gate::Legacy),
                "skipping RTTOPO testcases in legacy mode",
            ),
        )
        .push(SuiteDescriptor::new(
            "sql_stmt_rtgeom_390",
            rttopo.clone().and(geos_390.clone()),
        ))
        .push(SuiteDescriptor::new(
            "sql_stmt_rtgeom_non390",
            rttopo.clone().and(geos_390.negate()),
        ))
        .push(SuiteDescriptor::new("sql_stmt_rttopo_tests", rttopo))
        .push(SuiteDescriptor::new("sql_stmt_iconv_tests", iconv.clone()))
        .push(
            SuiteDescriptor::new("sql_stmt_proc_tests", iconv.clone().and(Gate::not_legacy()))
                .with_fixture(Fixture::copy("storproc.sqlite", "storproc_x.sqlite"))
                .warn_when(
                    iconv.clone().and(Gate::Legacy),
                    "skipping SqlProc testcases in legacy mode",
                ),
        )
        .push(SuiteDescriptor::new(
            "sql_stmt_libxml2_tests",
            libxml2.clone().and(iconv.clone()),
        ))
        .push(SuiteDescriptor::new(
            "sql_stmt_xmlsec_tests",
            libxml2.clone().and(iconv).and(Gate::RelaxedSecurity),
        ))
        .push(SuiteDescriptor::new(
            "sql_stmt_libxml2_rttopo_tests",
            libxml2.and(Gate::requires(Capability::RtTopo)),
        ))
        .push(SuiteDescriptor::new("sql_stmt_geopackage_tests", gpkg_gate()).amphibious())
        .push(
            SuiteDescriptor::new(
                "sql_stmt_gpkg_epsg600_tests",
                gpkg_gate()
                    .and(Gate::requires(Capability::Epsg))
                    .and(proj6.clone()),
            )
            .amphibious(),
        )
        .push(
            SuiteDescriptor::new(
                "sql_stmt_gpkg_epsg493_tests",
                gpkg_gate()
                    .and(proj_gate())
                    .and(proj6.clone().negate())
                    .and(proj_493.clone()),
            )
            .amphibious(),
        )
        .push(
            SuiteDescriptor::new(
                "sql_stmt_gpkg_epsg492_tests",
                gpkg_gate()
                    .and(proj_gate())
                    .and(proj6.negate())
                    .and(proj_493.negate()),
            )
            .amphibious(),
        )
        .push(SuiteDescriptor::new(
            "sql_stmt_freexl_tests",
            Gate::requires(Capability::FreeXl).and(Gate::RelaxedSecurity),
        ))
        .push(SuiteDescriptor::new("sql_stmt_nocache_tests", Gate::Legacy))
        .push(SuiteDescriptor::new("sql_stmt_cache_tests", Gate::not_legacy()))
        .push(SuiteDescriptor::new(
            "sql_stmt_gpkgnocache_tests",
            Gate::requires(Capability::GeoPackage).and(Gate::Legacy),
        ))
        .push(SuiteDescriptor::new(
            "sql_stmt_gpkgcache_tests",
            Gate::requires(Capability::GeoPackage).and(Gate::not_legacy()),
        ))
        .push(
            SuiteDescriptor::new("sql_stmt_renameold_tests", sqlite_3250.clone().negate())
                .without_extension(),
        )
        .push(SuiteDescriptor::new("sql_stmt_renamenew_tests", sqlite_3250).without_extension())
        .push(SuiteDescriptor::new("sql_stmt_bufoptsold_tests", Gate::Legacy).without_extension())
        .push(
            SuiteDescriptor::new("sql_stmt_bufoptsnew_tests", Gate::not_legacy())
                .without_extension(),
        )
}
