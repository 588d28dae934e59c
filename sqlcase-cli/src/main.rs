use clap::Parser;
use sqlcase::compare::PrecisionMode;
use sqlcase::config::{RunnerConfig, SecurityScope, DEFAULT_EXTENSION};
use sqlcase::engine::SharedCache;
use sqlcase::suite::{CaseFailure, RunReport, SuiteCatalog, SuiteRunner};
use sqlcase_sqlite_adapter::{SqliteCache, SqliteEngine};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "check_sql_stmt")]
#[command(version)]
#[command(about = "Runs declarative SQL test cases against SQLite and the spatial extension")]
#[command(long_about = "Runs declarative SQL test cases against SQLite and the spatial extension.

Without CASE_FILE arguments every suite of the built-in catalog that the
engine's capabilities, the security tier and the legacy flag allow is run,
in catalog order. With arguments only the given case files run, in order.

The run stops at the first failing case. The exit status is the failure's
negative status code truncated to a byte (-10 exits with 246).

SECURITY:
  Suites exercising file-system, process or XML signature functions only run
  when SPATIALITE_SECURITY=relaxed, or with --relaxed.")]
struct Args {
    /// Case files to run in order; every selected suite runs when omitted
    #[arg(value_name = "CASE_FILE")]
    files: Vec<PathBuf>,

    /// Directory holding one subdirectory per suite
    #[arg(long, value_name = "DIR", default_value = ".")]
    suites_root: PathBuf,

    /// Skip suites that need a modern build of the extension
    #[arg(long)]
    legacy: bool,

    /// Load the extension dynamically into every connection
    #[arg(long, value_name = "NAME", num_args = 0..=1, default_missing_value = DEFAULT_EXTENSION)]
    load_extension: Option<String>,

    /// Open connections without the shared connection cache
    #[arg(long)]
    no_shared_cache: bool,

    /// Relax the security tier for this run
    #[arg(long)]
    relaxed: bool,

    /// Resolve `:0` precisions against each actual value instead of learning them once
    #[arg(long)]
    strict_precision: bool,
}

impl Args {
    fn runner_config(&self) -> RunnerConfig {
        let precision = if self.strict_precision {
            PrecisionMode::Strict
        } else {
            PrecisionMode::Learn
        };
        let builder = RunnerConfig::with_config()
            .suites_root(self.suites_root.clone())
            .legacy(self.legacy)
            .precision_mode(precision);
        let builder = match &self.load_extension {
            Some(name) => builder.load_extension(name),
            None => builder.no_extension(),
        };
        builder.build()
    }

    /// Without dynamic loading the extension is registered either through the
    /// shared cache or as the engine's runtime extension.
    fn engine(&self) -> SqliteEngine {
        let builder = SqliteEngine::with_config();
        if self.load_extension.is_none() && self.no_shared_cache {
            builder.runtime_extension(DEFAULT_EXTENSION).build()
        } else {
            builder.build()
        }
    }

    fn shared_cache(&self) -> Option<SharedCache> {
        if self.no_shared_cache {
            return None;
        }
        let cache = SqliteCache::new("spatialite");
        let cache = match self.load_extension {
            Some(_) => cache,
            None => cache.extension(DEFAULT_EXTENSION),
        };
        Some(cache.shared())
    }
}

fn run(args: &Args, runner: &mut SuiteRunner) -> Result<RunReport, CaseFailure> {
    if !args.files.is_empty() {
        return runner.run_specified(&args.files);
    }
    let selection = runner
        .selection_context()
        .map_err(|err| CaseFailure::new(&args.suites_root, None, err))?;
    runner.run_all(SuiteCatalog::spatial(), &selection)
}

fn main() -> ExitCode {
    colog::init();
    let args = Args::parse();

    let config = args.runner_config();
    let _security = args
        .relaxed
        .then(|| SecurityScope::relaxed(config.security_variable()));

    let engine = args.engine().into_engine();
    log::info!("engine: {}", engine.name());
    let mut runner = SuiteRunner::new(engine, args.shared_cache(), config);

    let outcome = run(&args, &mut runner);
    if let Err(err) = runner.close() {
        log::error!("{}", err);
    }

    match outcome {
        Ok(report) => {
            log::info!(
                "all {} cases passed, {} suites skipped, {} connections opened",
                report.cases_passed,
                report.suites_skipped.len(),
                report.connections.opened
            );
            ExitCode::SUCCESS
        }
        Err(failure) => {
            log::error!("{}", failure);
            ExitCode::from(failure.exit_status())
        }
    }
}
