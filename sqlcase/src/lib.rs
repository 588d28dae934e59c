//! # sqlcase - Declarative SQL Test Cases
//!
//! sqlcase runs regression suites written as plain-text case files against a SQL
//! engine. Each case names a database, a statement and the exact table the
//! statement must produce; a run stops at the first case that disagrees.
//!
//! ## Key Features
//!
//! - **Case files**: line-oriented format with `#` comments, `(NULL)` markers and
//!   per-cell comparison precision (`value:N`)
//! - **Connection reuse**: consecutive cases naming the same database share one
//!   connection; `NEW:memory:` always starts from an empty database
//! - **Golden comparison**: shape, NULL, empty-string and prefix checks, plus
//!   expected-failure cases matched on the engine's error text
//! - **Suite catalog**: suites gated on engine capabilities, library versions,
//!   security tier and legacy mode
//! - **Pluggable engines**: anything implementing [`engine::SqlEngineProvider`]
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use sqlcase::config::RunnerConfig;
//! use sqlcase::suite::{SuiteCatalog, SuiteRunner};
//!
//! let config = RunnerConfig::with_config().suites_root("test").build();
//! let mut runner = SuiteRunner::new(engine, None, config);
//! let selection = runner.selection_context()?;
//! match runner.run_all(SuiteCatalog::spatial(), &selection) {
//!     Ok(report) => println!("{} cases passed", report.cases_passed),
//!     Err(failure) => std::process::exit(failure.exit_status() as i32),
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`case`] - Case-file model, target descriptors and parser
//! - [`compare`] - Result comparator and precision handling
//! - [`config`] - Runner configuration and security tier
//! - [`connection`] - Single shared connection and its reuse rules
//! - [`engine`] - Engine and connection traits, result tables
//! - [`errors`] - Error types, kinds and status codes
//! - [`probe`] - Single-value checks and capability detection
//! - [`suite`] - Suite catalog, gates, discovery and the runner

pub mod case;
pub mod compare;
pub mod config;
pub mod connection;
pub mod engine;
pub mod errors;
pub mod probe;
pub mod suite;

#[cfg(test)]
#[ctor::ctor]
fn init() {
    colog::init();
}
