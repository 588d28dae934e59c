//! Suite selection and fail-fast execution of case files.

mod catalog;
mod discovery;
mod gate;
mod runner;

pub use catalog::*;
pub use discovery::*;
pub use gate::*;
pub use runner::*;
