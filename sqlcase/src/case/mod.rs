//! Case files: the target descriptor, the in-memory case record and its parser.

mod parser;
mod target;
mod test_case;

pub use parser::*;
pub use target::*;
pub use test_case::*;
