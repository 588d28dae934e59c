//! The seam between the runner and the database engine under test.

mod engine;
#[cfg(test)]
pub(crate) mod scripted;

pub use engine::*;
