//! Lifecycle of the single database connection shared by consecutive cases.

mod manager;

pub use manager::*;
