//! Golden-value comparison of a result table against a case.

mod comparator;

pub use comparator::*;
