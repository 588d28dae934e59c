use crate::case::Target;

/// Literal standing for a database NULL in a case file.
pub const NULL_MARKER: &str = "(NULL)";

/// One expected cell of a case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpectedCell {
    /// The `(NULL)` marker.
    Null,
    Text(String),
}

impl ExpectedCell {
    pub fn from_text(text: &str) -> ExpectedCell {
        if text == NULL_MARKER {
            ExpectedCell::Null
        } else {
            ExpectedCell::Text(text.to_string())
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ExpectedCell::Null)
    }

    /// The cell as written in the case file (the marker for NULL).
    pub fn as_str(&self) -> &str {
        match self {
            ExpectedCell::Null => NULL_MARKER,
            ExpectedCell::Text(text) => text,
        }
    }
}

/// A single declarative scenario: one statement and the table it must produce.
///
/// `expected_cells` and `expected_precision` are parallel, row-major and include
/// the header row, so both hold `(expected_rows + 1) * expected_columns` entries.
/// A precision of `0` means "the whole actual value".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    pub name: String,
    pub target: Target,
    pub statement: String,
    pub expected_rows: usize,
    pub expected_columns: usize,
    pub expected_cells: Vec<ExpectedCell>,
    pub expected_precision: Vec<usize>,
}

impl TestCase {
    /// Number of header + data cells the case declares, saturating at
    /// `usize::MAX`.
    pub fn cell_count(&self) -> usize {
        self.expected_rows
            .saturating_add(1)
            .saturating_mul(self.expected_columns)
    }

    /// True when the case can only pass through a failing statement:
    /// a 1x1 shape whose single data cell holds the engine's error text.
    pub fn declares_single_value(&self) -> bool {
        self.expected_rows == 1 && self.expected_columns == 1
    }

    /// The sole data cell of a 1x1 case.
    pub fn single_value(&self) -> Option<&ExpectedCell> {
        if self.declares_single_value() {
            self.expected_cells.get(1)
        } else {
            None
        }
    }
}
