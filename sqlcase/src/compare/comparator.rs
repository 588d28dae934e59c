use crate::case::TestCase;
use crate::engine::ResultTable;
use crate::errors::{ErrorKind, SqlCaseError, SqlCaseResult};

/// What a precision of `0` turns into once a value has been seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrecisionMode {
    /// A `0` precision is replaced in the case by the length of the first actual
    /// value compared, so later comparisons of the same parsed case demand that
    /// exact length.
    #[default]
    Learn,
    /// A `0` precision resolves to the actual length on every comparison and the
    /// case is never modified.
    Strict,
}

/// Checks a statement outcome against a case's expected table.
#[derive(Debug, Clone, Copy, Default)]
pub struct Comparator {
    mode: PrecisionMode,
}

impl Comparator {
    pub fn new(mode: PrecisionMode) -> Comparator {
        Comparator { mode }
    }

    pub fn mode(&self) -> PrecisionMode {
        self.mode
    }

    /// Compares `outcome` with `case`.
    ///
    /// A failed statement passes only for a 1x1 case whose data cell equals the
    /// engine's error text. Otherwise the shape must match, then every cell in
    /// row-major order: NULL needs the `(NULL)` marker, an empty string always
    /// fails and any other value must agree with the expected text on its first
    /// `precision` bytes.
    pub fn compare(
        &self,
        outcome: &SqlCaseResult<ResultTable>,
        case: &mut TestCase,
    ) -> SqlCaseResult<()> {
        let table = match outcome {
            Ok(table) => table,
            Err(err) => return expected_failure(err, case),
        };

        if table.rows() != case.expected_rows || table.columns() != case.expected_columns {
            return Err(SqlCaseError::new(
                &format!(
                    "bad result: {}/{} (expected {}/{})",
                    table.rows(),
                    table.columns(),
                    case.expected_rows,
                    case.expected_columns
                ),
                ErrorKind::ShapeMismatch,
            ));
        }

        let total = case.cell_count();
        if case.expected_cells.len() < total || case.expected_precision.len() < total {
            return Err(SqlCaseError::new(
                &format!(
                    "case '{}' declares {} cells but holds {}",
                    case.name,
                    total,
                    case.expected_cells.len().min(case.expected_precision.len())
                ),
                ErrorKind::InternalError,
            ));
        }

        let mut scratch;
        let precision = match self.mode {
            PrecisionMode::Learn => &mut case.expected_precision,
            PrecisionMode::Strict => {
                scratch = case.expected_precision.clone();
                &mut scratch
            }
        };

        for (i, expected) in case.expected_cells.iter().take(total).enumerate() {
            let actual = table.cell(i).ok_or_else(|| {
                SqlCaseError::new(
                    &format!("result table has no cell {}", i),
                    ErrorKind::InternalError,
                )
            })?;

            let actual = match actual {
                None if expected.is_null() => continue,
                None => {
                    return Err(SqlCaseError::new(
                        &format!(
                            "Null value at {}.\nExpected value was: {}",
                            i,
                            expected.as_str()
                        ),
                        ErrorKind::UnexpectedNull,
                    ))
                }
                Some(actual) => actual,
            };

            if precision[i] == 0 {
                precision[i] = actual.len();
            }

            if actual.is_empty() {
                return Err(SqlCaseError::new(
                    &format!(
                        "zero length result at {}\nExpected value was    : {}|",
                        i,
                        expected.as_str()
                    ),
                    ErrorKind::UnexpectedEmpty,
                ));
            }

            if !prefix_eq(actual, expected.as_str(), precision[i]) {
                return Err(SqlCaseError::new(
                    &format!(
                        "Unexpected value at {}: {}|\nExpected value was   : {}|",
                        i,
                        actual,
                        expected.as_str()
                    ),
                    ErrorKind::ValueMismatch,
                ));
            }
        }
        Ok(())
    }
}

fn expected_failure(err: &SqlCaseError, case: &TestCase) -> SqlCaseResult<()> {
    if let Some(expected) = case.single_value() {
        if err.message() == expected.as_str() {
            log::debug!("statement failed as expected: {}", err.message());
            return Ok(());
        }
    }
    Err(SqlCaseError::new_with_cause(
        &format!("Error: {}", err.message()),
        ErrorKind::ExecutionError,
        err.clone(),
    ))
}

/// `strncmp(actual, expected, n) == 0` for NUL-free strings.
fn prefix_eq(actual: &str, expected: &str, n: usize) -> bool {
    let a = actual.as_bytes();
    let e = expected.as_bytes();
    a[..n.min(a.len())] == e[..n.min(e.len())]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::case::{parse_case, ExpectedCell, Target};

    fn case(rows: usize, columns: usize, cells: &[&str], precision: &[usize]) -> TestCase {
        TestCase {
            name: "case".to_string(),
            target: Target::FreshMemory,
            statement: "SELECT x".to_string(),
            expected_rows: rows,
            expected_columns: columns,
            expected_cells: cells.iter().map(|c| ExpectedCell::from_text(c)).collect(),
            expected_precision: precision.to_vec(),
        }
    }

    fn table(columns: &[&str], rows: &[&[Option<&str>]]) -> SqlCaseResult<ResultTable> {
        let mut table = ResultTable::with_header(columns.iter().copied());
        for row in rows {
            table.push_row(row.iter().map(|c| c.map(String::from)).collect())?;
        }
        Ok(table)
    }

    fn failed(message: &str) -> SqlCaseResult<ResultTable> {
        Err(SqlCaseError::new(message, ErrorKind::ExecutionError))
    }

    #[test]
    fn test_exact_match_passes() {
        let mut case = case(1, 2, &["a", "b", "1", "two"], &[0, 0, 0, 0]);
        let outcome = table(&["a", "b"], &[&[Some("1"), Some("two")]]);
        assert!(Comparator::default().compare(&outcome, &mut case).is_ok());
    }

    #[test]
    fn test_precision_prefix_comparison() {
        let comparator = Comparator::default();
        let mut abc = case(1, 1, &["v", "abc"], &[0, 2]);

        let outcome = table(&["v"], &[&[Some("abxyz")]]);
        assert!(comparator.compare(&outcome, &mut abc).is_ok());

        let outcome = table(&["v"], &[&[Some("xyc")]]);
        let err = comparator.compare(&outcome, &mut abc).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ValueMismatch);
        assert!(err.message().contains("xyc"));
        assert!(err.message().contains("abc"));
    }

    #[test]
    fn test_precision_parsed_from_case_file() {
        let source = "p\nNEW:memory:\nSELECT 1.23456\n1\n1\nv\n1.23:4\n";
        let mut case = parse_case(source, "p").unwrap();
        let outcome = table(&["v"], &[&[Some("1.23456")]]);
        assert!(Comparator::default().compare(&outcome, &mut case).is_ok());
    }

    #[test]
    fn test_null_cells() {
        let comparator = Comparator::default();
        let mut expects_null = case(1, 1, &["result", "(NULL)"], &[0, 0]);
        let outcome = table(&["result"], &[&[None]]);
        assert!(comparator.compare(&outcome, &mut expects_null).is_ok());

        let mut expects_value = case(1, 1, &["result", "NULL"], &[0, 0]);
        let err = comparator.compare(&outcome, &mut expects_value).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::UnexpectedNull);
        assert_eq!(err.status_code(), -12);
    }

    #[test]
    fn test_empty_actual_always_fails() {
        let mut case = case(1, 1, &["v", "x"], &[0, 0]);
        let outcome = table(&["v"], &[&[Some("")]]);
        let err = Comparator::default().compare(&outcome, &mut case).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::UnexpectedEmpty);
    }

    #[test]
    fn test_shape_mismatch() {
        let mut case = case(2, 1, &["v", "1", "2"], &[0, 0, 0]);
        let outcome = table(&["v"], &[&[Some("1")]]);
        let err = Comparator::default().compare(&outcome, &mut case).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ShapeMismatch);
        assert!(err.message().contains("1/1"));
    }

    #[test]
    fn test_header_only_comparison() {
        let mut case = case(0, 1, &["1"], &[0]);
        let outcome = table(&["1"], &[]);
        assert!(Comparator::default().compare(&outcome, &mut case).is_ok());

        let mut wrong_header = self::case(0, 1, &["2"], &[0]);
        assert!(Comparator::default().compare(&outcome, &mut wrong_header).is_err());
    }

    #[test]
    fn test_expected_failure_one_by_one() {
        let comparator = Comparator::default();
        let mut case = case(1, 1, &["result", "no such table: missing"], &[0, 0]);
        assert!(comparator
            .compare(&failed("no such table: missing"), &mut case)
            .is_ok());

        let err = comparator
            .compare(&failed("no such table: other"), &mut case)
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ExecutionError);
        assert_eq!(err.cause().map(|c| c.message()), Some("no such table: other"));
    }

    #[test]
    fn test_failed_execution_rejected_for_other_shapes() {
        let mut two_rows = case(2, 1, &["r", "boom", "boom"], &[0, 0, 0]);
        let err = Comparator::default()
            .compare(&failed("boom"), &mut two_rows)
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ExecutionError);

        let mut empty = case(0, 0, &[], &[]);
        assert!(Comparator::default().compare(&failed("boom"), &mut empty).is_err());
    }

    #[test]
    fn test_expected_failure_ignores_precision() {
        let mut case = case(1, 1, &["r", "near"], &[0, 2]);
        assert!(Comparator::default()
            .compare(&failed("near \"x\": syntax error"), &mut case)
            .is_err());
    }

    #[test]
    fn test_zero_precision_accepts_actual_that_prefixes_expected() {
        // strncmp over the actual length only
        let mut case = case(1, 1, &["v", "abcdef"], &[0, 0]);
        let outcome = table(&["v"], &[&[Some("abc")]]);
        assert!(Comparator::default().compare(&outcome, &mut case).is_ok());

        let mut case = self::case(1, 1, &["v", "abc"], &[0, 0]);
        let outcome = table(&["v"], &[&[Some("abcdef")]]);
        assert!(Comparator::default().compare(&outcome, &mut case).is_err());
    }

    #[test]
    fn test_learn_mode_ratchets_precision() {
        let comparator = Comparator::new(PrecisionMode::Learn);
        let mut case = case(1, 1, &["v", "abcdef"], &[0, 0]);

        let first = table(&["v"], &[&[Some("abc")]]);
        assert!(comparator.compare(&first, &mut case).is_ok());
        assert_eq!(case.expected_precision, vec![1, 3]);

        let second = table(&["v"], &[&[Some("abcdef")]]);
        assert!(comparator.compare(&second, &mut case).is_ok());
        assert_eq!(case.expected_precision, vec![1, 3]);
    }

    #[test]
    fn test_strict_mode_leaves_case_untouched() {
        let comparator = Comparator::new(PrecisionMode::Strict);
        let mut case = case(1, 1, &["v", "abcdef"], &[0, 0]);

        let first = table(&["v"], &[&[Some("abc")]]);
        assert!(comparator.compare(&first, &mut case).is_ok());
        assert_eq!(case.expected_precision, vec![0, 0]);

        let longer = table(&["v"], &[&[Some("abcdef")]]);
        assert!(comparator.compare(&longer, &mut case).is_ok());
        assert_eq!(case.expected_precision, vec![0, 0]);
    }

    #[test]
    fn test_learned_length_can_reject_later_value() {
        let comparator = Comparator::new(PrecisionMode::Learn);
        let mut case = case(1, 1, &["v", "abc"], &[0, 0]);
        assert!(comparator
            .compare(&table(&["v"], &[&[Some("ab")]]), &mut case)
            .is_ok());
        // only two bytes are compared from now on
        assert!(comparator
            .compare(&table(&["v"], &[&[Some("abZZ")]]), &mut case)
            .is_ok());
        assert!(comparator
            .compare(&table(&["v"], &[&[Some("aZ")]]), &mut case)
            .is_err());
    }

    #[test]
    fn test_text_null_marker_matches_literal_text() {
        let mut case = case(1, 1, &["v", "(NULL)"], &[0, 0]);
        let outcome = table(&["v"], &[&[Some("(NULL)")]]);
        assert!(Comparator::default().compare(&outcome, &mut case).is_ok());
    }

    #[test]
    fn test_inconsistent_case_is_internal_error() {
        let mut case = case(1, 1, &["v"], &[0]);
        let outcome = table(&["v"], &[&[Some("1")]]);
        let err = Comparator::default().compare(&outcome, &mut case).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InternalError);
    }
}
