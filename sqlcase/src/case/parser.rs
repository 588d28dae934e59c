use crate::case::{ExpectedCell, Target, TestCase};
use crate::errors::{ErrorKind, SqlCaseError, SqlCaseResult};
use std::path::Path;

/// Reads and parses one case file.
pub fn read_case_file(path: &Path) -> SqlCaseResult<TestCase> {
    let bytes = std::fs::read(path).map_err(|err| {
        SqlCaseError::new(
            &format!("cannot read case file {}: {}", path.display(), err),
            ErrorKind::IOError,
        )
    })?;
    let source = String::from_utf8_lossy(&bytes);
    parse_case(&source, &path.display().to_string())
}

/// Parses the text of a case file. `origin` only appears in error messages.
///
/// Layout: name, target, statement, row count, column count, then
/// `(rows + 1) * columns` expected cells with the header row first.
pub fn parse_case(source: &str, origin: &str) -> SqlCaseResult<TestCase> {
    let mut reader = LineReader::new(source, origin);

    let name = reader.next_line()?.to_string();
    let target = Target::parse(reader.next_line()?);
    let statement = reader.next_line()?.to_string();
    let expected_rows = count(reader.next_line()?);
    let expected_columns = count(reader.next_line()?);

    let total = expected_rows
        .checked_add(1)
        .and_then(|rows| rows.checked_mul(expected_columns))
        .ok_or_else(|| {
            SqlCaseError::new(
                &format!(
                    "{}: {} rows by {} columns is too many cells",
                    origin, expected_rows, expected_columns
                ),
                ErrorKind::ParseError,
            )
        })?;

    // grows with the lines actually present; the declared counts are untrusted
    let mut expected_cells = Vec::new();
    let mut expected_precision = Vec::new();
    for _ in 0..total {
        let (text, precision) = split_precision(reader.next_line()?);
        expected_cells.push(ExpectedCell::from_text(text));
        expected_precision.push(precision);
    }

    Ok(TestCase {
        name,
        target,
        statement,
        expected_rows,
        expected_columns,
        expected_cells,
        expected_precision,
    })
}

struct LineReader<'a> {
    lines: std::str::SplitInclusive<'a, char>,
    origin: &'a str,
    line_no: usize,
}

impl<'a> LineReader<'a> {
    fn new(source: &'a str, origin: &'a str) -> Self {
        LineReader {
            lines: source.split_inclusive('\n'),
            origin,
            line_no: 0,
        }
    }

    fn next_line(&mut self) -> SqlCaseResult<&'a str> {
        self.line_no += 1;
        match self.lines.next() {
            Some(raw) => Ok(clean_line(raw)),
            None => Err(SqlCaseError::new(
                &format!(
                    "{}: unexpected end of file, line {} is missing",
                    self.origin, self.line_no
                ),
                ErrorKind::ParseError,
            )),
        }
    }
}

/// Drops the newline, everything from the first `#`, then trailing spaces.
pub(crate) fn clean_line(raw: &str) -> &str {
    let end = raw.find(|c: char| c == '\n' || c == '#').unwrap_or(raw.len());
    raw[..end].trim_end_matches(' ')
}

/// Splits a trailing `:<positive integer>` precision off a cell.
///
/// Only the last `:` is considered. When what follows does not start with a
/// positive number the cell is kept intact and the precision is `0`.
pub(crate) fn split_precision(cell: &str) -> (&str, usize) {
    match cell.rfind(':') {
        Some(pos) => match atoi(&cell[pos + 1..]) {
            n if n > 0 => (&cell[..pos], n as usize),
            _ => (cell, 0),
        },
        None => (cell, 0),
    }
}

fn count(text: &str) -> usize {
    atoi(text).max(0) as usize
}

/// C `atoi`: leading whitespace, optional sign, then as many digits as present.
/// Anything unparsable yields `0`.
pub(crate) fn atoi(text: &str) -> i64 {
    let trimmed = text.trim_start();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let value = digits
        .bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0i64, |acc, d| {
            acc.saturating_mul(10).saturating_add((d - b'0') as i64)
        });
    if negative {
        -value
    } else {
        value
    }
}
