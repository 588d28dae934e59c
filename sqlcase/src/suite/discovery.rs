use crate::errors::{ErrorKind, SqlCaseError, SqlCaseResult};
use itertools::Itertools;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// Lists the case files of one suite directory.
///
/// Only regular entries whose name ends with `suffix` are returned; names
/// starting with `.` are excluded. Order is the byte order of the file names,
/// which need not be valid UTF-8.
pub fn list_case_files(suite_dir: &Path, suffix: &str) -> SqlCaseResult<Vec<PathBuf>> {
    let entries = std::fs::read_dir(suite_dir).map_err(|err| {
        SqlCaseError::new(
            &format!("cannot scan {}: {}", suite_dir.display(), err),
            ErrorKind::SuiteError,
        )
    })?;

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name();
        if is_case_file(&name, suffix) {
            names.push(name);
        }
    }

    Ok(names
        .into_iter()
        .sorted_by(|a, b| a.as_encoded_bytes().cmp(b.as_encoded_bytes()))
        .map(|name| suite_dir.join(name))
        .collect())
}

fn is_case_file(name: &OsStr, suffix: &str) -> bool {
    let bytes = name.as_encoded_bytes();
    bytes.first() != Some(&b'.') && bytes.ends_with(suffix.as_bytes())
}
