use std::fmt::{Display, Formatter};

/// Descriptor asking for a brand-new, empty in-memory database.
pub const FRESH_MEMORY_DESCRIPTOR: &str = "NEW:memory:";

/// Suffix flagging a target that must be opened read-only.
pub const READ_ONLY_SUFFIX: &str = "_RO";

/// Path SQLite understands as a private in-memory database.
pub const MEMORY_PATH: &str = ":memory:";

/// The database a case runs against, decoded from the case file's second line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// `NEW:memory:`: never reused, always opened fresh.
    FreshMemory,
    /// A descriptor ending in `_RO`. The engine opens `descriptor` verbatim;
    /// `stored_path` is the descriptor without the suffix and is what a live
    /// connection remembers.
    ReadOnly {
        descriptor: String,
        stored_path: String,
    },
    /// Any other descriptor, opened read-write and created when absent.
    ReadWrite(String),
}

impl Target {
    pub fn parse(descriptor: &str) -> Target {
        if descriptor == FRESH_MEMORY_DESCRIPTOR {
            Target::FreshMemory
        } else if let Some(stored) = descriptor.strip_suffix(READ_ONLY_SUFFIX) {
            Target::ReadOnly {
                descriptor: descriptor.to_string(),
                stored_path: stored.to_string(),
            }
        } else {
            Target::ReadWrite(descriptor.to_string())
        }
    }

    pub fn is_read_only(&self) -> bool {
        matches!(self, Target::ReadOnly { .. })
    }

    pub fn is_fresh_memory(&self) -> bool {
        matches!(self, Target::FreshMemory)
    }

    /// True when the opened database lives in memory (fresh or the literal `:memory:`).
    pub fn is_memory(&self) -> bool {
        match self {
            Target::FreshMemory => true,
            Target::ReadWrite(path) => path == MEMORY_PATH,
            Target::ReadOnly { .. } => false,
        }
    }

    /// Path handed to the engine when opening.
    pub fn open_path(&self) -> &str {
        match self {
            Target::FreshMemory => MEMORY_PATH,
            Target::ReadOnly { descriptor, .. } => descriptor,
            Target::ReadWrite(path) => path,
        }
    }

    /// Path remembered by a connection opened for this target.
    pub fn stored_path(&self) -> &str {
        match self {
            Target::FreshMemory => MEMORY_PATH,
            Target::ReadOnly { stored_path, .. } => stored_path,
            Target::ReadWrite(path) => path,
        }
    }

    /// Decides whether a connection remembering `stored` serves this target.
    ///
    /// Read-only targets compare as many bytes as this target's own path has
    /// once the `_RO` suffix is dropped, so an open `a.sqlite.bak` also serves
    /// `a.sqlite_RO` but an open `a.sqlite` does not serve `a.sqlite.bak_RO`.
    /// Writable targets require exact equality. The fresh-memory sentinel
    /// never matches.
    pub fn same_location(&self, stored: &str) -> bool {
        match self {
            Target::FreshMemory => false,
            Target::ReadWrite(path) => path == stored,
            Target::ReadOnly { stored_path, .. } => {
                let n = stored_path.len();
                prefix(stored.as_bytes(), n) == stored_path.as_bytes()
            }
        }
    }
}

fn prefix(bytes: &[u8], n: usize) -> &[u8] {
    &bytes[..n.min(bytes.len())]
}

impl Display for Target {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::FreshMemory => write!(f, "{}", FRESH_MEMORY_DESCRIPTOR),
            Target::ReadOnly { descriptor, .. } => write!(f, "{}", descriptor),
            Target::ReadWrite(path) => write!(f, "{}", path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fresh_memory() {
        let target = Target::parse("NEW:memory:");
        assert_eq!(target, Target::FreshMemory);
        assert!(target.is_memory());
        assert_eq!(target.open_path(), ":memory:");
    }

    #[test]
    fn test_parse_read_only_strips_suffix_for_storage_only() {
        let target = Target::parse("foo.sqlite_RO");
        assert!(target.is_read_only());
        assert_eq!(target.open_path(), "foo.sqlite_RO");
        assert_eq!(target.stored_path(), "foo.sqlite");
    }

    #[test]
    fn test_literal_memory_path_is_reusable_memory() {
        let target = Target::parse(":memory:");
        assert_eq!(target, Target::ReadWrite(":memory:".to_string()));
        assert!(target.is_memory());
        assert!(target.same_location(":memory:"));
    }

    #[test]
    fn test_read_only_matches_stored_path() {
        let target = Target::parse("foo.sqlite_RO");
        assert!(target.same_location("foo.sqlite"));
        assert!(!target.same_location("bar.sqlite"));
    }

    #[test]
    fn test_read_only_match_uses_candidate_length() {
        // only len("fo") bytes are compared
        let target = Target::parse("fo_RO");
        assert!(target.same_location("foo"));
        let target = Target::parse("foox_RO");
        assert!(!target.same_location("foo"));
    }

    #[test]
    fn test_read_only_paths_sharing_a_prefix() {
        let longer = Target::parse("a.sqlite.bak_RO");
        assert!(!longer.same_location("a.sqlite"));
        assert!(longer.same_location("a.sqlite.bak"));

        let shorter = Target::parse("a.sqlite_RO");
        assert!(shorter.same_location("a.sqlite.bak"));
        assert!(shorter.same_location("a.sqlite"));
        assert!(!shorter.same_location("a.sql"));
    }

    #[test]
    fn test_writable_requires_exact_match() {
        let target = Target::parse("db/test.sqlite");
        assert!(target.same_location("db/test.sqlite"));
        assert!(!target.same_location("db/test.sqlite3"));
    }

    #[test]
    fn test_fresh_memory_never_matches() {
        assert!(!Target::FreshMemory.same_location(":memory:"));
    }

    #[test]
    fn test_display_round_trips_descriptor() {
        for descriptor in ["NEW:memory:", "a.sqlite_RO", "b.sqlite"] {
            assert_eq!(Target::parse(descriptor).to_string(), descriptor);
        }
    }
}
