use crate::config::SecurityTier;
use std::collections::HashSet;
use std::fmt::{Display, Formatter};

/// Optional feature of the engine under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    TinyPoint,
    Geos,
    GeosAdvanced,
    GeosReentrant,
    /// Only the thread-safe GEOS API is compiled in.
    GeosOnlyReentrant,
    Proj,
    /// PROJ 6 or later.
    Proj6,
    /// Full EPSG dataset.
    Epsg,
    MathSql,
    Iconv,
    LibXml2,
    RtTopo,
    GeoPackage,
    FreeXl,
    MiniZip,
}

/// Library whose version can gate a suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Library {
    Sqlite,
    Geos,
    Proj,
}

/// `major.minor.patch` version, compared numerically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct LibraryVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl LibraryVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> LibraryVersion {
        LibraryVersion {
            major,
            minor,
            patch,
        }
    }

    /// Extracts the first dotted number from a version banner.
    ///
    /// `"3.8.1-CAPI-1.13.3"` gives 3.8.1 and `"Rel. 6.3.1, February 10th, 2020"`
    /// gives 6.3.1. Missing components are 0; text without digits gives `None`.
    pub fn parse(text: &str) -> Option<LibraryVersion> {
        let start = text.find(|c: char| c.is_ascii_digit())?;
        let rest = &text[start..];
        let end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());

        let mut parts = rest[..end]
            .split('.')
            .map(|part| part.parse::<u32>().unwrap_or(0));
        Some(LibraryVersion {
            major: parts.next().unwrap_or(0),
            minor: parts.next().unwrap_or(0),
            patch: parts.next().unwrap_or(0),
        })
    }
}

impl Display for LibraryVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// What the engine under test supports.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    flags: HashSet<Capability>,
    sqlite_version: Option<LibraryVersion>,
    geos_version: Option<LibraryVersion>,
    proj_version: Option<LibraryVersion>,
}

impl Capabilities {
    pub fn new() -> Capabilities {
        Capabilities::default()
    }

    pub fn with(mut self, capability: Capability) -> Self {
        self.flags.insert(capability);
        self
    }

    pub fn with_version(mut self, library: Library, version: LibraryVersion) -> Self {
        self.set_version(library, Some(version));
        self
    }

    pub fn set(&mut self, capability: Capability, enabled: bool) {
        if enabled {
            self.flags.insert(capability);
        } else {
            self.flags.remove(&capability);
        }
    }

    pub fn set_version(&mut self, library: Library, version: Option<LibraryVersion>) {
        match library {
            Library::Sqlite => self.sqlite_version = version,
            Library::Geos => self.geos_version = version,
            Library::Proj => self.proj_version = version,
        }
    }

    pub fn has(&self, capability: Capability) -> bool {
        self.flags.contains(&capability)
    }

    pub fn version(&self, library: Library) -> Option<LibraryVersion> {
        match library {
            Library::Sqlite => self.sqlite_version,
            Library::Geos => self.geos_version,
            Library::Proj => self.proj_version,
        }
    }
}

/// Everything a [`Gate`] can look at.
#[derive(Debug, Clone, Default)]
pub struct SelectionContext {
    pub capabilities: Capabilities,
    pub security: SecurityTier,
    pub legacy: bool,
}

impl SelectionContext {
    pub fn new(capabilities: Capabilities, security: SecurityTier, legacy: bool) -> Self {
        SelectionContext {
            capabilities,
            security,
            legacy,
        }
    }
}

/// Predicate deciding whether a suite runs.
#[derive(Debug, Clone, PartialEq)]
pub enum Gate {
    Always,
    Capability(Capability),
    RelaxedSecurity,
    Legacy,
    /// Version of `library` is known and at least the given one.
    VersionAtLeast(Library, LibraryVersion),
    Not(Box<Gate>),
    All(Vec<Gate>),
    Any(Vec<Gate>),
}

impl Gate {
    pub fn requires(capability: Capability) -> Gate {
        Gate::Capability(capability)
    }

    pub fn at_least(library: Library, major: u32, minor: u32, patch: u32) -> Gate {
        Gate::VersionAtLeast(library, LibraryVersion::new(major, minor, patch))
    }

    pub fn not_legacy() -> Gate {
        Gate::Not(Box::new(Gate::Legacy))
    }

    pub fn negate(self) -> Gate {
        Gate::Not(Box::new(self))
    }

    /// Conjunction of `self` and `other`, flattening nested `All`s.
    pub fn and(self, other: Gate) -> Gate {
        match self {
            Gate::Always => other,
            Gate::All(mut gates) => {
                gates.push(other);
                Gate::All(gates)
            }
            gate => Gate::All(vec![gate, other]),
        }
    }

    pub fn evaluate(&self, context: &SelectionContext) -> bool {
        match self {
            Gate::Always => true,
            Gate::Capability(capability) => context.capabilities.has(*capability),
            Gate::RelaxedSecurity => context.security.is_relaxed(),
            Gate::Legacy => context.legacy,
            Gate::VersionAtLeast(library, minimum) => context
                .capabilities
                .version(*library)
                .is_some_and(|version| version >= *minimum),
            Gate::Not(gate) => !gate.evaluate(context),
            Gate::All(gates) => gates.iter().all(|g| g.evaluate(context)),
            Gate::Any(gates) => gates.iter().any(|g| g.evaluate(context)),
        }
    }
}
