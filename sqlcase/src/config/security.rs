use std::ffi::OsString;

/// Environment variable the spatial extension reads to unlock risky SQL functions.
pub const SECURITY_VARIABLE: &str = "SPATIALITE_SECURITY";

/// Value of [`SECURITY_VARIABLE`] that unlocks file-system, process and XML
/// signature suites.
pub const RELAXED: &str = "relaxed";

/// Security tier the run executes under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SecurityTier {
    #[default]
    Strict,
    Relaxed,
}

impl SecurityTier {
    /// Reads the tier from `variable`; only a case-insensitive `relaxed` relaxes it.
    pub fn from_env(variable: &str) -> SecurityTier {
        let value = std::env::var(variable).ok();
        SecurityTier::from_value(value.as_deref())
    }

    pub fn from_value(value: Option<&str>) -> SecurityTier {
        match value {
            Some(v) if v.eq_ignore_ascii_case(RELAXED) => SecurityTier::Relaxed,
            _ => SecurityTier::Strict,
        }
    }

    pub fn is_relaxed(&self) -> bool {
        matches!(self, SecurityTier::Relaxed)
    }
}

/// Sets the security variable to `relaxed` and puts the previous value back
/// (or removes the variable) when dropped.
///
/// The extension consults the variable itself at call time, so the override
/// must stay alive for as long as relaxed statements run.
#[must_use = "the previous value is restored as soon as the scope is dropped"]
pub struct SecurityScope {
    variable: String,
    previous: Option<OsString>,
}

impl SecurityScope {
    pub fn relaxed(variable: &str) -> SecurityScope {
        let previous = std::env::var_os(variable);
        std::env::set_var(variable, RELAXED);
        log::debug!("{} set to {} for this run", variable, RELAXED);
        SecurityScope {
            variable: variable.to_string(),
            previous,
        }
    }
}

impl Drop for SecurityScope {
    fn drop(&mut self) {
        match self.previous.take() {
            Some(value) => std::env::set_var(&self.variable, value),
            None => std::env::remove_var(&self.variable),
        }
    }
}
