//! Run configuration and the security-tier environment switch.

mod runner_config;
mod security;

pub use runner_config::*;
pub use security::*;
