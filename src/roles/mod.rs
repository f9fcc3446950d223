//! Role dependency detection and bootstrap

mod bootstrap;
mod extractor;

pub use bootstrap::{bootstrap_sql, write_bootstrap, BootstrapOutcome, BOOTSTRAP_FILE_NAME};
pub use extractor::{RoleExtractor, RoleName, BUILTIN_DENYLIST};
