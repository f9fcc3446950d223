//! Role bootstrap migration
//!
//! Writes a single migration that creates every referenced role if it is
//! missing. Its name sorts before any timestamped migration so the migration
//! runner applies it before the grants and policies that need those roles.
//! The file is written once: if it already exists it is left untouched.

use std::collections::BTreeSet;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::Path;

use crate::error::CloneError;
use crate::filters::quote_literal;

use super::extractor::RoleName;

/// File name of the bootstrap migration inside the migrations directory
pub const BOOTSTRAP_FILE_NAME: &str = "00000000000000_roles_bootstrap.sql";

/// Result of attempting to write the bootstrap migration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// A new file was written containing this many roles
    Created(usize),
    /// A bootstrap file was already present and was not modified
    AlreadyExists,
}

/// Render the bootstrap script for a set of roles.
pub fn bootstrap_sql(roles: &BTreeSet<RoleName>) -> String {
    let literals: Vec<String> = roles.iter().map(|r| quote_literal(r.as_str())).collect();

    let mut sql = String::new();
    sql.push_str("-- Roles referenced by grants, policies and ownership in this project.\n");
    sql.push_str("-- Generated once; edit by hand if roles change.\n");
    sql.push_str("DO $$\n");
    sql.push_str("DECLARE\n");
    sql.push_str("  role_name text;\n");
    sql.push_str("BEGIN\n");
    sql.push_str(&format!(
        "  FOREACH role_name IN ARRAY ARRAY[{}]::text[] LOOP\n",
        literals.join(", ")
    ));
    sql.push_str(
        "    IF NOT EXISTS (SELECT 1 FROM pg_catalog.pg_roles WHERE rolname = role_name) THEN\n",
    );
    sql.push_str("      EXECUTE format('CREATE ROLE %I NOLOGIN', role_name);\n");
    sql.push_str("    END IF;\n");
    sql.push_str("  END LOOP;\n");
    sql.push_str("END\n");
    sql.push_str("$$;\n");
    sql
}

/// Write the bootstrap migration at `path` unless a file is already there.
pub fn write_bootstrap(
    roles: &BTreeSet<RoleName>,
    path: &Path,
) -> Result<BootstrapOutcome, CloneError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| CloneError::ArtifactWrite {
            path: path.to_path_buf(),
            source,
        })?;
    }

    // create_new makes the existence check and the creation one step
    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == ErrorKind::AlreadyExists => {
            return Ok(BootstrapOutcome::AlreadyExists)
        }
        Err(source) => {
            return Err(CloneError::ArtifactWrite {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    file.write_all(bootstrap_sql(roles).as_bytes())
        .map_err(|source| CloneError::ArtifactWrite {
            path: path.to_path_buf(),
            source,
        })?;

    Ok(BootstrapOutcome::Created(roles.len()))
}
