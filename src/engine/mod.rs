//! Boundary to the external dump/restore/diff tooling
//!
//! The pipeline never looks inside these tools: it hands them a connection
//! string, a mode and file paths, and reads back the produced SQL text and
//! the exit status. Tests substitute in-memory implementations.

mod process;

use std::path::Path;

use crate::error::CloneError;

pub use process::{check_required_tools, PgTools, Psql};

/// What a dump captures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpMode {
    /// Cluster roles only
    RoleOnly,
    /// DDL, grants and policies
    SchemaOnly,
    /// Table contents
    DataOnly,
}

/// A single dump invocation
#[derive(Debug, Clone)]
pub struct DumpRequest<'a> {
    pub db_url: &'a str,
    pub mode: DumpMode,
    /// Schemas to include (empty means all)
    pub schemas: &'a [String],
    /// Tables to include (empty means all in the selected schemas)
    pub include_tables: &'a [String],
    pub exclude_tables: &'a [String],
    pub output: &'a Path,
}

/// How a script runner reacts to a failing statement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorMode {
    /// Abort the script at the first failing statement
    StopOnError,
    /// Log the failure and run the remaining statements
    Continue,
}

/// Produces SQL artifacts from a database
pub trait DumpEngine {
    /// Write a dump of `request.db_url` to `request.output`.
    fn dump(&self, request: &DumpRequest<'_>) -> Result<(), CloneError>;

    /// Write the schema difference between an empty database and `db_url` to `output`.
    fn diff(&self, db_url: &str, schemas: &[String], output: &Path) -> Result<(), CloneError>;

    /// Rebuild the local database from the project's migrations and seed.
    fn reset(&self, project_root: &Path) -> Result<(), CloneError>;
}

/// Runs a SQL script against a live database
pub trait SqlExecutor {
    fn execute(&self, db_url: &str, script: &Path, mode: ErrorMode) -> Result<(), CloneError>;
}
