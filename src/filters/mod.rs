//! Statement filters for dump artifacts
//!
//! Each filter is a total `&str -> String` transform that recognises one
//! statement shape and leaves everything else byte-for-byte unchanged. The
//! pipelines below fix the order in which they run for each artifact kind.

mod copy_block;
mod create_role;
mod managed_schema;
mod ownership;
mod sequences;

use tracing::debug;

pub use copy_block::{
    copy_blocks_to_inserts, copy_field_to_sql, parse_copy_header, quote_literal, row_to_insert,
    CopyHeader, COPY_NULL,
};
pub(crate) use copy_block::COPY_END;
pub use create_role::make_roles_idempotent;
pub use managed_schema::{filter_managed_schemas, MANAGED_SCHEMAS};
pub use ownership::{strip_grantors, strip_owners};
pub use sequences::{harden_setval, parse_sequence_ref, SequenceRef};

/// Which optional filters to apply when building effective artifacts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterOptions {
    /// Comment out `OWNER TO` / `REASSIGN OWNED BY`
    pub strip_owners: bool,
    /// Remove `GRANTED BY` clauses
    pub strip_grantors: bool,
    /// Comment out DDL for platform-managed schemas (local targets only)
    pub local_safe: bool,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            strip_owners: true,
            strip_grantors: true,
            local_safe: false,
        }
    }
}

/// Count lines that differ between two texts with the same line structure.
fn changed_lines(before: &str, after: &str) -> usize {
    before
        .lines()
        .zip(after.lines())
        .filter(|(a, b)| a != b)
        .count()
}

/// Build the effective roles artifact.
pub fn filter_roles(sql: &str, options: &FilterOptions) -> String {
    let mut result = make_roles_idempotent(sql);
    debug!(
        "roles: {} CREATE ROLE statements made idempotent",
        changed_lines(sql, &result)
    );

    if options.strip_grantors {
        result = strip_grantors(&result);
    }
    if options.strip_owners {
        result = strip_owners(&result);
    }
    result
}

/// Build the effective schema artifact.
pub fn filter_schema(sql: &str, options: &FilterOptions) -> String {
    let mut result = sql.to_string();

    if options.strip_owners {
        let stripped = strip_owners(&result);
        debug!(
            "schema: {} ownership lines commented out",
            changed_lines(&result, &stripped)
        );
        result = stripped;
    }

    if options.strip_grantors {
        result = strip_grantors(&result);
    }

    if options.local_safe {
        let filtered = filter_managed_schemas(&result);
        debug!(
            "schema: {} managed-schema statements commented out",
            changed_lines(&result, &filtered)
        );
        result = filtered;
    }

    result
}

/// Build the effective data artifact: per-row INSERTs and guarded setval calls.
///
/// setval calls are guarded first, while COPY rows are still one line each;
/// converted rows may span lines and are not scanned again.
pub fn filter_data(sql: &str) -> String {
    copy_blocks_to_inserts(&harden_setval(sql))
}
