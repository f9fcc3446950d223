//! Local-safe filtering of platform-managed schemas
//!
//! A local development stack already creates and owns these schemas, so
//! replaying their DDL from a hosted dump collides with the local bootstrap.

use std::sync::LazyLock;

use regex::Regex;

use crate::util::{comment_out, is_comment_line, map_lines};

/// Schemas owned by the platform runtime on a local instance.
pub const MANAGED_SCHEMAS: &[&str] = &[
    "auth",
    "storage",
    "realtime",
    "graphql_public",
    "extensions",
    "vault",
    "supabase_functions",
];

static SCHEMA_DDL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)^\s*(?:CREATE|ALTER|DROP)\s+SCHEMA\s+(?:IF\s+(?:NOT\s+)?EXISTS\s+)?(?:"([^"]+)"|([A-Za-z_][A-Za-z0-9_$]*))"#,
    )
    .unwrap()
});

/// Returns true if `name` (as written in the dump) refers to a managed schema.
///
/// Quoted names are case-sensitive, bare names fold to lowercase like PostgreSQL does.
fn is_managed(quoted: Option<&str>, bare: Option<&str>) -> bool {
    match (quoted, bare) {
        (Some(q), _) => MANAGED_SCHEMAS.contains(&q),
        (None, Some(b)) => MANAGED_SCHEMAS.contains(&b.to_lowercase().as_str()),
        (None, None) => false,
    }
}

/// Comment out CREATE/ALTER/DROP SCHEMA statements for managed schemas.
pub fn filter_managed_schemas(sql: &str) -> String {
    map_lines(sql, |line| {
        if is_comment_line(line) {
            return None;
        }
        let caps = SCHEMA_DDL_RE.captures(line)?;
        let quoted = caps.get(1).map(|m| m.as_str());
        let bare = caps.get(2).map(|m| m.as_str());
        is_managed(quoted, bare).then(|| comment_out(line))
    })
}
