//! Role dependency extraction
//!
//! Finds the roles a SQL script grants privileges to (or attaches policies
//! and ownership to), so they can be created before the script is replayed.
//! This is pattern matching over grant-target lists, not a SQL parser: lists
//! that are not properly terminated are skipped rather than guessed at.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::util::is_comment_line;

/// One identifier in a grant-target list: double-quoted or bare.
const LIST: &str = r#"(?:"[^"]+"|[A-Za-z0-9_$]+)(?:\s*,\s*(?:"[^"]+"|[A-Za-z0-9_$]+))*"#;

static GRANT_TO_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?is)\bGRANT\b[^;]*?\bTO\s+({list})\s*(?:;|\bWITH\b|\bGRANTED\b)",
        list = LIST
    ))
    .unwrap()
});

static POLICY_TO_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?is)\bCREATE\s+POLICY\b[^;]*?\bTO\s+({list})\s*(?:;|\bUSING\b|\bWITH\b)",
        list = LIST
    ))
    .unwrap()
});

static OWNER_TO_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bOWNER\s+TO\s+("[^"]+"|[A-Za-z0-9_$]+)\s*;"#).unwrap()
});

/// Splits a captured list on commas that are not inside double quotes.
static LIST_ITEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""[^"]+"|[A-Za-z0-9_$]+"#).unwrap());

/// Names that are never bootstrapped: built-in and platform-managed roles,
/// plus SQL keywords that can land right after `TO`.
pub const BUILTIN_DENYLIST: &[&str] = &[
    // PostgreSQL built-ins and pseudo-roles
    "public",
    "postgres",
    "current_user",
    "session_user",
    "current_role",
    // Hosted platform roles that already exist on every target
    "anon",
    "authenticated",
    "service_role",
    "authenticator",
    "dashboard_user",
    "pgbouncer",
    "supabase_admin",
    "supabase_auth_admin",
    "supabase_storage_admin",
    "supabase_functions_admin",
    "supabase_realtime_admin",
    "supabase_replication_admin",
    "supabase_read_only_user",
    "supabase_etl_admin",
    // Keywords
    "all",
    "with",
    "grant",
    "option",
    "role",
    "group",
    "user",
    "select",
    "insert",
    "update",
    "delete",
    "cascade",
    "restrict",
    "default",
    "null",
    "true",
    "false",
];

/// A normalized role identifier: lowercase, `[a-z0-9_]+`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RoleName(String);

impl RoleName {
    /// Normalize a raw identifier as it appears in SQL.
    ///
    /// Surrounding double quotes are removed, runs of whitespace become a
    /// single underscore, the result is lowercased and stripped of anything
    /// outside `[a-z0-9_]`. Returns `None` if nothing is left.
    pub fn normalize(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let unquoted = trimmed
            .strip_prefix('"')
            .and_then(|s| s.strip_suffix('"'))
            .unwrap_or(trimmed);

        let name: String = unquoted
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("_")
            .to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_')
            .collect();

        if name.is_empty() {
            None
        } else {
            Some(RoleName(name))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Extracts role dependencies from SQL text.
#[derive(Debug, Clone, Default)]
pub struct RoleExtractor {
    /// Project-specific names to ignore on top of [`BUILTIN_DENYLIST`]
    ignored: BTreeSet<String>,
}

impl RoleExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add project-specific noise names. They are normalized like role names.
    pub fn with_ignored<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.ignored.extend(
            names
                .into_iter()
                .filter_map(|n| RoleName::normalize(n.as_ref()))
                .map(|n| n.0),
        );
        self
    }

    /// True if a normalized name must never be bootstrapped.
    pub fn is_denied(&self, name: &RoleName) -> bool {
        let s = name.as_str();
        s.starts_with("pg_") || BUILTIN_DENYLIST.contains(&s) || self.ignored.contains(s)
    }

    /// Collect every role referenced in a grant, policy or ownership target
    /// across all sources, deduplicated and sorted.
    pub fn extract(&self, sources: &[&str]) -> BTreeSet<RoleName> {
        let mut roles = BTreeSet::new();

        for source in sources {
            let text = strip_line_comments(source);

            for re in [&*GRANT_TO_RE, &*POLICY_TO_RE, &*OWNER_TO_RE] {
                for caps in re.captures_iter(&text) {
                    let Some(list) = caps.get(1) else { continue };
                    for item in LIST_ITEM_RE.find_iter(list.as_str()) {
                        if let Some(name) = RoleName::normalize(item.as_str()) {
                            if !self.is_denied(&name) {
                                roles.insert(name);
                            }
                        }
                    }
                }
            }
        }

        roles
    }
}

/// Drop whole-line `--` comments so commented-out statements are not scanned.
fn strip_line_comments(sql: &str) -> String {
    sql.lines()
        .filter(|line| !is_comment_line(line))
        .collect::<Vec<_>>()
        .join("\n")
}
