//! Ownership and grantor stripping
//!
//! Dumps taken from a hosted project carry `ALTER ... OWNER TO` statements and
//! `GRANTED BY` clauses naming identities that usually do not exist on the
//! target (or are not superuser there). Ownership lines are commented out so
//! line numbers in psql error output still match the raw dump.

use std::sync::LazyLock;

use regex::Regex;

use crate::util::{comment_out, is_comment_line, map_lines};

static OWNER_TO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bOWNER\s+TO\b").unwrap());

static REASSIGN_OWNED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*REASSIGN\s+OWNED\s+BY\b").unwrap());

/// ` GRANTED BY <role>` where the role is bare or double-quoted.
static GRANTED_BY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\s+GRANTED\s+BY\s+(?:"(?:[^"]|"")+"|[A-Za-z_][A-Za-z0-9_$]*)"#).unwrap()
});

/// Comment out every `OWNER TO` and `REASSIGN OWNED BY` line.
pub fn strip_owners(sql: &str) -> String {
    map_lines(sql, |line| {
        if is_comment_line(line) {
            return None;
        }
        if OWNER_TO_RE.is_match(line) || REASSIGN_OWNED_RE.is_match(line) {
            Some(comment_out(line))
        } else {
            None
        }
    })
}

/// Remove `GRANTED BY <role>` clauses, keeping the grant itself.
pub fn strip_grantors(sql: &str) -> String {
    map_lines(sql, |line| {
        if is_comment_line(line) || !GRANTED_BY_RE.is_match(line) {
            return None;
        }
        Some(GRANTED_BY_RE.replace_all(line, "").into_owned())
    })
}
