//! Data restore preparation
//!
//! Platform-internal tables (auth, storage, realtime, ...) often differ in
//! shape between a hosted project and a local stack, and their rows fail to
//! load. When asked, rows for those schemas are dropped by line pattern:
//! per-row INSERTs, setval calls and whole COPY blocks aimed at them.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::filters::{parse_copy_header, COPY_END};
use crate::util::split_line_ending;

/// Schemas whose data is skipped when `skip_problematic` is set
pub const PROBLEMATIC_SCHEMAS: &[&str] = &[
    "auth",
    "storage",
    "realtime",
    "_realtime",
    "supabase_functions",
    "supabase_migrations",
    "vault",
    "pgsodium",
    "net",
];

fn schema_alternation() -> String {
    PROBLEMATIC_SCHEMAS
        .iter()
        .map(|s| regex::escape(s))
        .collect::<Vec<_>>()
        .join("|")
}

static INSERT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r#"(?i)^\s*INSERT\s+INTO\s+"?(?:{})"?\."#,
        schema_alternation()
    ))
    .unwrap()
});

/// Matches both raw and guarded setval calls
static SETVAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r#"(?i)\bsetval\(\s*'"?(?:{})"?\."#,
        schema_alternation()
    ))
    .unwrap()
});

static TABLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r#"(?i)^"?(?:{})"?\."#, schema_alternation())).unwrap()
});

/// True if a single statement line loads data into a problematic schema.
pub fn targets_problematic_schema(line: &str) -> bool {
    INSERT_RE.is_match(line) || SETVAL_RE.is_match(line)
}

/// Prepare a data artifact for restore.
///
/// Runs on the raw dump, before COPY conversion, so a skipped table goes as a
/// whole block. Rows of kept COPY blocks are passed through untouched. With
/// `skip_problematic` unset the input is returned unchanged.
pub fn prepare(sql: &str, skip_problematic: bool) -> String {
    if !skip_problematic {
        return sql.to_string();
    }

    let mut out = String::with_capacity(sql.len());
    // Inside a COPY block: `Some(true)` drops its rows, `Some(false)` keeps them
    let mut in_copy: Option<bool> = None;
    let mut dropped = 0usize;

    for raw in sql.split_inclusive('\n') {
        let (line, _) = split_line_ending(raw);

        let skip = match in_copy {
            Some(skip) => {
                if line == COPY_END {
                    in_copy = None;
                }
                skip
            }
            None => match parse_copy_header(line) {
                Some(header) => {
                    let skip = TABLE_RE.is_match(&header.table);
                    in_copy = Some(skip);
                    skip
                }
                None => targets_problematic_schema(line),
            },
        };

        if skip {
            dropped += 1;
        } else {
            out.push_str(raw);
        }
    }

    debug!("data: dropped {} lines for platform-internal schemas", dropped);
    out
}
