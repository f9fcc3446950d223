//! Guarded sequence resets
//!
//! Data dumps end with `SELECT pg_catalog.setval('schema.seq', N, bool);`
//! calls. If the owning table was filtered out or renamed on the target, the
//! raw call fails and takes the rest of the transaction with it. Each call is
//! rewritten to look the sequence up in `pg_class` first and do nothing when
//! it is absent.

use std::sync::LazyLock;

use regex::Regex;

use super::copy_block::{parse_copy_header, COPY_END};
use crate::util::map_lines;

static SETVAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(\s*)SELECT\s+(?:pg_catalog\.)?setval\(\s*'([^']+)'(?:::regclass)?\s*,\s*(-?\d+)\s*,\s*(true|false)\s*\)\s*;\s*$",
    )
    .unwrap()
});

/// A schema-qualified (or bare) sequence name as PostgreSQL resolves it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceRef {
    pub schema: Option<String>,
    pub name: String,
}

/// Resolve one identifier part: quoted parts keep case, bare parts fold to lowercase.
fn resolve_part(part: &str) -> String {
    match part.strip_prefix('"').and_then(|p| p.strip_suffix('"')) {
        Some(inner) => inner.replace("\"\"", "\""),
        None => part.to_lowercase(),
    }
}

/// Split `schema.name` on the first dot that is not inside double quotes.
pub fn parse_sequence_ref(literal: &str) -> SequenceRef {
    let mut in_quotes = false;
    for (i, ch) in literal.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            '.' if !in_quotes => {
                return SequenceRef {
                    schema: Some(resolve_part(&literal[..i])),
                    name: resolve_part(&literal[i + 1..]),
                };
            }
            _ => {}
        }
    }
    SequenceRef {
        schema: None,
        name: resolve_part(literal),
    }
}

fn rewrite_line(line: &str) -> Option<String> {
    let caps = SETVAL_RE.captures(line)?;
    let indent = caps.get(1).map_or("", |m| m.as_str());
    let literal = caps.get(2)?.as_str();
    let value = caps.get(3)?.as_str();
    let is_called = caps.get(4)?.as_str().to_lowercase();

    let seq = parse_sequence_ref(literal);
    let schema_check = match &seq.schema {
        Some(schema) => format!("n.nspname = '{}'", schema),
        None => "n.nspname = current_schema()".to_string(),
    };

    Some(format!(
        "{}DO $$ BEGIN IF EXISTS (SELECT 1 FROM pg_catalog.pg_class c \
         JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace \
         WHERE c.relkind = 'S' AND {} AND c.relname = '{}') \
         THEN PERFORM pg_catalog.setval('{}', {}, {}); END IF; END $$;",
        indent, schema_check, seq.name, literal, value, is_called
    ))
}

/// Rewrite every `setval('seq', N, bool)` call into an existence-guarded block.
///
/// Data rows inside `COPY ... FROM stdin` blocks are never rewritten, even if
/// a row happens to read like a setval call.
pub fn harden_setval(sql: &str) -> String {
    let mut in_copy = false;
    map_lines(sql, |line| {
        if in_copy {
            in_copy = line != COPY_END;
            return None;
        }
        if parse_copy_header(line).is_some() {
            in_copy = true;
            return None;
        }
        rewrite_line(line)
    })
}
