//! COPY ... FROM stdin to per-row INSERT conversion
//!
//! A COPY block loads a whole table atomically: one bad row (a dropped column,
//! a violated constraint) loses every row of that table. Converting each data
//! row into its own INSERT lets the rest of the table load when a row fails.
//!
//! Rows are decoded from PostgreSQL's COPY text format: fields are separated
//! by tabs, `\N` is NULL and backslash escapes encode control characters.

use std::sync::LazyLock;

use regex::Regex;

use crate::util::{contains_ci, split_line_ending, starts_with_ci};

/// The NULL marker in COPY text format
pub const COPY_NULL: &str = "\\N";

/// Terminator line of a COPY data block
pub(crate) const COPY_END: &str = "\\.";

const IDENT: &str = r#"(?:"(?:[^"]|"")+"|[A-Za-z0-9_$]+)"#;

static COPY_HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)^COPY\s+({ident}(?:\.{ident})?)\s*(\([^)]*\))?\s+FROM\s+stdin\s*;\s*$",
        ident = IDENT
    ))
    .unwrap()
});

/// Parsed `COPY <table> [(<columns>)] FROM stdin;` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyHeader {
    /// Table name exactly as written in the dump (possibly schema-qualified and quoted)
    pub table: String,
    /// Column list including parentheses, e.g. `(id, name)`
    pub columns: Option<String>,
}

/// Parse a COPY header line. Returns `None` for anything that is not a `FROM stdin` COPY.
pub fn parse_copy_header(line: &str) -> Option<CopyHeader> {
    // Cheap pre-check before running the regex on every line of a large dump
    if !starts_with_ci(line, "COPY ") || !contains_ci(line, "stdin") {
        return None;
    }
    let caps = COPY_HEADER_RE.captures(line)?;
    Some(CopyHeader {
        table: caps.get(1)?.as_str().to_string(),
        columns: caps.get(2).map(|m| m.as_str().to_string()),
    })
}

/// Decode COPY text-format escapes into raw characters.
fn decode_copy_field(field: &str) -> String {
    let mut result = String::with_capacity(field.len());
    let mut chars = field.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('b') => result.push('\u{8}'),
            Some('f') => result.push('\u{c}'),
            Some('n') => result.push('\n'),
            Some('r') => result.push('\r'),
            Some('t') => result.push('\t'),
            Some('v') => result.push('\u{b}'),
            Some(d @ '0'..='7') => {
                let mut value = d.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match chars.peek().and_then(|c| c.to_digit(8)) {
                        Some(next) => {
                            value = value * 8 + next;
                            chars.next();
                        }
                        None => break,
                    }
                }
                if let Some(ch) = char::from_u32(value).filter(|&ch| ch != '\0') {
                    result.push(ch);
                }
            }
            Some('x') => {
                let mut value = 0;
                let mut digits = 0;
                while digits < 2 {
                    match chars.peek().and_then(|c| c.to_digit(16)) {
                        Some(next) => {
                            value = value * 16 + next;
                            digits += 1;
                            chars.next();
                        }
                        None => break,
                    }
                }
                if digits == 0 {
                    result.push('x');
                } else if let Some(ch) = char::from_u32(value).filter(|&ch| ch != '\0') {
                    result.push(ch);
                }
            }
            // `\\` and any other escaped character stand for themselves
            Some(other) => result.push(other),
            None => result.push('\\'),
        }
    }
    result
}

/// Quote a raw value as a SQL string literal.
///
/// Values containing a backslash use an escape string (`E'...'`) with the
/// backslash doubled, so the literal reads the same whatever
/// `standard_conforming_strings` is set to on the target.
pub fn quote_literal(value: &str) -> String {
    let escaped = value.replace('\'', "''");
    if escaped.contains('\\') {
        format!("E'{}'", escaped.replace('\\', "\\\\"))
    } else {
        format!("'{}'", escaped)
    }
}

/// Render a single COPY field as a SQL value.
pub fn copy_field_to_sql(field: &str) -> String {
    if field == COPY_NULL {
        "NULL".to_string()
    } else {
        quote_literal(&decode_copy_field(field))
    }
}

/// Build the INSERT statement for one COPY data row.
pub fn row_to_insert(header: &CopyHeader, row: &str) -> String {
    let values: Vec<String> = row.split('\t').map(copy_field_to_sql).collect();
    match &header.columns {
        Some(columns) => format!(
            "INSERT INTO {} {} VALUES ({});",
            header.table,
            columns,
            values.join(", ")
        ),
        None => format!("INSERT INTO {} VALUES ({});", header.table, values.join(", ")),
    }
}

/// A COPY block seen so far, kept verbatim in case it is never terminated.
struct PendingCopy {
    header: CopyHeader,
    raw: String,
    rows: Vec<(String, String)>,
}

/// Convert every terminated COPY block into one INSERT per data row.
///
/// Unterminated blocks (no `\.` line before end of input) are left unchanged.
pub fn copy_blocks_to_inserts(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut pending: Option<PendingCopy> = None;

    for raw in sql.split_inclusive('\n') {
        let (line, ending) = split_line_ending(raw);

        if let Some(block) = pending.as_mut() {
            if line == COPY_END {
                for (row, row_ending) in &block.rows {
                    out.push_str(&row_to_insert(&block.header, row));
                    out.push_str(row_ending);
                }
                pending = None;
            } else {
                block.raw.push_str(raw);
                block.rows.push((line.to_string(), ending.to_string()));
            }
            continue;
        }

        match parse_copy_header(line) {
            Some(header) => {
                pending = Some(PendingCopy {
                    header,
                    raw: raw.to_string(),
                    rows: Vec::new(),
                });
            }
            None => out.push_str(raw),
        }
    }

    if let Some(block) = pending {
        out.push_str(&block.raw);
    }

    out
}
