//! Idempotent CREATE ROLE rewriting
//!
//! A role dump replayed against a target that already has some of those roles
//! aborts on the first `role "x" already exists`. Each `CREATE ROLE` statement
//! is wrapped in an anonymous block that swallows `duplicate_object`.
//!
//! Only the single-statement-per-line shape is recognised: the statement must
//! start the line and end with `;` at line end. The rewritten line starts with
//! `DO`, so running the rewriter over its own output changes nothing.

use std::sync::LazyLock;

use regex::Regex;

use crate::util::map_lines;

static CREATE_ROLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)^CREATE\s+ROLE\s+("(?:[^"]|"")+"|[A-Za-z_][A-Za-z0-9_$]*)([^;]*);\s*$"#)
        .unwrap()
});

/// Dollar-quote tag for a block body: `$$` unless the body contains it.
fn dollar_tag(body: &str) -> String {
    if !body.contains("$$") {
        return "$$".to_string();
    }
    (0u32..)
        .map(|n| format!("$role{}$", n))
        .find(|tag| !body.contains(tag.as_str()))
        .unwrap_or_default()
}

/// Rewrite a single matching line, or return `None` to keep it unchanged.
fn rewrite_line(line: &str) -> Option<String> {
    let caps = CREATE_ROLE_RE.captures(line)?;
    let name = caps.get(1)?.as_str();
    let options = caps.get(2).map(|m| m.as_str().trim_end()).unwrap_or("");

    let statement = format!("CREATE ROLE {}{};", name, options);
    let tag = dollar_tag(&statement);
    Some(format!(
        "DO {tag} BEGIN {statement} EXCEPTION WHEN duplicate_object THEN NULL; END {tag};",
        tag = tag,
        statement = statement
    ))
}

/// Wrap every `CREATE ROLE <name> [options];` line in a duplicate-tolerant block.
pub fn make_roles_idempotent(sql: &str) -> String {
    map_lines(sql, rewrite_line)
}
