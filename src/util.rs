//! Shared utility helpers.

use std::path::Path;

use encoding_rs::WINDOWS_1252;

use crate::error::CloneError;

/// Case-insensitive substring search without allocating an uppercase copy.
#[inline]
pub fn contains_ci(haystack: &str, needle: &str) -> bool {
    let needle_bytes = needle.as_bytes();
    let haystack_bytes = haystack.as_bytes();
    if needle_bytes.len() > haystack_bytes.len() {
        return false;
    }
    haystack_bytes
        .windows(needle_bytes.len())
        .any(|window| window.eq_ignore_ascii_case(needle_bytes))
}

/// Case-insensitive starts_with check without allocating.
#[inline]
pub fn starts_with_ci(haystack: &str, needle: &str) -> bool {
    haystack.len() >= needle.len()
        && haystack.as_bytes()[..needle.len()].eq_ignore_ascii_case(needle.as_bytes())
}

/// True for lines that are already SQL line comments.
#[inline]
pub fn is_comment_line(line: &str) -> bool {
    line.trim_start().starts_with("--")
}

/// Comment out a single line, keeping its original text after the marker.
#[inline]
pub fn comment_out(line: &str) -> String {
    format!("-- {}", line)
}

/// Split a raw line (as produced by `split_inclusive('\n')`) into its content
/// and its terminator (`"\r\n"`, `"\n"` or `""` for the final unterminated line).
pub fn split_line_ending(raw: &str) -> (&str, &str) {
    if let Some(line) = raw.strip_suffix("\r\n") {
        (line, "\r\n")
    } else if let Some(line) = raw.strip_suffix('\n') {
        (line, "\n")
    } else {
        (raw, "")
    }
}

/// Rewrite a text line by line.
///
/// The callback receives each line without its terminator and returns
/// `Some(replacement)` to rewrite it or `None` to keep it. Untouched lines are
/// copied byte-for-byte, so a callback that never matches yields the input.
pub fn map_lines<F>(text: &str, mut f: F) -> String
where
    F: FnMut(&str) -> Option<String>,
{
    let mut out = String::with_capacity(text.len());
    for raw in text.split_inclusive('\n') {
        let (line, ending) = split_line_ending(raw);
        match f(line) {
            Some(replacement) => {
                out.push_str(&replacement);
                out.push_str(ending);
            }
            None => out.push_str(raw),
        }
    }
    out
}

/// Read a dump file as a string, trying UTF-8 first, then Windows-1252 as fallback.
///
/// A leading UTF-8 BOM is stripped.
pub fn read_sql_file(path: &Path) -> Result<String, CloneError> {
    let bytes = std::fs::read(path).map_err(|source| CloneError::ArtifactRead {
        path: path.to_path_buf(),
        source,
    })?;

    let content = match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(err) => {
            let bytes = err.into_bytes();
            let (decoded, _, had_errors) = WINDOWS_1252.decode(&bytes);
            if had_errors {
                return Err(CloneError::ArtifactRead {
                    path: path.to_path_buf(),
                    source: std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        "File contains invalid characters",
                    ),
                });
            }
            decoded.into_owned()
        }
    };

    Ok(match content.strip_prefix('\u{FEFF}') {
        Some(stripped) => stripped.to_string(),
        None => content,
    })
}

/// Write an artifact, creating parent directories as needed.
pub fn write_sql_file(path: &Path, content: &str) -> Result<(), CloneError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| CloneError::ArtifactWrite {
            path: path.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(path, content).map_err(|source| CloneError::ArtifactWrite {
        path: path.to_path_buf(),
        source,
    })
}
