//! Wildcard file discovery.
//!
//! Supports `*` (any run of characters within one path segment), `?` (one
//! character within a segment) and `**` (any number of segments). Patterns
//! without wildcards are exact paths.

use regex::Regex;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::instrument;

use crate::error::{ErrorKind, Result};

fn has_wildcard(s: &str) -> bool {
    s.contains(['*', '?'])
}

/// Translate a wildcard pattern into an anchored regular expression.
fn to_regex(pattern: &str) -> Result<Regex> {
    let mut out = String::with_capacity(pattern.len() * 2);
    out.push('^');
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                if chars.peek() == Some(&'/') {
                    // `**/` also matches zero directories.
                    chars.next();
                    out.push_str("(?:.*/)?");
                } else {
                    out.push_str(".*");
                }
            },
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            c => out.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
    }
    out.push('$');
    Regex::new(&out).map_err(|_| exn::Exn::from(ErrorKind::Pattern(pattern.to_string())))
}

/// Split a pattern into the literal directory to start walking from, and how
/// many directory levels below it may be visited (`None` for unlimited).
fn walk_root(pattern: &Path) -> (PathBuf, Option<usize>) {
    let mut base = PathBuf::new();
    let mut rest = Vec::new();
    for component in pattern.components() {
        let segment = component.as_os_str().to_string_lossy();
        if rest.is_empty() && !has_wildcard(&segment) {
            base.push(component);
        } else {
            rest.push(segment.into_owned());
        }
    }
    if rest.is_empty() {
        // Only reached for exact paths; the caller handles those.
        return (base, Some(0));
    }
    if base.as_os_str().is_empty() {
        base.push(Component::CurDir);
    }
    let depth = if rest.iter().any(|s| s.contains("**")) {
        None
    } else {
        Some(rest.len() - 1)
    };
    (base, depth)
}

/// Find every file matching a wildcard pattern, sorted by path.
///
/// A pattern without wildcards is treated as an exact path: it yields that
/// path if it is an existing file, and nothing otherwise. Directories that
/// cannot be read are skipped with a warning.
///
/// # Errors
///
/// Only for patterns that are not valid UTF-8 or cannot be compiled.
#[instrument(level = "debug", skip_all, fields(pattern = %pattern.as_ref().display()))]
pub async fn find_json_files(pattern: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let pattern = pattern.as_ref();
    let text = pattern.to_str().ok_or_else(|| exn::Exn::from(ErrorKind::Pattern(pattern.display().to_string())))?;

    if !has_wildcard(text) {
        return Ok(match fs::metadata(pattern).await {
            Ok(meta) if meta.is_file() => vec![pattern.to_path_buf()],
            _ => {
                tracing::debug!("No file at exact path");
                Vec::new()
            },
        });
    }

    let (base, max_depth) = walk_root(pattern);
    // Walked paths are built by joining onto `base`, so a pattern that starts
    // with a wildcard has to be matched with the same `./` prefix.
    let regex = if base == Path::new(".") && !text.starts_with("./") {
        to_regex(&format!("./{text}"))?
    } else {
        to_regex(text)?
    };

    let mut found = Vec::new();
    let mut stack = vec![(base, 0usize)];
    while let Some((dir, depth)) = stack.pop() {
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "Skipping unreadable directory");
                continue;
            },
        };
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(dir = %dir.display(), error = %e, "Failed to read directory entry");
                    break;
                },
            };
            let path = entry.path();
            let Ok(file_type) = entry.file_type().await else {
                continue;
            };
            if file_type.is_dir() {
                if max_depth.is_none_or(|max| depth < max) {
                    stack.push((path, depth + 1));
                }
            } else if let Some(s) = path.to_str()
                && regex.is_match(s)
            {
                found.push(path);
            }
        }
    }
    found.sort();
    tracing::debug!(count = found.len(), "Matched source files");
    Ok(found)
}
