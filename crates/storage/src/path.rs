//! Path validation for upload destinations.
//!
//! Upload paths are rendered from templates fed with user-supplied data (comic
//! slugs, titles), so every path is validated before it touches a backend.

use std::path::{Component, Path, PathBuf};

use crate::error::{ErrorKind, Result};

/// Validates a storage path, resolving `.`/`..` segments and rejecting any
/// path that would leave the storage root.
///
/// > **Note:** Null bytes and Windows path prefixes are rejected. Backslashes
/// >           are not treated as separators on Unix.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use tankobon_storage::validate_path;
/// assert!(validate_path("comics/solo-leveling/cover.jpg").is_ok());
/// assert!(validate_path("comics/../chapters/1.png").is_ok());
/// assert!(validate_path("../etc/passwd").is_err());
/// assert!(validate_path("a\0b").is_err());
/// assert_eq!(
///     validate_path("/comics//./x/../cover.jpg").unwrap(),
///     Path::new("comics/cover.jpg")
/// );
/// ```
pub fn validate(path: impl AsRef<Path>) -> Result<PathBuf> {
    let mut components = Vec::new();
    for component in path.as_ref().components() {
        match component {
            Component::Normal(s) => {
                // Null bytes survive Path::components() on Unix but truncate in syscalls.
                if s.as_encoded_bytes().contains(&0) {
                    exn::bail!(ErrorKind::InvalidPath(path.as_ref().to_path_buf()));
                }
                components.push(s)
            },
            Component::CurDir | Component::RootDir => {},
            Component::Prefix(_) => exn::bail!(ErrorKind::InvalidPath(path.as_ref().to_path_buf())),
            Component::ParentDir => {
                if components.pop().is_none() {
                    exn::bail!(ErrorKind::InvalidPath(path.as_ref().to_path_buf()));
                }
            },
        }
    }
    if components.is_empty() {
        exn::bail!(ErrorKind::InvalidPath(path.as_ref().to_path_buf()));
    }
    Ok(components.into_iter().collect())
}

/// Renders a validated path as a forward-slash separated key, suitable for
/// use in URLs regardless of the host platform.
///
/// ```
/// use tankobon_storage::to_key;
/// assert_eq!(to_key("comics/./a/b.png").unwrap(), "comics/a/b.png");
/// ```
pub fn to_key(path: impl AsRef<Path>) -> Result<String> {
    let validated = validate(path.as_ref())?;
    let mut segments = Vec::new();
    for component in validated.components() {
        let segment = component
            .as_os_str()
            .to_str()
            .ok_or_else(|| exn::Exn::from(ErrorKind::InvalidPath(path.as_ref().to_path_buf())))?;
        segments.push(segment);
    }
    Ok(segments.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_paths() {
        assert_eq!(validate("comics/a/cover.jpg").unwrap(), Path::new("comics/a/cover.jpg"));
        assert_eq!(validate("cover.jpg").unwrap(), Path::new("cover.jpg"));
    }

    #[test]
    fn test_leading_slash_is_dropped() {
        assert_eq!(validate("/uploads/cover.jpg").unwrap(), Path::new("uploads/cover.jpg"));
    }

    #[test]
    fn test_normalization() {
        assert_eq!(validate("a//b/./c.png").unwrap(), Path::new("a/b/c.png"));
        assert_eq!(validate("a/b/../c.png").unwrap(), Path::new("a/c.png"));
        assert_eq!(validate("comics/").unwrap(), Path::new("comics"));
    }

    #[test]
    fn test_traversal_attempts() {
        assert!(validate("../etc/passwd").is_err());
        assert!(validate("a/../../b").is_err());
        assert!(validate("..").is_err());
    }

    #[test]
    fn test_invalid_characters() {
        assert!(validate("a\0b").is_err());
    }

    #[test]
    fn test_empty_paths() {
        assert!(validate("").is_err());
        assert!(validate(".").is_err());
        assert!(validate("//").is_err());
    }

    #[test]
    fn test_key() {
        assert_eq!(to_key("/chapters/solo-leveling/1/abc.webp").unwrap(), "chapters/solo-leveling/1/abc.webp");
        assert!(to_key("../nope.png").is_err());
    }
}
