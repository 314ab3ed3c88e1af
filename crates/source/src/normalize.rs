//! Image path normalisation.
//!
//! Seed data is written by hand, so image references arrive as
//! `images/a.jpg`, `public/images/a.jpg`, `images\a.jpg` and so on. The web
//! application serves `public/` at the site root, so all of those become
//! `/images/a.jpg`.
//!
//! Under the image fields (`image`, `coverImage`, `images`) any path-like
//! string is rewritten. Elsewhere only strings ending in an image extension
//! are, so a title such as `Fate/Zero` survives.

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static IMAGE_EXTENSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.(?:jpe?g|png|gif|webp|avif|bmp|svg)(?:[?#].*)?$").unwrap());

const PASSTHROUGH_PREFIXES: [&str; 4] = ["http://", "https://", "data:", "//"];
const IMAGE_KEYS: [&str; 3] = ["image", "coverImage", "images"];

fn is_absolute_url(s: &str) -> bool {
    let lower = s.trim_start().to_ascii_lowercase();
    PASSTHROUGH_PREFIXES.iter().any(|p| lower.starts_with(p))
}

fn is_single_token(s: &str) -> bool {
    !s.is_empty() && !s.chars().any(char::is_whitespace)
}

/// Whether a string names an image file by its extension.
pub fn has_image_extension(s: &str) -> bool {
    is_single_token(s) && IMAGE_EXTENSION.is_match(s)
}

/// Whether a string in an image field should be treated as an image path.
///
/// Free text (anything containing whitespace) is never touched, even if it
/// happens to contain a slash.
pub fn looks_like_image_path(s: &str) -> bool {
    has_image_extension(s) || (is_single_token(s) && s.contains(['/', '\\']))
}

/// Normalise one image reference into a public path.
///
/// ```
/// use tankobon_source::normalize_image_path;
/// assert_eq!(normalize_image_path("images/pic.jpg"), "/images/pic.jpg");
/// assert_eq!(normalize_image_path("/images/pic.jpg"), "/images/pic.jpg");
/// assert_eq!(normalize_image_path("public\\images\\pic.jpg"), "/images/pic.jpg");
/// assert_eq!(normalize_image_path("https://x.com/a.png"), "https://x.com/a.png");
/// ```
pub fn normalize_image_path(s: &str) -> String {
    if is_absolute_url(s) {
        return s.to_string();
    }
    let forward = s.trim().replace('\\', "/");
    let mut rest = forward.trim_start_matches("./").trim_start_matches('/');
    if let Some(stripped) = rest.strip_prefix("public/") {
        rest = stripped.trim_start_matches('/');
    }
    format!("/{rest}")
}

/// Recursively normalise the image paths in a JSON value. Object keys are
/// left alone.
pub fn normalize_image_paths(value: &mut Value) {
    normalize(value, false);
}

fn normalize(value: &mut Value, in_image_field: bool) {
    match value {
        Value::String(s) if in_image_field && looks_like_image_path(s) => *s = normalize_image_path(s),
        Value::String(s) if has_image_extension(s) => *s = normalize_image_path(s),
        Value::Array(items) => items.iter_mut().for_each(|item| normalize(item, in_image_field)),
        Value::Object(map) => {
            for (key, item) in map.iter_mut() {
                normalize(item, in_image_field || IMAGE_KEYS.contains(&key.as_str()));
            }
        },
        _ => {},
    }
}
