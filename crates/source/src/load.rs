//! Reading and merging JSON source files.

use exn::ResultExt;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::instrument;

use crate::error::{ErrorKind, Result};
use crate::normalize::normalize_image_paths;
use crate::pattern::find_json_files;

/// Property names searched, in order, for the record list of an object-shaped
/// source file.
const RECORD_KEYS: [&str; 2] = ["data", "items"];

/// Read a JSON file, normalise embedded image paths, and deserialize it.
#[instrument(level = "debug", skip_all, fields(path = %path.as_ref().display()))]
pub async fn read_json_file<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => exn::bail!(ErrorKind::NotFound(path.to_path_buf())),
        Err(e) => return Err(e).or_raise(|| ErrorKind::Io(path.to_path_buf())),
    };
    let mut value: Value = serde_json::from_slice(&bytes).or_raise(|| ErrorKind::Parse(path.to_path_buf()))?;
    normalize_image_paths(&mut value);
    serde_json::from_value(value).or_raise(|| ErrorKind::Parse(path.to_path_buf()))
}

/// Pull the record list out of one parsed source document.
///
/// - A top-level array is the record list.
/// - An object contributes its `data` array, else its `items` array, else its
///   longest array-valued property, else the object itself as one record.
pub fn extract_records(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Object(mut map) => {
            for key in RECORD_KEYS {
                if matches!(map.get(key), Some(Value::Array(_)))
                    && let Some(Value::Array(items)) = map.remove(key)
                {
                    return items;
                }
            }
            let longest = map
                .iter()
                .filter_map(|(key, value)| value.as_array().map(|items| (key.clone(), items.len())))
                // Earliest key wins a tie.
                .fold(None::<(String, usize)>, |best, (key, len)| match best {
                    Some((_, best_len)) if best_len >= len => best,
                    _ => Some((key, len)),
                });
            if let Some((key, _)) = longest
                && let Some(Value::Array(items)) = map.remove(&key)
            {
                return items;
            }
            vec![Value::Object(map)]
        },
        other => {
            tracing::warn!(kind = json_kind(&other), "Ignoring source document that is neither array nor object");
            Vec::new()
        },
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Load and merge every file matched by any of `patterns`.
///
/// A file matched by more than one pattern is only read once. Files are read
/// in pattern order, then path order. A missing or malformed file is logged
/// and contributes zero records; this function never fails.
#[instrument(skip_all, fields(patterns = patterns.len()))]
pub async fn read_multiple_json_files<P: AsRef<Path>>(patterns: &[P]) -> Vec<Value> {
    let mut seen = BTreeSet::<PathBuf>::new();
    let mut records = Vec::new();
    for pattern in patterns {
        let pattern = pattern.as_ref();
        let files = match find_json_files(pattern).await {
            Ok(files) => files,
            Err(e) => {
                tracing::warn!(pattern = %pattern.display(), error = %e, "Skipping invalid pattern");
                continue;
            },
        };
        if files.is_empty() {
            tracing::warn!(pattern = %pattern.display(), "No source files matched");
        }
        for file in files {
            if !seen.insert(file.clone()) {
                continue;
            }
            match read_json_file::<Value>(&file).await {
                Ok(value) => {
                    let found = extract_records(value);
                    tracing::debug!(file = %file.display(), records = found.len(), "Loaded source file");
                    records.extend(found);
                },
                Err(e) => tracing::warn!(file = %file.display(), error = ?e, "Skipping unreadable source file"),
            }
        }
    }
    tracing::info!(files = seen.len(), records = records.len(), "Loaded source records");
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_top_level_array() {
        assert_eq!(extract_records(json!([{"a": 1}, {"a": 2}])).len(), 2);
    }

    #[test]
    fn test_extract_data_before_items() {
        let records = extract_records(json!({"items": [1, 2, 3], "data": [4]}));
        assert_eq!(records, vec![json!(4)]);
        let records = extract_records(json!({"items": [1, 2, 3], "meta": {"page": 1}}));
        assert_eq!(records, vec![json!(1), json!(2), json!(3)]);
    }

    #[test]
    fn test_extract_longest_array_fallback() {
        let records = extract_records(json!({"tags": ["x"], "comics": [{"slug": "a"}, {"slug": "b"}]}));
        assert_eq!(records, vec![json!({"slug": "a"}), json!({"slug": "b"})]);
    }

    #[test]
    fn test_extract_ignores_non_array_data_key() {
        let records = extract_records(json!({"data": "nope", "rows": [1]}));
        assert_eq!(records, vec![json!(1)]);
    }

    #[test]
    fn test_extract_single_object() {
        let record = json!({"email": "a@example.com", "name": "A"});
        assert_eq!(extract_records(record.clone()), vec![record]);
    }

    #[test]
    fn test_extract_scalar_is_empty() {
        assert!(extract_records(json!(42)).is_empty());
    }

    #[tokio::test]
    async fn test_read_json_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = read_json_file::<Value>(dir.path().join("missing.json")).await.unwrap_err();
        assert!(matches!(&*missing, ErrorKind::NotFound(_)));

        let broken = dir.path().join("broken.json");
        std::fs::write(&broken, "{ not json").unwrap();
        let err = read_json_file::<Value>(&broken).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Parse(_)));
    }

    #[tokio::test]
    async fn test_read_json_file_typed() {
        #[derive(serde::Deserialize)]
        struct Cover {
            image: String,
        }
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("cover.json");
        std::fs::write(&file, r#"{"image": "public/covers/a.jpg"}"#).unwrap();
        let cover: Cover = read_json_file(&file).await.unwrap();
        assert_eq!(cover.image, "/covers/a.jpg");
    }
}
