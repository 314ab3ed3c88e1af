use serde_json::Value;

use crate::field::FieldErrors;
use crate::reader::{Reader, coerce_non_empty_string};

/// A reference to a lookup row (author, artist, type or genre) by name.
///
/// Accepts either `{"name": "..."}` or a bare string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct NamedRef {
    pub name: String,
}
impl NamedRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub(crate) fn parse(value: &Value, path: &str) -> Result<Self, FieldErrors> {
        if value.is_string() {
            return coerce_non_empty_string(value).map(Self::new).map_err(|m| FieldErrors::single(path, m));
        }
        let mut reader = Reader::new(value, path)?;
        let name = reader.required_string("name");
        reader.finish(name.map(Self::new))
    }
}

/// An image source, either `{"url": "..."}` or a bare string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ImageRef {
    pub url: String,
}
impl ImageRef {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub(crate) fn parse(value: &Value, path: &str) -> Result<Self, FieldErrors> {
        if value.is_string() {
            return coerce_non_empty_string(value).map(Self::new).map_err(|m| FieldErrors::single(path, m));
        }
        let mut reader = Reader::new(value, path)?;
        let url = reader.required_string("url");
        reader.finish(url.map(Self::new))
    }
}

/// A chapter's back-reference to its parent comic.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ComicRef {
    pub title: String,
    pub slug: String,
}
impl ComicRef {
    pub(crate) fn parse(value: &Value, path: &str) -> Result<Self, FieldErrors> {
        let mut reader = Reader::new(value, path)?;
        let title = reader.required_string("title");
        let slug = reader.required_string("slug");
        reader.finish(title.zip(slug).map(|(title, slug)| Self { title, slug }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_named_ref_shapes() {
        assert_eq!(NamedRef::parse(&json!("Chugong"), "author").unwrap(), NamedRef::new("Chugong"));
        assert_eq!(NamedRef::parse(&json!({"name": " Chugong "}), "author").unwrap(), NamedRef::new("Chugong"));
        let errors = NamedRef::parse(&json!({"name": "", "id": 3}), "author").unwrap_err();
        assert_eq!(errors.get("author.name").unwrap(), ["must not be empty"]);
        assert_eq!(errors.get("author.id").unwrap(), ["unrecognized key"]);
    }

    #[test]
    fn test_image_ref_shapes() {
        assert_eq!(ImageRef::parse(&json!("/a.jpg"), "images.0").unwrap(), ImageRef::new("/a.jpg"));
        assert_eq!(ImageRef::parse(&json!({"url": "https://cdn/a.jpg"}), "images.0").unwrap().url, "https://cdn/a.jpg");
        assert!(ImageRef::parse(&json!(42), "images.0").is_err());
    }

    #[test]
    fn test_comic_ref_requires_both_fields() {
        let errors = ComicRef::parse(&json!({"slug": "solo-leveling"}), "comic").unwrap_err();
        assert_eq!(errors.get("comic.title").unwrap(), ["required"]);
    }
}
