use serde_json::Value;
use time::UtcDateTime;

use super::{ComicRef, ImageRef};
use crate::field::FieldErrors;
use crate::reader::Reader;

/// A validated chapter record. `(comic.slug, chapter_number)` is the natural
/// key.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize), serde(rename_all = "camelCase"))]
pub struct Chapter {
    pub title: String,
    pub chapter_number: u32,
    pub comic: ComicRef,
    pub views: u64,
    pub release_date: Option<UtcDateTime>,
    pub images: Vec<ImageRef>,
}

impl TryFrom<&Value> for Chapter {
    type Error = FieldErrors;
    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        let mut reader = Reader::new(value, "")?;
        let title = reader.required_string("title");
        let chapter_number = reader.required_positive("chapterNumber");
        let comic = reader.with("comic", true, ComicRef::parse);
        let views = reader.optional_count("views").unwrap_or(0);
        let release_date = reader.optional_date("releaseDate");
        let images = reader.list("images", ImageRef::parse);

        let chapter = match (title, chapter_number, comic) {
            (Some(title), Some(chapter_number), Some(comic)) => Some(Self {
                title,
                chapter_number,
                comic,
                views,
                release_date,
                images,
            }),
            _ => None,
        };
        reader.finish(chapter)
    }
}
