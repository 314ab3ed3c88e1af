use serde_json::Value;
use time::UtcDateTime;

use super::{ComicStatus, ImageRef, NamedRef};
use crate::field::FieldErrors;
use crate::reader::Reader;

const MAX_RATING: f64 = 10.0;

/// A validated comic record. `slug` is the natural key.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize), serde(rename_all = "camelCase"))]
pub struct Comic {
    pub title: String,
    pub slug: String,
    pub description: String,
    pub cover_image: Option<String>,
    pub status: ComicStatus,
    /// Clamped to `0..=10`.
    pub rating: Option<f64>,
    pub views: u64,
    pub publication_date: Option<UtcDateTime>,
    pub author: Option<NamedRef>,
    pub artist: Option<NamedRef>,
    pub comic_type: Option<NamedRef>,
    pub genres: Vec<NamedRef>,
    pub images: Vec<ImageRef>,
}

impl TryFrom<&Value> for Comic {
    type Error = FieldErrors;
    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        let mut reader = Reader::new(value, "")?;
        let title = reader.required_string("title");
        let slug = reader.required_string("slug");
        let description = reader.required_string("description");
        let cover_image = reader.optional_string("coverImage");
        let status = reader.optional_parse::<ComicStatus>("status").unwrap_or_default();
        let rating = reader.optional_number("rating").map(|r| r.clamp(0.0, MAX_RATING));
        let views = reader.optional_count("views").unwrap_or(0);
        let publication_date = reader.optional_date("publicationDate");
        let author = reader.with("author", false, NamedRef::parse);
        let artist = reader.with("artist", false, NamedRef::parse);
        let comic_type = reader.with("type", false, NamedRef::parse);
        let genres = reader.list("genres", NamedRef::parse);
        let images = reader.list("images", ImageRef::parse);

        let comic = match (title, slug, description) {
            (Some(title), Some(slug), Some(description)) => Some(Self {
                title,
                slug,
                description,
                cover_image,
                status,
                rating,
                views,
                publication_date,
                author,
                artist,
                comic_type,
                genres,
                images,
            }),
            _ => None,
        };
        reader.finish(comic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[test]
    fn test_minimal_comic_defaults() {
        let comic = Comic::try_from(&json!({
            "title": "Solo Leveling",
            "slug": "solo-leveling",
            "description": "...",
        }))
        .unwrap();
        assert_eq!(comic.status, ComicStatus::Ongoing);
        assert_eq!(comic.views, 0);
        assert!(comic.genres.is_empty());
        assert!(comic.images.is_empty());
        assert_eq!(comic.author, None);
    }

    #[test]
    fn test_full_comic() {
        let comic = Comic::try_from(&json!({
            "title": "Solo Leveling",
            "slug": "solo-leveling",
            "description": "E-rank hunter.",
            "coverImage": "/covers/solo.jpg",
            "status": "completed",
            "rating": "9.1",
            "views": "1200",
            "publicationDate": "2018-03-04",
            "author": {"name": "Chugong"},
            "artist": "DUBU",
            "type": {"name": "Manhwa"},
            "genres": [{"name": "Action"}, "Fantasy"],
            "images": [{"url": "https://cdn/a.jpg"}, "/images/b.png"],
        }))
        .unwrap();
        assert_eq!(comic.status, ComicStatus::Completed);
        assert_eq!(comic.rating, Some(9.1));
        assert_eq!(comic.views, 1200);
        assert_eq!(comic.artist, Some(NamedRef::new("DUBU")));
        assert_eq!(comic.comic_type, Some(NamedRef::new("Manhwa")));
        assert_eq!(comic.genres, vec![NamedRef::new("Action"), NamedRef::new("Fantasy")]);
        assert_eq!(comic.images, vec![ImageRef::new("https://cdn/a.jpg"), ImageRef::new("/images/b.png")]);
    }

    #[rstest]
    #[case(json!(11), 10.0)]
    #[case(json!(-2.5), 0.0)]
    #[case(json!("7"), 7.0)]
    fn test_rating_is_clamped(#[case] rating: Value, #[case] expected: f64) {
        let comic = Comic::try_from(&json!({"title": "T", "slug": "t", "description": "d", "rating": rating})).unwrap();
        assert_eq!(comic.rating, Some(expected));
    }

    #[test]
    fn test_strict_and_nested_errors() {
        let errors = Comic::try_from(&json!({
            "title": "T",
            "slug": "t",
            "author": {"name": "A", "bio": "?"},
            "genres": [{"name": "Action"}, {}],
            "images": [{"url": ""}],
            "id": 7,
        }))
        .unwrap_err();
        assert_eq!(errors.get("description").unwrap(), ["required"]);
        assert_eq!(errors.get("author.bio").unwrap(), ["unrecognized key"]);
        assert_eq!(errors.get("genres.1.name").unwrap(), ["required"]);
        assert_eq!(errors.get("images.0.url").unwrap(), ["must not be empty"]);
        assert_eq!(errors.get("id").unwrap(), ["unrecognized key"]);
    }
}
