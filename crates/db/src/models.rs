//! Row types and write payloads.

use exn::ResultExt;
use tankobon_schema::models::{Chapter, Comic};
use time::UtcDateTime;

use crate::error::{ErrorKind, Result};

/// A stored user, looked up by email.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct UserRow {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub role: String,
    pub email_verified: Option<i64>,
    pub image: Option<String>,
}

/// A stored comic, looked up by slug.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct ComicRow {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub cover_image: Option<String>,
    pub status: String,
    pub rating: Option<f64>,
    pub views: i64,
    pub publication_date: Option<i64>,
    pub author_id: Option<i64>,
    pub artist_id: Option<i64>,
    pub type_id: Option<i64>,
}

/// A stored chapter, looked up by `(comic_id, chapter_number)`.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct ChapterRow {
    pub id: i64,
    pub comic_id: i64,
    pub chapter_number: i64,
    pub title: String,
    pub views: i64,
    pub release_date: Option<i64>,
}

/// Everything needed to write a comic: the validated record plus the ids of
/// its lookup rows and the final (uploaded) image URLs.
#[derive(Debug, Clone, Copy)]
pub struct ComicData<'a> {
    pub comic: &'a Comic,
    pub cover_image: Option<&'a str>,
    pub images: &'a [String],
    pub author_id: Option<i64>,
    pub artist_id: Option<i64>,
    pub type_id: Option<i64>,
    pub genre_ids: &'a [i64],
}

/// Everything needed to write a chapter.
#[derive(Debug, Clone, Copy)]
pub struct ChapterData<'a> {
    pub chapter: &'a Chapter,
    pub comic_id: i64,
    pub images: &'a [String],
}

/// Lookup tables of named rows, created on demand while seeding comics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedTable {
    Authors,
    Artists,
    Types,
    Genres,
}
impl NamedTable {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Authors => "authors",
            Self::Artists => "artists",
            Self::Types => "types",
            Self::Genres => "genres",
        }
    }
}

/// Tables that can be counted or cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Users,
    Comics,
    Chapters,
    Named(NamedTable),
}
impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Comics => "comics",
            Self::Chapters => "chapters",
            Self::Named(named) => named.as_str(),
        }
    }
}

pub(crate) fn timestamp(dt: UtcDateTime) -> i64 {
    dt.unix_timestamp()
}

pub(crate) fn now() -> i64 {
    timestamp(UtcDateTime::now())
}

pub(crate) fn to_i64(value: u64, what: &'static str) -> Result<i64> {
    i64::try_from(value).or_raise(|| ErrorKind::InvalidData(what))
}
