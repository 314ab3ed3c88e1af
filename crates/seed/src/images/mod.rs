//! Image resolution: turning a source image reference into the URL it is
//! served from after upload.

mod cache;
mod fetch;
mod format;
mod resolver;

pub use self::cache::{CacheStats, ImageCache};
pub use self::fetch::{DefaultFetcher, ImageFetcher};
pub use self::format::ImageFormat;
pub use self::resolver::{ImageResolver, Outcome, Resolved};
use derive_more::Display;

/// What an image is used for. Becomes the `kind` template variable.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    #[display("covers")]
    Cover,
    #[display("comics")]
    ComicPage,
    #[display("chapters")]
    ChapterPage,
}
impl ImageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cover => "covers",
            Self::ComicPage => "comics",
            Self::ChapterPage => "chapters",
        }
    }
}

/// The record an image is being resolved for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageContext<'a> {
    pub kind: ImageKind,
    /// Slug of the owning comic.
    pub comic: &'a str,
    pub chapter: Option<u32>,
}
impl<'a> ImageContext<'a> {
    pub fn cover(comic: &'a str) -> Self {
        Self { kind: ImageKind::Cover, comic, chapter: None }
    }

    pub fn comic_page(comic: &'a str) -> Self {
        Self { kind: ImageKind::ComicPage, comic, chapter: None }
    }

    pub fn chapter_page(comic: &'a str, chapter: u32) -> Self {
        Self { kind: ImageKind::ChapterPage, comic, chapter: Some(chapter) }
    }
}
