use derive_more::Display;
use std::path::Path;

const JPEG_MAGIC: [u8; 3] = [0xFF, 0xD8, 0xFF];
const PNG_MAGIC: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
const GIF87_MAGIC: &[u8] = b"GIF87a";
const GIF89_MAGIC: &[u8] = b"GIF89a";
const BMP_MAGIC: &[u8] = b"BM";

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    #[display("jpeg")]
    Jpeg,
    #[display("png")]
    Png,
    #[display("gif")]
    Gif,
    #[display("webp")]
    Webp,
    #[display("avif")]
    Avif,
    #[display("bmp")]
    Bmp,
}

impl ImageFormat {
    /// File extension (without the dot) used for uploaded files.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Gif => "gif",
            Self::Webp => "webp",
            Self::Avif => "avif",
            Self::Bmp => "bmp",
        }
    }

    /// Detect the format from the leading bytes of the content.
    #[must_use]
    pub fn from_magic_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&JPEG_MAGIC) {
            return Some(Self::Jpeg);
        }
        if bytes.starts_with(&PNG_MAGIC) {
            return Some(Self::Png);
        }
        if bytes.starts_with(GIF87_MAGIC) || bytes.starts_with(GIF89_MAGIC) {
            return Some(Self::Gif);
        }
        // RIFF container: "RIFF" <size:4> "WEBP"
        if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            return Some(Self::Webp);
        }
        // ISO BMFF: <size:4> "ftyp" <brand:4>
        if bytes.len() >= 12 && &bytes[4..8] == b"ftyp" && matches!(&bytes[8..12], b"avif" | b"avis") {
            return Some(Self::Avif);
        }
        if bytes.starts_with(BMP_MAGIC) && bytes.len() >= 14 {
            return Some(Self::Bmp);
        }
        None
    }

    /// Guess the format from the extension of a URL or path, ignoring any
    /// query string or fragment.
    #[must_use]
    pub fn from_url(url: &str) -> Option<Self> {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        let extension = Path::new(path).extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "jpg" | "jpeg" | "jfif" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "gif" => Some(Self::Gif),
            "webp" => Some(Self::Webp),
            "avif" => Some(Self::Avif),
            "bmp" => Some(Self::Bmp),
            _ => None,
        }
    }

    /// Content wins over the URL; the URL is only consulted when the bytes
    /// are not recognized.
    #[must_use]
    pub fn detect(bytes: &[u8], url: &str) -> Option<Self> {
        Self::from_magic_bytes(bytes).or_else(|| Self::from_url(url))
    }
}
