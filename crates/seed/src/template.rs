//! Upload path templating.
//!
//! Destination keys for uploaded images are rendered from a user-configured
//! [upon] template. The syntax follows upon's Mustache-like conventions
//! (`{{ variable }}`, `{{ value|formatter }}`), extended with two helpers:
//!
//! - **`slug`** converts strings to URL-safe slugs, stripping quotation marks
//!   first to avoid leading or trailing hyphens.
//! - **`truncate`** cuts a string to a maximum byte length at a character
//!   boundary, usable as `truncate(value, n)` or `{{ value|truncate: n }}`.
//!
//! # Template Variables
//!
//! | Variable  | Type          | Description                                      |
//! |-----------|---------------|--------------------------------------------------|
//! | `kind`    | `String`      | `covers`, `comics` or `chapters`                 |
//! | `comic`   | `String`      | Slug of the comic the image belongs to           |
//! | `chapter` | `Option<u64>` | Chapter number, for chapter pages only           |
//! | `hash`    | `String`      | Lowercase hex SHA-256 of the image content       |
//!
//! The file extension is not part of the template; it is appended from the
//! detected [`ImageFormat`].
//!
//! # Example
//!
//! ```
//! use tankobon_seed::images::{ImageContext, ImageFormat};
//! use tankobon_seed::UploadPathGenerator;
//!
//! let generator: UploadPathGenerator = "{{ kind }}/{{ comic|slug }}/{{ hash|truncate: 8 }}".parse().unwrap();
//! let path = generator.generate(&ImageContext::cover("Solo Leveling"), "0123456789abcdef", ImageFormat::Png).unwrap();
//! assert_eq!(path, "covers/solo-leveling/01234567.png");
//! ```

use exn::{OptionExt, ResultExt};
use std::str::FromStr;
use tankobon_storage::validate_path;
use tracing::instrument;
use upon::{Engine, Template};

use crate::error::{Error, ErrorKind, Result};
use crate::images::{ImageContext, ImageFormat};

/// Renders destination keys for uploaded images.
///
/// Constructed via [`FromStr`], which compiles the template eagerly so that
/// syntax errors surface at start-up rather than on the first upload.
pub struct UploadPathGenerator {
    engine: Engine<'static>,
    template: Template<'static>,
}
impl FromStr for UploadPathGenerator {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut engine = Engine::new();
        addons::configure(&mut engine);
        let template = engine.compile(s.to_string()).or_raise(|| ErrorKind::Template)?;
        Ok(Self { engine, template })
    }
}
impl UploadPathGenerator {
    /// Render the template for one image, returning a normalized relative
    /// key with the format's extension appended.
    #[instrument(level = "debug", skip(self, hash), fields(kind = %context.kind, comic = context.comic))]
    pub fn generate(&self, context: &ImageContext<'_>, hash: &str, format: ImageFormat) -> Result<String> {
        let path = self
            .template
            .render(&self.engine, Self::parameters(context, hash))
            .to_string()
            .or_raise(|| ErrorKind::Template)?;
        let path = Self::normalize(path)?;
        Ok(format!("{path}.{}", format.extension()))
    }

    /// Trims each path segment, joins them with `/`, then validates the
    /// result so it cannot escape the upload root.
    fn normalize(s: impl Into<String>) -> Result<String> {
        let path = s.into().trim().split('/').map(str::trim).collect::<Vec<_>>().join("/");
        let validated = validate_path(&path).or_raise(|| ErrorKind::Template)?;
        validated.to_str().map(str::to_string).ok_or_raise(|| ErrorKind::Template)
    }

    fn parameters(context: &ImageContext<'_>, hash: &str) -> upon::Value {
        upon::value! {
            kind: context.kind.as_str(),
            comic: context.comic,
            chapter: context.chapter.map(u64::from),
            hash: hash,
        }
    }
}

/// Template extensions: a `slug` formatter and a `truncate` function.
mod addons {
    use rslug::slugify;
    use std::fmt::Write;
    use upon::{Engine, Value, fmt as upon_fmt};

    /// Apostrophes and quotes join their neighbours instead of becoming `-`,
    /// so `World's` slugs to `worlds`.
    fn is_quote(c: char) -> bool {
        matches!(c, '\'' | '"' | '`' | '\u{2018}'..='\u{201F}' | '\u{00AB}' | '\u{00BB}' | '\u{2039}' | '\u{203A}')
    }

    fn slug(f: &mut upon_fmt::Formatter<'_>, value: &Value) -> upon_fmt::Result {
        let Value::String(text) = value else {
            return upon_fmt::default(f, value);
        };
        let unquoted: String = text.chars().filter(|c| !is_quote(*c)).collect();
        f.write_str(&slugify!(&unquoted))?;
        Ok(())
    }

    /// The first `len` characters of `text`.
    fn truncate(text: &str, len: usize) -> String {
        text.chars().take(len).collect()
    }

    pub(crate) fn configure(engine: &mut Engine<'_>) {
        engine.add_formatter("slug", slug);
        engine.add_function("truncate", truncate);
    }

    #[cfg(test)]
    mod tests {
        #[test]
        fn test_truncate_counts_characters() {
            assert_eq!(super::truncate("ソロレベリング", 3), "ソロレ");
            assert_eq!(super::truncate("abc", 10), "abc");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tankobon_config::DEFAULT_UPLOAD_TEMPLATE;

    const HASH: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    #[rstest]
    #[case(ImageContext::cover("solo-leveling"), "covers/solo-leveling/e3b0c44298fc1c14.jpg")]
    #[case(ImageContext::comic_page("solo-leveling"), "comics/solo-leveling/e3b0c44298fc1c14.jpg")]
    #[case(ImageContext::chapter_page("solo-leveling", 12), "chapters/solo-leveling/e3b0c44298fc1c14.jpg")]
    fn test_default_template(#[case] context: ImageContext<'_>, #[case] expected: &str) {
        let generator: UploadPathGenerator = DEFAULT_UPLOAD_TEMPLATE.parse().unwrap();
        assert_eq!(generator.generate(&context, HASH, ImageFormat::Jpeg).unwrap(), expected);
    }

    #[test]
    fn test_missing_chapter_collapses() {
        let generator: UploadPathGenerator = "{{ comic }}/{{ chapter }}/{{ hash|truncate: 4 }}".parse().unwrap();
        let cover = generator.generate(&ImageContext::cover("a"), HASH, ImageFormat::Png).unwrap();
        assert_eq!(cover, "a/e3b0.png");
        let page = generator.generate(&ImageContext::chapter_page("a", 3), HASH, ImageFormat::Png).unwrap();
        assert_eq!(page, "a/3/e3b0.png");
    }

    #[test]
    fn test_slug_strips_quotes() {
        let generator: UploadPathGenerator = "{{ comic|slug }}".parse().unwrap();
        let path = generator.generate(&ImageContext::cover("\u{201C}Hello\u{201D} World's"), HASH, ImageFormat::Gif).unwrap();
        assert_eq!(path, "hello-worlds.gif");
    }

    #[test]
    fn test_truncate_classic_function() {
        let generator: UploadPathGenerator = "{{ truncate(hash, 6) }}".parse().unwrap();
        let path = generator.generate(&ImageContext::cover("a"), HASH, ImageFormat::Webp).unwrap();
        assert_eq!(path, "e3b0c4.webp");
    }

    #[rstest]
    #[case("../{{ hash }}")]
    #[case("   ")]
    fn test_rejects_escaping_or_empty_paths(#[case] template: &str) {
        let generator: UploadPathGenerator = template.parse().unwrap();
        let err = generator.generate(&ImageContext::cover("a"), HASH, ImageFormat::Png).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Template));
    }

    #[test]
    fn test_invalid_syntax_fails_early() {
        assert!("{{ hash".parse::<UploadPathGenerator>().is_err());
    }
}
