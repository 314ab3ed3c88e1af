use exn::ResultExt;
use serde_json::Value;
use tankobon_config::Entity;
use tankobon_db::{ChapterData, DRY_RUN_ID};
use tankobon_schema::models::Chapter;
use tankobon_schema::validate_chapters;
use tracing::instrument;

use super::{NaturalKey, Seeder};
use crate::error::{ErrorKind, Result};
use crate::images::ImageContext;
use crate::stats::{Action, EntityStats, Upserted};

impl NaturalKey for Chapter {
    fn natural_key(&self) -> String {
        format!("{}#{}", self.comic.slug, self.chapter_number)
    }
}

impl Seeder {
    pub(super) async fn seed_chapters(&self, records: &[Value]) -> EntityStats {
        let validated = validate_chapters(records);
        self.run_step(Entity::Chapters, &validated, |chapter| self.upsert_chapter(chapter)).await
    }

    /// Chapters are keyed by their comic and chapter number. The comic must
    /// already exist, or have been planned earlier in the same dry run. As
    /// with comics, a skipped chapter's images are not fetched again.
    #[instrument(level = "debug", skip_all, fields(comic = %chapter.comic.slug, number = chapter.chapter_number))]
    async fn upsert_chapter(&self, chapter: &Chapter) -> Result<Upserted> {
        let slug = chapter.comic.slug.as_str();
        let comic_id = match self.repo.get_comic_by_slug(slug).await.or_raise(|| ErrorKind::Database)? {
            Some(comic) => comic.id,
            None if self.is_planned(slug) => DRY_RUN_ID,
            None => exn::bail!(ErrorKind::MissingParent(slug.to_string())),
        };

        let sources: Vec<&str> = chapter.images.iter().map(|image| image.url.as_str()).collect();
        let existing = self
            .repo
            .get_chapter(comic_id, chapter.chapter_number)
            .await
            .or_raise(|| ErrorKind::Database)?;
        if let Some(row) = &existing
            && !self.config.force
        {
            let stored = self.repo.list_chapter_images(row.id).await.or_raise(|| ErrorKind::Database)?;
            return Ok(Upserted::with_images(Action::Skipped, self.reuse_images(&sources, &stored)));
        }

        let context = ImageContext::chapter_page(slug, chapter.chapter_number);
        let (images, tally) = self.resolve_images(&sources, context).await?;
        let data = ChapterData { chapter, comic_id, images: &images };
        let action = match existing {
            Some(row) => {
                self.repo.update_chapter(row.id, &data).await.or_raise(|| ErrorKind::Database)?;
                Action::Updated
            },
            None => {
                self.repo.insert_chapter(&data).await.or_raise(|| ErrorKind::Database)?;
                Action::Created
            },
        };
        Ok(Upserted::with_images(action, tally))
    }
}
