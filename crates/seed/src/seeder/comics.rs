use exn::ResultExt;
use serde_json::Value;
use tankobon_config::Entity;
use tankobon_db::{ComicData, NamedTable};
use tankobon_schema::models::{Comic, NamedRef};
use tankobon_schema::validate_comics;
use tracing::instrument;

use super::{NaturalKey, Seeder};
use crate::error::{ErrorKind, Result};
use crate::images::ImageContext;
use crate::stats::{Action, EntityStats, ImageTally, Upserted};

impl NaturalKey for Comic {
    fn natural_key(&self) -> String {
        self.slug.clone()
    }
}

impl Seeder {
    pub(super) async fn seed_comics(&self, records: &[Value]) -> EntityStats {
        let validated = validate_comics(records);
        self.run_step(Entity::Comics, &validated, |comic| self.upsert_comic(comic)).await
    }

    /// Comics are keyed by slug. A comic that is skipped keeps the images it
    /// already has; its sources are counted as cached without being fetched.
    #[instrument(level = "debug", skip_all, fields(slug = %comic.slug))]
    async fn upsert_comic(&self, comic: &Comic) -> Result<Upserted> {
        let sources: Vec<&str> = comic.images.iter().map(|image| image.url.as_str()).collect();
        let existing = self.repo.get_comic_by_slug(&comic.slug).await.or_raise(|| ErrorKind::Database)?;
        if let Some(row) = &existing
            && !self.config.force
        {
            let stored = self.repo.list_comic_images(row.id).await.or_raise(|| ErrorKind::Database)?;
            let mut tally = self.reuse_images(&sources, &stored);
            if let Some(cover) = comic.cover_image.as_deref() {
                let stored: Vec<String> = row.cover_image.iter().cloned().collect();
                tally.merge(self.reuse_images(&[cover], &stored));
            }
            return Ok(Upserted::with_images(Action::Skipped, tally));
        }

        let mut tally = ImageTally::default();
        let cover_image = match comic.cover_image.as_deref() {
            Some(url) => {
                let (mut urls, cover) = self.resolve_images(&[url], ImageContext::cover(&comic.slug)).await?;
                tally.merge(cover);
                urls.pop()
            },
            None => None,
        };
        let (images, pages) = self.resolve_images(&sources, ImageContext::comic_page(&comic.slug)).await?;
        tally.merge(pages);

        let author_id = self.named(NamedTable::Authors, comic.author.as_ref()).await?;
        let artist_id = self.named(NamedTable::Artists, comic.artist.as_ref()).await?;
        let type_id = self.named(NamedTable::Types, comic.comic_type.as_ref()).await?;
        let mut genre_ids = Vec::with_capacity(comic.genres.len());
        for genre in &comic.genres {
            let id = self.repo.get_or_create_named(NamedTable::Genres, &genre.name).await.or_raise(|| ErrorKind::Database)?;
            if !genre_ids.contains(&id) {
                genre_ids.push(id);
            }
        }
        let data = ComicData {
            comic,
            cover_image: cover_image.as_deref(),
            images: &images,
            author_id,
            artist_id,
            type_id,
            genre_ids: &genre_ids,
        };

        let action = match existing {
            None => {
                self.repo.insert_comic(&data).await.or_raise(|| ErrorKind::Database)?;
                if self.config.dry_run {
                    self.plan(&comic.slug);
                }
                Action::Created
            },
            Some(row) => {
                self.repo.update_comic(row.id, &data).await.or_raise(|| ErrorKind::Database)?;
                Action::Updated
            },
        };
        Ok(Upserted::with_images(action, tally))
    }

    async fn named(&self, table: NamedTable, reference: Option<&NamedRef>) -> Result<Option<i64>> {
        let Some(reference) = reference else {
            return Ok(None);
        };
        let id = self.repo.get_or_create_named(table, &reference.name).await.or_raise(|| ErrorKind::Database)?;
        Ok(Some(id))
    }
}
