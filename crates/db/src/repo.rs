//! Repository of natural-key lookups and writes for seeded entities.

use exn::{OptionExt, ResultExt};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tankobon_schema::models::User;
use tracing::instrument;

use crate::Database;
use crate::error::{ErrorKind, Result, raise};
use crate::models::{ChapterData, ChapterRow, ComicData, ComicRow, NamedTable, Table, UserRow, now, timestamp, to_i64};

/// Id returned by inserts (and get-or-create of missing rows) in dry-run mode,
/// where nothing is written. Real SQLite row ids start at 1.
pub const DRY_RUN_ID: i64 = 0;

/// Repository for users, comics (with their lookup rows, genres and images)
/// and chapters (with their images).
///
/// In dry-run mode every read behaves normally and every write is skipped:
/// inserts return [`DRY_RUN_ID`], updates and deletes return `Ok(())`.
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
    dry_run: bool,
}
impl From<&Database> for Repository {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone(), dry_run: false }
    }
}
impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool, dry_run: bool) -> Self {
        Self { pool, dry_run }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    async fn begin(&self) -> Result<Transaction<'static, Sqlite>> {
        self.pool.begin().await.or_raise(|| ErrorKind::Database)
    }

    // =========================================================================
    // Users
    // =========================================================================

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        sqlx::query_as(include_str!("../queries/get_user_by_email.sql"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)
    }

    #[instrument(level = "debug", skip_all, fields(email = %user.email))]
    pub async fn insert_user(&self, user: &User) -> Result<i64> {
        if self.dry_run {
            return Ok(DRY_RUN_ID);
        }
        let now = now();
        raise(
            sqlx::query_scalar(include_str!("../queries/insert_user.sql"))
                .bind(&user.email)
                .bind(&user.name)
                .bind(user.role.as_str())
                .bind(user.email_verified.map(timestamp))
                .bind(user.image.as_deref())
                .bind(now)
                .bind(now)
                .fetch_one(&self.pool)
                .await,
        )
    }

    #[instrument(level = "debug", skip_all, fields(id = id, email = %user.email))]
    pub async fn update_user(&self, id: i64, user: &User) -> Result<()> {
        if self.dry_run {
            return Ok(());
        }
        raise(
            sqlx::query(include_str!("../queries/update_user.sql"))
                .bind(&user.name)
                .bind(user.role.as_str())
                .bind(user.email_verified.map(timestamp))
                .bind(user.image.as_deref())
                .bind(now())
                .bind(id)
                .execute(&self.pool)
                .await,
        )?;
        Ok(())
    }

    // =========================================================================
    // Named lookup rows
    // =========================================================================

    /// Get the id of the row named `name`, creating it if missing.
    ///
    /// Safe to call concurrently for the same name: the insert ignores
    /// conflicts and the winner's id is read back.
    #[instrument(level = "debug", skip(self))]
    pub async fn get_or_create_named(&self, table: NamedTable, name: &str) -> Result<i64> {
        let select = format!("SELECT id FROM {} WHERE name = ?", table.as_str());
        let existing: Option<i64> = sqlx::query_scalar(&select)
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        if let Some(id) = existing {
            return Ok(id);
        }
        if self.dry_run {
            return Ok(DRY_RUN_ID);
        }
        let insert = format!("INSERT INTO {} (name) VALUES (?) ON CONFLICT (name) DO NOTHING", table.as_str());
        sqlx::query(&insert).bind(name).execute(&self.pool).await.or_raise(|| ErrorKind::Database)?;
        let created: Option<i64> = sqlx::query_scalar(&select)
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        created.ok_or_raise(|| ErrorKind::Database)
    }

    // =========================================================================
    // Comics
    // =========================================================================

    pub async fn get_comic_by_slug(&self, slug: &str) -> Result<Option<ComicRow>> {
        sqlx::query_as(include_str!("../queries/get_comic_by_slug.sql"))
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)
    }

    /// Insert a comic together with its genre links and images.
    #[instrument(level = "debug", skip_all, fields(slug = %data.comic.slug))]
    pub async fn insert_comic(&self, data: &ComicData<'_>) -> Result<i64> {
        if self.dry_run {
            return Ok(DRY_RUN_ID);
        }
        let comic = data.comic;
        let now = now();
        let mut tx = self.begin().await?;
        let id: i64 = raise(
            sqlx::query_scalar(include_str!("../queries/insert_comic.sql"))
                .bind(&comic.title)
                .bind(&comic.slug)
                .bind(&comic.description)
                .bind(data.cover_image)
                .bind(comic.status.as_str())
                .bind(comic.rating)
                .bind(to_i64(comic.views, "views")?)
                .bind(comic.publication_date.map(timestamp))
                .bind(data.author_id)
                .bind(data.artist_id)
                .bind(data.type_id)
                .bind(now)
                .bind(now)
                .fetch_one(&mut *tx)
                .await,
        )?;
        Self::write_comic_relations(&mut tx, id, data).await?;
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        Ok(id)
    }

    /// Overwrite a comic's fields, genre links and images. The slug is the
    /// natural key and never changes.
    #[instrument(level = "debug", skip_all, fields(id = id, slug = %data.comic.slug))]
    pub async fn update_comic(&self, id: i64, data: &ComicData<'_>) -> Result<()> {
        if self.dry_run {
            return Ok(());
        }
        let comic = data.comic;
        let mut tx = self.begin().await?;
        raise(
            sqlx::query(include_str!("../queries/update_comic.sql"))
                .bind(&comic.title)
                .bind(&comic.description)
                .bind(data.cover_image)
                .bind(comic.status.as_str())
                .bind(comic.rating)
                .bind(to_i64(comic.views, "views")?)
                .bind(comic.publication_date.map(timestamp))
                .bind(data.author_id)
                .bind(data.artist_id)
                .bind(data.type_id)
                .bind(now())
                .bind(id)
                .execute(&mut *tx)
                .await,
        )?;
        for query in [include_str!("../queries/delete_comic_genres.sql"), include_str!("../queries/delete_comic_images.sql")] {
            sqlx::query(query).bind(id).execute(&mut *tx).await.or_raise(|| ErrorKind::Database)?;
        }
        Self::write_comic_relations(&mut tx, id, data).await?;
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    async fn write_comic_relations(tx: &mut Transaction<'_, Sqlite>, comic_id: i64, data: &ComicData<'_>) -> Result<()> {
        for genre_id in data.genre_ids {
            sqlx::query(include_str!("../queries/insert_comic_genre.sql"))
                .bind(comic_id)
                .bind(genre_id)
                .execute(&mut **tx)
                .await
                .or_raise(|| ErrorKind::Database)?;
        }
        for (position, url) in data.images.iter().enumerate() {
            sqlx::query(include_str!("../queries/insert_comic_image.sql"))
                .bind(comic_id)
                .bind(to_i64(position as u64, "image position")?)
                .bind(url)
                .execute(&mut **tx)
                .await
                .or_raise(|| ErrorKind::Database)?;
        }
        Ok(())
    }

    /// Genre names linked to a comic, alphabetically.
    pub async fn list_comic_genres(&self, comic_id: i64) -> Result<Vec<String>> {
        sqlx::query_scalar(include_str!("../queries/list_comic_genres.sql"))
            .bind(comic_id)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)
    }

    /// Image URLs of a comic, in display order.
    pub async fn list_comic_images(&self, comic_id: i64) -> Result<Vec<String>> {
        sqlx::query_scalar(include_str!("../queries/list_comic_images.sql"))
            .bind(comic_id)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)
    }

    // =========================================================================
    // Chapters
    // =========================================================================

    pub async fn get_chapter(&self, comic_id: i64, chapter_number: u32) -> Result<Option<ChapterRow>> {
        sqlx::query_as(include_str!("../queries/get_chapter.sql"))
            .bind(comic_id)
            .bind(i64::from(chapter_number))
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)
    }

    #[instrument(level = "debug", skip_all, fields(comic_id = data.comic_id, number = data.chapter.chapter_number))]
    pub async fn insert_chapter(&self, data: &ChapterData<'_>) -> Result<i64> {
        if self.dry_run {
            return Ok(DRY_RUN_ID);
        }
        let chapter = data.chapter;
        let now = now();
        let mut tx = self.begin().await?;
        let id: i64 = raise(
            sqlx::query_scalar(include_str!("../queries/insert_chapter.sql"))
                .bind(data.comic_id)
                .bind(i64::from(chapter.chapter_number))
                .bind(&chapter.title)
                .bind(to_i64(chapter.views, "views")?)
                .bind(chapter.release_date.map(timestamp))
                .bind(now)
                .bind(now)
                .fetch_one(&mut *tx)
                .await,
        )?;
        Self::write_chapter_images(&mut tx, id, data.images).await?;
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        Ok(id)
    }

    #[instrument(level = "debug", skip_all, fields(id = id, number = data.chapter.chapter_number))]
    pub async fn update_chapter(&self, id: i64, data: &ChapterData<'_>) -> Result<()> {
        if self.dry_run {
            return Ok(());
        }
        let chapter = data.chapter;
        let mut tx = self.begin().await?;
        raise(
            sqlx::query(include_str!("../queries/update_chapter.sql"))
                .bind(&chapter.title)
                .bind(to_i64(chapter.views, "views")?)
                .bind(chapter.release_date.map(timestamp))
                .bind(now())
                .bind(id)
                .execute(&mut *tx)
                .await,
        )?;
        sqlx::query(include_str!("../queries/delete_chapter_images.sql"))
            .bind(id)
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Self::write_chapter_images(&mut tx, id, data.images).await?;
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    async fn write_chapter_images(tx: &mut Transaction<'_, Sqlite>, chapter_id: i64, images: &[String]) -> Result<()> {
        for (position, url) in images.iter().enumerate() {
            sqlx::query(include_str!("../queries/insert_chapter_image.sql"))
                .bind(chapter_id)
                .bind(to_i64(position as u64, "image position")?)
                .bind(url)
                .execute(&mut **tx)
                .await
                .or_raise(|| ErrorKind::Database)?;
        }
        Ok(())
    }

    /// Image URLs of a chapter, in reading order.
    pub async fn list_chapter_images(&self, chapter_id: i64) -> Result<Vec<String>> {
        sqlx::query_scalar(include_str!("../queries/list_chapter_images.sql"))
            .bind(chapter_id)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    pub async fn count(&self, table: Table) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table.as_str()))
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        u64::try_from(count).or_raise(|| ErrorKind::InvalidData("row count"))
    }

    /// Delete every row of the given tables, in the order given, in one
    /// transaction. Deleting comics also deletes their chapters.
    #[instrument(skip(self))]
    pub async fn clear(&self, tables: &[Table]) -> Result<()> {
        if self.dry_run {
            tracing::info!("Skipping clear during dry run");
            return Ok(());
        }
        let mut tx = self.begin().await?;
        for table in tables {
            let deleted = sqlx::query(&format!("DELETE FROM {}", table.as_str()))
                .execute(&mut *tx)
                .await
                .or_raise(|| ErrorKind::Database)?
                .rows_affected();
            tracing::info!(table = table.as_str(), deleted, "Cleared table");
        }
        tx.commit().await.or_raise(|| ErrorKind::Database)
    }

    /// Delete every row of every table.
    #[instrument(skip(self))]
    pub async fn reset(&self) -> Result<()> {
        if self.dry_run {
            tracing::info!("Skipping reset during dry run");
            return Ok(());
        }
        let mut tx = self.begin().await?;
        sqlx::query(include_str!("../queries/reset.sql")).execute(&mut *tx).await.or_raise(|| ErrorKind::Database)?;
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        tracing::info!("Reset database");
        Ok(())
    }
}
