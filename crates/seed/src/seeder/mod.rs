//! The seed run: users, then comics, then chapters.
//!
//! Each step loads its source files, validates every record, and drives the
//! valid ones through an upsert under a [`BatchProcessor`]. Invalid records
//! and failed upserts are counted as errors against the step; neither stops
//! the run. Only problems found while setting up (or clearing) abort it.

mod chapters;
mod comics;
mod users;

use exn::ResultExt;
use futures::{StreamExt, TryStreamExt, stream};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tankobon_asyncutils::BatchProcessor;
use tankobon_config::{Entity, SeedConfig, Settings, UploadSettings};
use tankobon_db::{Database, Repository, Table};
use tankobon_schema::Validated;
use tankobon_source::read_multiple_json_files;
use tankobon_storage::BackendHandle;
use tankobon_storage::backend::{LocalBackend, MockBackend, ReadOnlyBackend};
use tracing::instrument;

use crate::UploadPathGenerator;
use crate::error::{Error, ErrorKind, Result};
use crate::images::{DefaultFetcher, ImageCache, ImageContext, ImageFetcher, ImageResolver, Outcome};
use crate::stats::{EntityStats, ImageTally, SeedSummary, Upserted};
use crate::status::{Step, StatusFile};

/// A record's natural key, for log lines.
trait NaturalKey {
    fn natural_key(&self) -> String;
}

/// Build the upload backend selected in settings.
///
/// Relative local roots are resolved against the current directory.
pub fn backend_from_settings(settings: &Settings) -> Result<BackendHandle> {
    Ok(match &settings.upload {
        UploadSettings::Local { base_url, .. } => {
            let root = settings.upload_root().unwrap_or_else(|| settings.public_dir.join("uploads"));
            let root = std::path::absolute(&root).or_raise(|| ErrorKind::Configuration)?;
            Arc::new(LocalBackend::new("local", root, base_url.clone()).or_raise(|| ErrorKind::Configuration)?)
        },
        UploadSettings::Mock => Arc::new(MockBackend::default()),
    })
}

/// Run a complete seed with the production fetcher and the backend selected
/// in settings.
pub async fn run_seed(settings: &Settings, config: SeedConfig, db: &Database) -> Result<SeedSummary> {
    let backend = backend_from_settings(settings)?;
    Seeder::from_settings(settings, config, db, backend)?.run().await
}

/// Coordinates a seed run. Constructed once per invocation.
pub struct Seeder {
    config: SeedConfig,
    sources: HashMap<Entity, Vec<PathBuf>>,
    repo: Repository,
    backend: BackendHandle,
    resolver: ImageResolver,
    status: StatusFile,
    /// Comic slugs that a dry run would have created, so their chapters can
    /// be checked against them.
    planned: Mutex<HashSet<String>>,
}

impl Seeder {
    /// In dry-run mode the repository and the backend are wrapped so that
    /// reads work and writes are skipped.
    pub fn new(
        config: SeedConfig,
        db: &Database,
        backend: BackendHandle,
        fetcher: Arc<dyn ImageFetcher>,
        upload_template: &str,
    ) -> Result<Self> {
        let backend: BackendHandle = if config.dry_run { Arc::new(ReadOnlyBackend::new(backend)) } else { backend };
        let paths = upload_template.parse::<UploadPathGenerator>().or_raise(|| ErrorKind::Configuration)?;
        let resolver = ImageResolver::new(Arc::new(ImageCache::new()), fetcher, backend.clone(), paths);
        Ok(Self {
            repo: Repository::new(db.pool().clone(), config.dry_run),
            config,
            sources: HashMap::new(),
            backend,
            resolver,
            status: StatusFile::new(None),
            planned: Mutex::new(HashSet::new()),
        })
    }

    pub fn from_settings(settings: &Settings, config: SeedConfig, db: &Database, backend: BackendHandle) -> Result<Self> {
        let fetcher = Arc::new(DefaultFetcher::new(&settings.public_dir)?);
        let mut seeder = Self::new(config, db, backend, fetcher, &settings.upload_template)?
            .with_status_file(settings.status_file.clone());
        for entity in Entity::ALL {
            seeder = seeder.with_sources(entity, settings.source_patterns(entity));
        }
        Ok(seeder)
    }

    /// File patterns to load an entity's records from.
    pub fn with_sources(mut self, entity: Entity, patterns: Vec<PathBuf>) -> Self {
        self.sources.insert(entity, patterns);
        self
    }

    pub fn with_status_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.status = StatusFile::new(path.into());
        self
    }

    pub fn config(&self) -> &SeedConfig {
        &self.config
    }

    pub fn image_cache(&self) -> &ImageCache {
        self.resolver.cache()
    }

    #[instrument(skip(self), fields(dry_run = self.config.dry_run, force = self.config.force))]
    pub async fn run(&self) -> Result<SeedSummary> {
        if let Err(error) = self.prepare().await {
            self.report(self.status.step(Step::Failed));
            self.status.flush().await;
            return Err(error);
        }
        let mut summary = SeedSummary::default();
        for entity in self.config.entities.iter() {
            self.report(self.status.step(entity.into()));
            let patterns = self.sources.get(&entity).map(Vec::as_slice).unwrap_or_default();
            let records = read_multiple_json_files(patterns).await;
            tracing::info!(%entity, records = records.len(), "Loaded source records");
            let stats = match entity {
                Entity::Users => self.seed_users(&records).await,
                Entity::Comics => self.seed_comics(&records).await,
                Entity::Chapters => self.seed_chapters(&records).await,
            };
            self.report(self.status.progress(entity, stats));
            tracing::info!(
                %entity,
                total = stats.total,
                created = stats.created,
                updated = stats.updated,
                skipped = stats.skipped,
                errors = stats.errors,
                "Step complete"
            );
            match entity {
                Entity::Users => summary.users = stats,
                Entity::Comics => summary.comics = stats,
                Entity::Chapters => summary.chapters = stats,
            }
        }
        summary.message = summary.describe(self.config.dry_run);
        let cache = self.image_cache().get_cache_stats();
        tracing::info!(hits = cache.hits, misses = cache.misses, hit_rate = cache.hit_rate, "Image cache");
        self.report(self.status.step(Step::Complete));
        self.status.flush().await;
        tracing::info!(message = %summary.message, "Seed finished");
        Ok(summary)
    }

    /// Handle `--reset` and `--clear` before any step runs.
    async fn prepare(&self) -> Result<()> {
        if !(self.config.reset || self.config.clear) {
            return Ok(());
        }
        if self.config.dry_run {
            tracing::info!(reset = self.config.reset, clear = self.config.clear, "Skipping clear during dry run");
            return Ok(());
        }
        if self.config.reset {
            self.status.remove().await?;
            self.report(self.status.step(Step::Clearing));
            self.repo.reset().await.or_raise(|| ErrorKind::Database)?;
            let deleted = self.delete_uploads().await?;
            tracing::info!(deleted, "Reset database and uploads");
        } else {
            self.report(self.status.step(Step::Clearing));
            let tables: Vec<Table> = self
                .config
                .entities
                .iter()
                .map(|entity| match entity {
                    Entity::Users => Table::Users,
                    Entity::Comics => Table::Comics,
                    Entity::Chapters => Table::Chapters,
                })
                .collect();
            self.repo.clear(&tables).await.or_raise(|| ErrorKind::Database)?;
            tracing::info!(tables = ?tables.iter().map(Table::as_str).collect::<Vec<_>>(), "Cleared tables");
        }
        Ok(())
    }

    async fn delete_uploads(&self) -> Result<usize> {
        let files = self.backend.list(None).await.or_raise(|| ErrorKind::Storage)?;
        for file in &files {
            self.backend.delete(&file.path).await.or_raise(|| ErrorKind::Storage)?;
        }
        self.image_cache().clear_cache();
        Ok(files.len())
    }

    /// Drive `upsert` over every valid record and tally the results. Invalid
    /// records are counted as errors up front.
    async fn run_step<'a, T, F, Fut>(&'a self, entity: Entity, records: &'a Validated<T>, upsert: F) -> EntityStats
    where
        T: NaturalKey + Sync,
        F: Fn(&'a T) -> Fut,
        Fut: Future<Output = Result<Upserted>> + 'a,
    {
        let progress = Mutex::new(EntityStats {
            total: records.total() as u64,
            errors: records.invalid.len() as u64,
            ..EntityStats::default()
        });
        let mut processor = BatchProcessor::new()
            .batch_size(self.config.batch_size)
            .concurrency(self.config.concurrency)
            .on_batch_complete(|outputs: &[Upserted], batch| {
                let mut stats = progress.lock().unwrap_or_else(PoisonError::into_inner);
                outputs.iter().for_each(|output| stats.record(output));
                tracing::info!(%entity, batch = batch + 1, settled = stats.settled(), total = stats.total, "Progress");
                self.report(self.status.progress(entity, *stats));
            })
            .on_error(|error: &Error, record: &T| {
                progress.lock().unwrap_or_else(PoisonError::into_inner).errors += 1;
                tracing::warn!(%entity, record = record.natural_key(), %error, "Failed to seed record");
            });
        processor.process(&records.valid, |record, _| self.within(upsert(record))).await;
        drop(processor);
        progress.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply the per-record time limit, if any.
    async fn within<T>(&self, work: impl Future<Output = Result<T>>) -> Result<T> {
        match self.config.item_timeout {
            Some(limit) => match tokio::time::timeout(limit, work).await {
                Ok(result) => result,
                Err(_) => exn::bail!(ErrorKind::Timeout(limit)),
            },
            None => work.await,
        }
    }

    /// Resolve image URLs in order, at most `image_concurrency` at a time.
    /// With `--skip-images`, the source URLs are kept as they are.
    async fn resolve_images(&self, urls: &[&str], context: ImageContext<'_>) -> Result<(Vec<String>, ImageTally)> {
        let mut tally = ImageTally::default();
        if self.config.skip_images {
            return Ok((urls.iter().map(|url| url.to_string()).collect(), tally));
        }
        let context = &context;
        let resolved: Vec<_> = stream::iter(urls.iter().copied())
            .map(move |url| self.resolver.resolve(url, context))
            .buffered(self.config.image_concurrency)
            .try_collect()
            .await?;
        let urls = resolved
            .into_iter()
            .map(|resolved| {
                tally.record(resolved.outcome);
                resolved.url
            })
            .collect();
        Ok((urls, tally))
    }

    /// Account for the images of a record that is being skipped. Its stored
    /// URLs already point at uploads, so nothing is fetched. When the stored
    /// list lines up with the sources, each pair is remembered for other
    /// records that share a source URL.
    fn reuse_images(&self, sources: &[&str], stored: &[String]) -> ImageTally {
        let mut tally = ImageTally::default();
        if self.config.skip_images {
            return tally;
        }
        let aligned = sources.len() == stored.len();
        for (i, source) in sources.iter().enumerate() {
            if source.starts_with("data:") {
                tally.record(Outcome::Inline);
                continue;
            }
            tally.record(Outcome::Cached);
            if aligned && stored[i] != *source {
                self.image_cache().cache_image(source, &stored[i], None);
            }
        }
        tally
    }

    fn plan(&self, slug: &str) {
        self.planned.lock().unwrap_or_else(PoisonError::into_inner).insert(slug.to_string());
    }

    fn is_planned(&self, slug: &str) -> bool {
        self.planned.lock().unwrap_or_else(PoisonError::into_inner).contains(slug)
    }

    /// Status file failures are logged, never fatal.
    fn report(&self, result: Result<()>) {
        if let Err(error) = result {
            tracing::warn!(path = ?self.status.path().map(Path::display), %error, "Could not update status file");
        }
    }
}
