use async_trait::async_trait;
use serde_json::{Value, json};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tankobon_config::{DEFAULT_UPLOAD_TEMPLATE, Entities, Entity, SeedConfig};
use tankobon_db::{Database, Repository, Table};
use tankobon_seed::error::Result;
use tankobon_seed::images::ImageFetcher;
use tankobon_seed::{EntityStats, SeedSummary, Seeder};
use tankobon_storage::backend::{MockBackend, StorageBackend};
use tempfile::TempDir;

const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Serves a distinct PNG per URL. URLs containing "slow" take a second.
#[derive(Default)]
struct FakeFetcher {
    calls: AtomicUsize,
}
#[async_trait]
impl ImageFetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(if url.contains("slow") { 1000 } else { 5 })).await;
        let mut bytes = PNG_MAGIC.to_vec();
        bytes.extend_from_slice(url.as_bytes());
        Ok(bytes)
    }
}

struct Fixture {
    dir: TempDir,
    db: Database,
    backend: Arc<MockBackend>,
    fetcher: Arc<FakeFetcher>,
}

impl Fixture {
    async fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
            db: Database::connect_in_memory().await.unwrap(),
            backend: Arc::new(MockBackend::default()),
            fetcher: Arc::new(FakeFetcher::default()),
        }
    }

    fn write(&self, name: &str, records: Value) {
        std::fs::write(self.dir.path().join(name), serde_json::to_vec(&records).unwrap()).unwrap();
    }

    fn status_path(&self) -> std::path::PathBuf {
        self.dir.path().join("status/seed-status.json")
    }

    fn seeder(&self, config: SeedConfig) -> Seeder {
        let mut seeder = Seeder::new(config, &self.db, self.backend.clone(), self.fetcher.clone(), DEFAULT_UPLOAD_TEMPLATE)
            .unwrap()
            .with_status_file(self.status_path());
        for entity in Entity::ALL {
            seeder = seeder.with_sources(entity, vec![self.dir.path().join(format!("{entity}.json"))]);
        }
        seeder
    }

    async fn run(&self, config: SeedConfig) -> SeedSummary {
        self.seeder(config).run().await.unwrap()
    }

    fn repo(&self) -> Repository {
        Repository::from(&self.db)
    }
}

fn only(entities: &[Entity]) -> SeedConfig {
    SeedConfig { entities: entities.iter().copied().collect(), ..SeedConfig::default() }
}

fn solo_leveling() -> Value {
    json!([{
        "title": "Solo Leveling",
        "slug": "solo-leveling",
        "description": "...",
        "images": [{"url": "https://cdn/a.jpg"}],
    }])
}

fn library() -> (Value, Value, Value) {
    let users = json!([
        {"email": "Admin@Example.com", "name": "Admin", "role": "admin"},
        {"email": "reader@example.com", "name": "Reader", "emailVerified": "2024-01-01"},
    ]);
    let comics = json!([
        {
            "title": "Solo Leveling",
            "slug": "solo-leveling",
            "description": "E-rank hunter.",
            "coverImage": "https://cdn/cover.jpg",
            "author": "Chugong",
            "artist": {"name": "DUBU"},
            "type": "Manhwa",
            "genres": ["Action", {"name": "Fantasy"}],
            "rating": "9.5",
        },
        {
            "title": "Omniscient Reader",
            "slug": "omniscient-reader",
            "description": "The end of the world.",
            "author": "Sing Shong",
            "genres": ["Action"],
        },
    ]);
    let chapters = json!([
        {"title": "Chapter 1", "chapterNumber": 1, "comic": {"title": "Solo Leveling", "slug": "solo-leveling"}, "images": ["https://cdn/1-1.jpg", "https://cdn/1-2.jpg"]},
        {"title": "Chapter 2", "chapterNumber": "2", "comic": {"title": "Solo Leveling", "slug": "solo-leveling"}},
        {"title": "Prologue", "chapterNumber": 1, "comic": {"title": "Omniscient Reader", "slug": "omniscient-reader"}},
    ]);
    (users, comics, chapters)
}

#[tokio::test]
async fn test_solo_leveling_scenario() {
    let fixture = Fixture::new().await;
    fixture.write("comics.json", solo_leveling());

    let first = fixture.run(only(&[Entity::Comics])).await;
    assert_eq!(
        first.comics,
        EntityStats { total: 1, created: 1, images_downloaded: 1, ..EntityStats::default() }
    );

    // A second process: fresh image cache, same database and upload backend.
    let second = fixture.run(only(&[Entity::Comics])).await;
    assert_eq!(
        second.comics,
        EntityStats { total: 1, skipped: 1, images_cached: 1, ..EntityStats::default() }
    );
    assert_eq!(fixture.backend.write_count(), 1);
    assert_eq!(second.users, EntityStats::default());
    // The skipped comic's image is accounted for from its stored row.
    assert_eq!(fixture.fetcher.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_reset_on_same_seeder_uploads_again() {
    let fixture = Fixture::new().await;
    fixture.write("comics.json", solo_leveling());
    let seeder = fixture.seeder(SeedConfig { reset: true, ..only(&[Entity::Comics]) });

    let first = seeder.run().await.unwrap();
    let second = seeder.run().await.unwrap();
    assert_eq!(first.comics, second.comics);
    assert_eq!(second.comics, EntityStats { total: 1, created: 1, images_downloaded: 1, ..EntityStats::default() });
    assert_eq!(fixture.backend.write_count(), 2);

    let repo = fixture.repo();
    let comic = repo.get_comic_by_slug("solo-leveling").await.unwrap().unwrap();
    let images = repo.list_comic_images(comic.id).await.unwrap();
    let key = images[0].trim_start_matches("/mock/");
    assert!(fixture.backend.exists(Path::new(key)).await.unwrap(), "{key} was deleted by the reset");
}

#[tokio::test]
async fn test_skipped_records_share_stored_uploads() {
    let fixture = Fixture::new().await;
    fixture.write("comics.json", solo_leveling());
    fixture.run(only(&[Entity::Comics])).await;

    // A new comic reusing the skipped comic's image resolves from the cache.
    let mut comics = solo_leveling();
    comics.as_array_mut().unwrap().push(json!({
        "title": "Sequel", "slug": "sequel", "description": "...", "images": ["https://cdn/a.jpg"],
    }));
    fixture.write("comics.json", comics);
    let config = SeedConfig { concurrency: 1, ..only(&[Entity::Comics]) };
    let summary = fixture.run(config).await;
    assert_eq!((summary.comics.created, summary.comics.skipped, summary.comics.images_cached), (1, 1, 2));
    assert_eq!(fixture.fetcher.calls.load(Ordering::SeqCst), 1);

    let repo = fixture.repo();
    let first = repo.get_comic_by_slug("solo-leveling").await.unwrap().unwrap();
    let sequel = repo.get_comic_by_slug("sequel").await.unwrap().unwrap();
    assert_eq!(repo.list_comic_images(first.id).await.unwrap(), repo.list_comic_images(sequel.id).await.unwrap());
}

#[tokio::test]
async fn test_second_run_is_idempotent() {
    let fixture = Fixture::new().await;
    let (users, comics, chapters) = library();
    fixture.write("users.json", users);
    fixture.write("comics.json", comics);
    fixture.write("chapters.json", chapters);

    let first = fixture.run(SeedConfig::default()).await;
    assert_eq!((first.users.created, first.comics.created, first.chapters.created), (2, 2, 3));
    assert_eq!(first.errors(), 0);
    assert_eq!(first.comics.images_downloaded, 1);
    assert_eq!(first.chapters.images_downloaded, 2);

    let second = fixture.run(SeedConfig::default()).await;
    for (first, second) in [(first.users, second.users), (first.comics, second.comics), (first.chapters, second.chapters)] {
        assert_eq!(second.created, 0);
        assert_eq!(second.updated, 0);
        assert_eq!(second.skipped, first.created);
    }
    assert_eq!(fixture.repo().count(Table::Chapters).await.unwrap(), 3);
    assert_eq!(fixture.backend.write_count(), 3);

    let repo = fixture.repo();
    let admin = repo.get_user_by_email("admin@example.com").await.unwrap().unwrap();
    assert_eq!(admin.role, "admin");
    let comic = repo.get_comic_by_slug("solo-leveling").await.unwrap().unwrap();
    assert_eq!(repo.list_comic_genres(comic.id).await.unwrap(), vec!["Action", "Fantasy"]);
    assert!(comic.cover_image.as_deref().is_some_and(|url| url.starts_with("/mock/covers/solo-leveling/")));
    assert!(comic.author_id.is_some() && comic.artist_id.is_some() && comic.type_id.is_some());
}

#[tokio::test]
async fn test_shared_image_is_uploaded_once() {
    let fixture = Fixture::new().await;
    let comics: Vec<Value> = (0..8)
        .map(|i| {
            json!({
                "title": format!("Comic {i}"),
                "slug": format!("comic-{i}"),
                "description": "...",
                "images": ["https://cdn/shared.png"],
            })
        })
        .collect();
    fixture.write("comics.json", Value::Array(comics));

    let config = SeedConfig { batch_size: 8, concurrency: 8, ..only(&[Entity::Comics]) };
    let summary = fixture.run(config).await;

    assert_eq!(summary.comics.created, 8);
    assert_eq!(summary.comics.images_downloaded, 1);
    assert_eq!(summary.comics.images_cached, 7);
    assert_eq!(fixture.backend.write_count(), 1);
    assert_eq!(fixture.fetcher.calls.load(Ordering::SeqCst), 1);

    let repo = fixture.repo();
    let mut destinations = Vec::new();
    for i in 0..8 {
        let comic = repo.get_comic_by_slug(&format!("comic-{i}")).await.unwrap().unwrap();
        destinations.extend(repo.list_comic_images(comic.id).await.unwrap());
    }
    assert_eq!(destinations.len(), 8);
    assert!(destinations.iter().all(|url| *url == destinations[0]));
}

#[tokio::test]
async fn test_invalid_records_are_counted_not_fatal() {
    let fixture = Fixture::new().await;
    fixture.write(
        "comics.json",
        json!({"data": [
            {"title": "A", "slug": "a", "description": "..."},
            {"title": "B", "description": "missing slug"},
            {"title": "C", "slug": "c", "description": "...", "unexpected": true},
            {"title": "D", "slug": "d", "description": "...", "status": "on-hiatus"},
        ]}),
    );
    let summary = fixture.run(only(&[Entity::Comics])).await;
    assert_eq!(summary.comics, EntityStats { total: 4, created: 2, errors: 2, ..EntityStats::default() });
    assert!(summary.message.contains("2 errors"));
    let hiatus = fixture.repo().get_comic_by_slug("d").await.unwrap().unwrap();
    assert_eq!(hiatus.status, "Hiatus");
}

#[tokio::test]
async fn test_force_updates_existing_records() {
    let fixture = Fixture::new().await;
    fixture.write("users.json", json!([{"email": "a@example.com", "name": "Before"}]));
    fixture.run(only(&[Entity::Users])).await;

    fixture.write("users.json", json!([{"email": "a@example.com", "name": "After"}]));
    let skipped = fixture.run(only(&[Entity::Users])).await;
    assert_eq!(skipped.users.skipped, 1);
    let row = fixture.repo().get_user_by_email("a@example.com").await.unwrap().unwrap();
    assert_eq!(row.name, "Before");

    let forced = fixture.run(SeedConfig { force: true, ..only(&[Entity::Users]) }).await;
    assert_eq!(forced.users, EntityStats { total: 1, updated: 1, ..EntityStats::default() });
    let row = fixture.repo().get_user_by_email("a@example.com").await.unwrap().unwrap();
    assert_eq!(row.name, "After");
}

#[tokio::test]
async fn test_dry_run_writes_nothing() {
    let fixture = Fixture::new().await;
    let (users, comics, chapters) = library();
    fixture.write("users.json", users);
    fixture.write("comics.json", comics);
    fixture.write("chapters.json", chapters);

    let summary = fixture.run(SeedConfig { dry_run: true, ..SeedConfig::default() }).await;
    assert_eq!((summary.users.created, summary.comics.created, summary.chapters.created), (2, 2, 3));
    assert_eq!(summary.chapters.errors, 0, "chapters of planned comics must not fail");
    assert!(summary.message.starts_with("Dry run"));

    let repo = fixture.repo();
    for table in [Table::Users, Table::Comics, Table::Chapters] {
        assert_eq!(repo.count(table).await.unwrap(), 0, "{}", table.as_str());
    }
    assert_eq!(fixture.backend.write_count(), 0);
    assert!(fixture.backend.is_empty().await);
}

#[tokio::test]
async fn test_chapter_without_comic_is_an_error() {
    let fixture = Fixture::new().await;
    fixture.write(
        "chapters.json",
        json!([{"title": "Lost", "chapterNumber": 1, "comic": {"title": "Nowhere", "slug": "nowhere"}}]),
    );
    let summary = fixture.run(only(&[Entity::Chapters])).await;
    assert_eq!(summary.chapters, EntityStats { total: 1, errors: 1, ..EntityStats::default() });
}

#[tokio::test]
async fn test_slow_record_times_out() {
    let fixture = Fixture::new().await;
    fixture.write(
        "comics.json",
        json!([
            {"title": "Fast", "slug": "fast", "description": "...", "images": ["https://cdn/fast.png"]},
            {"title": "Slow", "slug": "slow", "description": "...", "images": ["https://cdn/slow.png"]},
        ]),
    );
    let config = SeedConfig { item_timeout: Some(Duration::from_millis(200)), ..only(&[Entity::Comics]) };
    let summary = fixture.run(config).await;
    assert_eq!(summary.comics.created, 1);
    assert_eq!(summary.comics.errors, 1);
    assert!(fixture.repo().get_comic_by_slug("slow").await.unwrap().is_none());
}

#[tokio::test]
async fn test_skip_images_keeps_source_urls() {
    let fixture = Fixture::new().await;
    fixture.write("comics.json", solo_leveling());
    let summary = fixture.run(SeedConfig { skip_images: true, ..only(&[Entity::Comics]) }).await;
    assert_eq!((summary.comics.images_downloaded, summary.comics.images_cached), (0, 0));
    assert_eq!(fixture.fetcher.calls.load(Ordering::SeqCst), 0);
    let repo = fixture.repo();
    let comic = repo.get_comic_by_slug("solo-leveling").await.unwrap().unwrap();
    assert_eq!(repo.list_comic_images(comic.id).await.unwrap(), vec!["https://cdn/a.jpg"]);
}

#[tokio::test]
async fn test_clear_only_touches_selected_entities() {
    let fixture = Fixture::new().await;
    let (users, comics, _) = library();
    fixture.write("users.json", users);
    fixture.write("comics.json", comics);
    fixture.run(only(&[Entity::Users, Entity::Comics])).await;

    let summary = fixture.run(SeedConfig { clear: true, ..only(&[Entity::Users]) }).await;
    assert_eq!(summary.users.created, 2);
    assert_eq!(fixture.repo().count(Table::Comics).await.unwrap(), 2);
}

#[tokio::test]
async fn test_reset_removes_rows_and_uploads() {
    let fixture = Fixture::new().await;
    fixture.write("comics.json", solo_leveling());
    fixture.run(only(&[Entity::Comics])).await;
    assert!(fixture.status_path().exists());
    // An upload from some earlier run that no record refers to any more.
    fixture.backend.write(Path::new("comics/old/stale.png"), b"stale").await.unwrap();

    std::fs::remove_file(fixture.dir.path().join("comics.json")).unwrap();
    let summary = fixture.run(SeedConfig { reset: true, ..only(&[Entity::Comics]) }).await;
    assert_eq!(summary.comics, EntityStats::default());
    assert_eq!(fixture.repo().count(Table::Comics).await.unwrap(), 0);
    assert!(fixture.backend.is_empty().await);
}

#[tokio::test]
async fn test_status_file_reports_completion() {
    let fixture = Fixture::new().await;
    fixture.write("users.json", json!([{"email": "a@example.com", "name": "A"}]));
    fixture.run(only(&[Entity::Users])).await;

    let status: Value = serde_json::from_slice(&std::fs::read(fixture.status_path()).unwrap()).unwrap();
    assert_eq!(status["step"], "complete");
    assert_eq!(status["users"]["created"], 1);
    assert!(status.get("comics").is_none());
}

#[test]
fn test_entities_collect_in_seed_order() {
    let entities: Entities = [Entity::Chapters, Entity::Users].into_iter().collect();
    assert_eq!(entities.iter().collect::<Vec<_>>(), vec![Entity::Users, Entity::Chapters]);
}
