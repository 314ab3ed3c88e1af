use serde::{Deserialize, Serialize};

use crate::images::Outcome;

/// What happened to a single valid record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Created,
    Updated,
    /// Already present and overwriting was not requested.
    Skipped,
}

/// Image resolutions made on behalf of one record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImageTally {
    pub downloaded: u64,
    pub cached: u64,
}
impl ImageTally {
    pub fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Downloaded => self.downloaded += 1,
            Outcome::Cached => self.cached += 1,
            Outcome::Inline => {},
        }
    }

    pub fn merge(&mut self, other: ImageTally) {
        self.downloaded += other.downloaded;
        self.cached += other.cached;
    }
}

/// The result of upserting one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Upserted {
    pub action: Action,
    pub images: ImageTally,
}
impl Upserted {
    pub fn new(action: Action) -> Self {
        Self { action, images: ImageTally::default() }
    }

    pub fn with_images(action: Action, images: ImageTally) -> Self {
        Self { action, images }
    }
}

/// Reconciliation counts for one entity type.
///
/// `total` counts every loaded record, valid or not, so that
/// `created + updated + skipped + errors == total` once a step completes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityStats {
    pub total: u64,
    pub created: u64,
    pub updated: u64,
    pub skipped: u64,
    pub errors: u64,
    pub images_downloaded: u64,
    pub images_cached: u64,
}
impl EntityStats {
    pub fn record(&mut self, upserted: &Upserted) {
        match upserted.action {
            Action::Created => self.created += 1,
            Action::Updated => self.updated += 1,
            Action::Skipped => self.skipped += 1,
        }
        self.images_downloaded += upserted.images.downloaded;
        self.images_cached += upserted.images.cached;
    }

    /// Records that have been accounted for so far.
    pub fn settled(&self) -> u64 {
        self.created + self.updated + self.skipped + self.errors
    }
}

/// The result of a whole seed run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedSummary {
    pub users: EntityStats,
    pub comics: EntityStats,
    pub chapters: EntityStats,
    pub message: String,
}
impl SeedSummary {
    pub fn errors(&self) -> u64 {
        self.users.errors + self.comics.errors + self.chapters.errors
    }

    /// A one-line human summary, e.g. `Seeded 3 users, 1 comic and 12 chapters (2 errors)`.
    pub(crate) fn describe(&self, dry_run: bool) -> String {
        let count = |n: u64, one: &str, many: &str| format!("{n} {}", if n == 1 { one } else { many });
        let written = |s: &EntityStats| s.created + s.updated;
        let verb = if dry_run { "Dry run: would seed" } else { "Seeded" };
        let mut message = format!(
            "{verb} {}, {} and {}",
            count(written(&self.users), "user", "users"),
            count(written(&self.comics), "comic", "comics"),
            count(written(&self.chapters), "chapter", "chapters"),
        );
        match self.errors() {
            0 => {},
            n => message.push_str(&format!(" ({})", count(n, "error", "errors"))),
        }
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_and_settled() {
        let mut stats = EntityStats { total: 4, errors: 1, ..EntityStats::default() };
        let mut images = ImageTally::default();
        images.record(Outcome::Downloaded);
        images.record(Outcome::Cached);
        images.record(Outcome::Inline);
        stats.record(&Upserted::with_images(Action::Created, images));
        stats.record(&Upserted::new(Action::Skipped));
        stats.record(&Upserted::new(Action::Updated));
        assert_eq!(stats.settled(), stats.total);
        assert_eq!((stats.images_downloaded, stats.images_cached), (1, 1));
    }

    #[test]
    fn test_serialized_shape() {
        let stats = EntityStats { total: 1, created: 1, images_downloaded: 1, ..EntityStats::default() };
        assert_eq!(
            serde_json::to_value(stats).unwrap(),
            json!({
                "total": 1, "created": 1, "updated": 0, "skipped": 0, "errors": 0,
                "imagesDownloaded": 1, "imagesCached": 0,
            })
        );
    }

    #[test]
    fn test_describe() {
        let summary = SeedSummary {
            users: EntityStats { created: 2, updated: 1, ..EntityStats::default() },
            comics: EntityStats { created: 1, errors: 2, ..EntityStats::default() },
            ..SeedSummary::default()
        };
        assert_eq!(summary.describe(false), "Seeded 3 users, 1 comic and 0 chapters (2 errors)");
        assert_eq!(SeedSummary::default().describe(true), "Dry run: would seed 0 users, 0 comics and 0 chapters");
    }
}
