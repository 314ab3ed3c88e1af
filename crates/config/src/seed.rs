use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::Settings;

/// The kinds of record a seed run can load, in the order they are seeded.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Entity {
    #[display("users")]
    Users,
    #[display("comics")]
    Comics,
    #[display("chapters")]
    Chapters,
}
impl Entity {
    pub const ALL: [Entity; 3] = [Entity::Users, Entity::Comics, Entity::Chapters];
}

/// A set of selected entities, always iterated in seeding order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entities {
    users: bool,
    comics: bool,
    chapters: bool,
}
impl Entities {
    pub fn all() -> Self {
        Self { users: true, comics: true, chapters: true }
    }

    pub fn none() -> Self {
        Self { users: false, comics: false, chapters: false }
    }

    pub fn with(mut self, entity: Entity) -> Self {
        match entity {
            Entity::Users => self.users = true,
            Entity::Comics => self.comics = true,
            Entity::Chapters => self.chapters = true,
        }
        self
    }

    pub fn contains(&self, entity: Entity) -> bool {
        match entity {
            Entity::Users => self.users,
            Entity::Comics => self.comics,
            Entity::Chapters => self.chapters,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.users || self.comics || self.chapters)
    }

    pub fn iter(&self) -> impl Iterator<Item = Entity> + '_ {
        Entity::ALL.into_iter().filter(|e| self.contains(*e))
    }
}
impl Default for Entities {
    fn default() -> Self {
        Self::all()
    }
}
impl FromIterator<Entity> for Entities {
    fn from_iter<I: IntoIterator<Item = Entity>>(iter: I) -> Self {
        iter.into_iter().fold(Self::none(), Self::with)
    }
}

/// Command-line switches for a single run.
#[derive(Debug, Clone, Default)]
pub struct SeedFlags {
    pub users: bool,
    pub comics: bool,
    pub chapters: bool,
    pub all: bool,
    pub dry_run: bool,
    pub skip_images: bool,
    pub force: bool,
    pub verbose: bool,
    pub clear: bool,
    pub reset: bool,
    pub batch_size: Option<usize>,
}

/// Options for a seed run, after merging settings with command-line flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedConfig {
    pub entities: Entities,
    pub batch_size: usize,
    pub concurrency: usize,
    pub image_concurrency: usize,
    /// `None` disables the per-record time limit.
    pub item_timeout: Option<Duration>,
    pub dry_run: bool,
    pub skip_images: bool,
    /// Update records that already exist instead of skipping them.
    pub force: bool,
    pub verbose: bool,
    /// Delete the selected entities before seeding.
    pub clear: bool,
    /// Delete everything (including uploaded images) before seeding.
    pub reset: bool,
}
impl Default for SeedConfig {
    fn default() -> Self {
        Self::resolve(&Settings::default(), &SeedFlags::default())
    }
}

impl SeedConfig {
    /// Without any entity flag, or with `--all`, every entity is seeded.
    pub fn resolve(settings: &Settings, flags: &SeedFlags) -> Self {
        let selected: Entities = [
            (flags.users, Entity::Users),
            (flags.comics, Entity::Comics),
            (flags.chapters, Entity::Chapters),
        ]
        .into_iter()
        .filter_map(|(on, entity)| on.then_some(entity))
        .collect();
        let entities = if flags.all || selected.is_empty() { Entities::all() } else { selected };
        Self {
            entities,
            batch_size: flags.batch_size.unwrap_or(settings.batch_size).max(1),
            concurrency: settings.concurrency.max(1),
            image_concurrency: settings.image_concurrency.max(1),
            item_timeout: (settings.item_timeout_secs > 0).then(|| Duration::from_secs(settings.item_timeout_secs)),
            dry_run: flags.dry_run,
            skip_images: flags.skip_images,
            force: flags.force,
            verbose: flags.verbose,
            clear: flags.clear,
            reset: flags.reset,
        }
    }
}
