//! Progress file for external pollers.
//!
//! Updates arrive from [`BatchProcessor`](tankobon_asyncutils::BatchProcessor)
//! hooks, which are not async, so they only publish a snapshot. A task on the
//! runtime writes the newest snapshot with `tokio::fs`; snapshots published
//! while a write is in flight collapse into one. Each write goes to a sibling
//! temporary file that is then renamed over the target, so readers never see
//! a half-written document.

use derive_more::Display;
use exn::ResultExt;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock, PoisonError};
use tankobon_config::Entity;
use tokio::runtime::Handle;
use tokio::sync::watch;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::error::{ErrorKind, Result};
use crate::stats::EntityStats;

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Step {
    #[display("starting")]
    Starting,
    #[display("clearing")]
    Clearing,
    #[display("users")]
    Users,
    #[display("comics")]
    Comics,
    #[display("chapters")]
    Chapters,
    #[display("complete")]
    Complete,
    #[display("failed")]
    Failed,
}
impl From<Entity> for Step {
    fn from(entity: Entity) -> Self {
        match entity {
            Entity::Users => Self::Users,
            Entity::Comics => Self::Comics,
            Entity::Chapters => Self::Chapters,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct Status {
    step: Step,
    #[serde(skip_serializing_if = "Option::is_none")]
    users: Option<EntityStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    comics: Option<EntityStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    chapters: Option<EntityStats>,
    updated_at: String,
    #[serde(skip)]
    version: u64,
}

#[derive(Debug, Clone, Default)]
struct Snapshot {
    version: u64,
    json: Vec<u8>,
}

#[derive(Debug)]
struct Writer {
    snapshots: watch::Sender<Snapshot>,
    /// Version of the last snapshot the task finished with.
    written: watch::Receiver<u64>,
}

/// The status document and where it lives. Without a path, updates are kept
/// in memory only.
#[derive(Debug)]
pub struct StatusFile {
    path: Option<PathBuf>,
    status: Mutex<Status>,
    writer: OnceLock<Writer>,
}

impl StatusFile {
    pub fn new(path: impl Into<Option<PathBuf>>) -> Self {
        Self {
            path: path.into(),
            status: Mutex::new(Status {
                step: Step::Starting,
                users: None,
                comics: None,
                chapters: None,
                updated_at: String::new(),
                version: 0,
            }),
            writer: OnceLock::new(),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Move to a new step and persist.
    pub fn step(&self, step: Step) -> Result<()> {
        self.update(|status| status.step = step)
    }

    /// Replace the stats of one entity and persist.
    pub fn progress(&self, entity: Entity, stats: EntityStats) -> Result<()> {
        self.update(|status| {
            let slot = match entity {
                Entity::Users => &mut status.users,
                Entity::Comics => &mut status.comics,
                Entity::Chapters => &mut status.chapters,
            };
            *slot = Some(stats);
        })
    }

    /// Wait until the newest snapshot has been written. Write failures are
    /// logged by the writer task, not returned here.
    pub async fn flush(&self) {
        let Some(writer) = self.writer.get() else {
            return;
        };
        let target = writer.snapshots.borrow().version;
        let mut written = writer.written.clone();
        _ = written.wait_for(|version| *version >= target).await;
    }

    /// Remove the file from disk, if it exists.
    pub async fn remove(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        self.flush().await;
        match tokio::fs::remove_file(path).await {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e).or_raise(|| ErrorKind::Status),
            _ => Ok(()),
        }
    }

    fn update(&self, change: impl FnOnce(&mut Status)) -> Result<()> {
        let snapshot = {
            let mut status = self.status.lock().unwrap_or_else(PoisonError::into_inner);
            change(&mut status);
            status.updated_at = OffsetDateTime::now_utc().format(&Rfc3339).or_raise(|| ErrorKind::Status)?;
            status.version += 1;
            Snapshot {
                version: status.version,
                json: serde_json::to_vec_pretty(&*status).or_raise(|| ErrorKind::Status)?,
            }
        };
        let Some(path) = &self.path else {
            return Ok(());
        };
        let writer = self.writer(path)?;
        // Hooks on different tasks may publish out of order.
        writer.snapshots.send_if_modified(|current| {
            let newer = snapshot.version > current.version;
            if newer {
                *current = snapshot;
            }
            newer
        });
        Ok(())
    }

    fn writer(&self, path: &Path) -> Result<&Writer> {
        if let Some(writer) = self.writer.get() {
            return Ok(writer);
        }
        let handle = Handle::try_current().or_raise(|| ErrorKind::Status)?;
        Ok(self.writer.get_or_init(|| {
            let (snapshots, pending) = watch::channel(Snapshot::default());
            let (done, written) = watch::channel(0);
            handle.spawn(write_snapshots(path.to_path_buf(), pending, done));
            Writer { snapshots, written }
        }))
    }
}

async fn write_snapshots(path: PathBuf, mut pending: watch::Receiver<Snapshot>, done: watch::Sender<u64>) {
    while pending.changed().await.is_ok() {
        let snapshot = pending.borrow_and_update().clone();
        if let Err(error) = write_atomic(&path, &snapshot.json).await {
            tracing::warn!(path = %path.display(), "Could not write status file: {error:?}");
        }
        done.send_replace(snapshot.version);
    }
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await.or_raise(|| ErrorKind::Status)?;
    }
    let mut temporary = path.as_os_str().to_owned();
    temporary.push(".tmp");
    let temporary = PathBuf::from(temporary);
    tokio::fs::write(&temporary, bytes).await.or_raise(|| ErrorKind::Status)?;
    tokio::fs::rename(&temporary, path).await.or_raise(|| ErrorKind::Status)
}
