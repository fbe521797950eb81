//! Scratch directory for extractor output
//!
//! Each request downloads into its own [`Workspace`] under the shared scratch
//! directory. Dropping the workspace hands it to a single background
//! [`CleanupScheduler`], which removes it once the delay has elapsed, so
//! partial files from failed or abandoned downloads go the same way as
//! delivered ones. Removal is best-effort: see [`remove_quietly`].
//!
//! ## Usage
//!
//! ```rust,ignore
//! let store = TempStore::open("/tmp/vidgate", Duration::from_secs(20), metrics).await?;
//! let workspace = store.workspace("req-1").await?;
//! let template = workspace.output_template(); // /tmp/vidgate/req-1/%(id)s.%(ext)s
//! // ... extractor writes /tmp/vidgate/req-1/abc123.mp4 ...
//! drop(workspace); // removed 20s from now
//! ```

mod cleanup;

pub use cleanup::{CleanupOutcome, CleanupScheduler, remove_quietly};

use chrono::{DateTime, Utc};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use crate::observability::Metrics;

/// yt-dlp output template: one file per media id
pub const OUTPUT_TEMPLATE: &str = "%(id)s.%(ext)s";

#[derive(Debug, Error)]
pub enum ScratchError {
    #[error("failed to prepare scratch directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to scan scratch directory {path}: {source}")]
    Scan {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub type Result<T> = std::result::Result<T, ScratchError>;

/// A scratch entry waiting for removal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TempArtifact {
    pub path: PathBuf,
    pub created_at: DateTime<Utc>,
}

/// Owner of the scratch directory and its cleanup schedule
pub struct TempStore {
    dir: PathBuf,
    cleanup_delay: Duration,
    scheduler: CleanupScheduler,
}

impl TempStore {
    /// Create the directory (idempotent) and start the cleanup scheduler
    ///
    /// Must be called from within a Tokio runtime.
    pub async fn open(
        dir: impl Into<PathBuf>,
        cleanup_delay: Duration,
        metrics: Arc<Metrics>,
    ) -> Result<Self> {
        let dir = dir.into();

        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| ScratchError::CreateDir {
                path: dir.clone(),
                source,
            })?;

        info!(path = %dir.display(), delay_secs = cleanup_delay.as_secs(), "Scratch directory ready");

        Ok(Self {
            dir,
            cleanup_delay,
            scheduler: CleanupScheduler::spawn(metrics),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create a fresh per-request directory named `name`
    pub async fn workspace(&self, name: &str) -> Result<Workspace<'_>> {
        let dir = self.dir.join(name);
        tokio::fs::create_dir(&dir)
            .await
            .map_err(|source| ScratchError::CreateDir {
                path: dir.clone(),
                source,
            })?;

        Ok(Workspace { store: self, dir })
    }

    /// Schedule removal of `path` after the configured delay
    pub fn register(&self, path: PathBuf) -> TempArtifact {
        self.schedule_removal(path, self.cleanup_delay)
    }

    /// Schedule removal of `path` after `delay`. Never blocks.
    pub fn schedule_removal(&self, path: PathBuf, delay: Duration) -> TempArtifact {
        let artifact = TempArtifact {
            path,
            created_at: Utc::now(),
        };
        debug!(path = %artifact.path.display(), delay_ms = delay.as_millis() as u64, "Scheduling removal");
        self.scheduler.schedule(artifact.clone(), delay);
        artifact
    }

    /// Number of artifacts waiting for their delay to elapse
    pub fn pending(&self) -> usize {
        self.scheduler.pending()
    }

    /// Remove files and workspaces left behind by a previous process
    ///
    /// Returns the number of entries removed. Individual failures follow the
    /// same swallow-and-log contract as scheduled removals.
    pub async fn purge_stale(&self) -> Result<usize> {
        let scan_err = |source| ScratchError::Scan {
            path: self.dir.clone(),
            source,
        };

        let mut entries = tokio::fs::read_dir(&self.dir).await.map_err(scan_err)?;
        let mut removed = 0;

        while let Some(entry) = entries.next_entry().await.map_err(scan_err)? {
            if remove_quietly(&entry.path()).await == CleanupOutcome::Removed {
                removed += 1;
            }
        }

        if removed > 0 {
            info!(removed, path = %self.dir.display(), "Purged stale scratch files");
        }

        Ok(removed)
    }

    /// Stop the scheduler, removing everything still pending
    pub async fn shutdown(&self) {
        self.scheduler.shutdown().await;
    }
}

/// Output directory owned by one download
///
/// Scheduled for removal after the store's cleanup delay when dropped,
/// whichever way the download ended.
pub struct Workspace<'a> {
    store: &'a TempStore,
    dir: PathBuf,
}

impl Workspace<'_> {
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Output path template handed to the extractor
    pub fn output_template(&self) -> PathBuf {
        self.dir.join(OUTPUT_TEMPLATE)
    }
}

impl Drop for Workspace<'_> {
    fn drop(&mut self) {
        self.store.register(std::mem::take(&mut self.dir));
    }
}
