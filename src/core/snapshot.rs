//! Persisted cache state for warm restarts.
//!
//! A [`Snapshot`] carries the durable "pending update" flag together with the
//! last applied table, so a process that restarts in the middle of a refresh
//! cycle knows to start a new one instead of trusting the stored table.
//!
//! # Public API
//! - [`Snapshot`]: Serializable table plus pending flag and refresh time
//! - [`SnapshotStore`]: JSON file storage for one cache of one working copy
//!
//! # Storage
//! - **JSON serialization**: Human-readable snapshot files for debugging
//! - **Working copy isolation**: One directory per working copy path hash

use crate::core::dirs::get_working_copy_cache_directory;
use crate::core::error::{Result, SvnCacheError};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot<T> {
    /// A refresh cycle was running when this snapshot was written
    pub pending_update: bool,
    pub last_refreshed: Option<DateTime<Utc>>,
    pub table: T,
}

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    /// Store at an explicit file path
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store named `name` in the cache directory of `working_copy`
    pub fn for_working_copy(working_copy: &Path, name: &str) -> Result<Self> {
        let dir = get_working_copy_cache_directory(working_copy)?;
        Ok(Self::at(dir.join(format!("{name}.json"))))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn save<T: Serialize>(&self, snapshot: &Snapshot<T>) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).map_err(|e| {
                log::error!("Failed to create snapshot directory '{}': {}", dir.display(), e);
                SvnCacheError::directory_creation_failed(dir, e)
            })?;
        }

        // The target is only ever replaced by a complete file
        let json = serde_json::to_string_pretty(snapshot)?;
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, json)
            .and_then(|_| fs::rename(&staging, &self.path))
            .map_err(|e| {
                log::error!("Failed to write snapshot '{}': {}", self.path.display(), e);
                SvnCacheError::snapshot_write_failed(&self.path, e)
            })?;

        log::debug!(
            "Saved snapshot '{}' (pending_update = {})",
            self.path.display(),
            snapshot.pending_update
        );
        Ok(())
    }

    /// Load the snapshot, `Ok(None)` when none was written yet
    pub fn load<T: DeserializeOwned>(&self) -> Result<Option<Snapshot<T>>> {
        if !self.path.exists() {
            log::debug!("Snapshot does not exist: {}", self.path.display());
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path)
            .map_err(|e| SvnCacheError::snapshot_read_failed(&self.path, e))?;
        let snapshot = serde_json::from_str(&content).map_err(|e| {
            log::error!("Failed to parse snapshot '{}': {}", self.path.display(), e);
            SvnCacheError::snapshot_parse_failed(&self.path, e)
        })?;
        Ok(Some(snapshot))
    }

    pub fn remove(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}
