//! Merging of decoded status records into one cache entry per asset.
//!
//! An asset and its `.meta` sidecar are merged into a single [`StatusEntry`];
//! the state with the higher [`FileState::priority`] wins. Changes are then
//! propagated to every parent folder as a synthesized `Modified` (or
//! `Conflicted`) record so folders reflect what happened below them.
//!
//! # Merge rules
//! - A lower-priority record never replaces the merged state, but still
//!   backfills the lock columns and the remote state when the merged record has
//!   none.
//! - A conflicted record (content, properties or tree) forces `Conflicted`.
//! - Propagation stops at a folder that is `Added`, or as soon as a merge into
//!   a folder changes nothing.

use crate::core::identity::{parent_path, split_sidecar, AssetId, AssetIdentity, AssetSide};
use crate::core::svn_status::{FileState, LockState, RemoteState, StatusRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One cached asset: the merged status plus both contributing records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEntry {
    pub id: AssetId,
    /// Priority-resolved status exposed to consumers, keyed by the asset path
    pub merged: StatusRecord,
    pub asset: Option<StatusRecord>,
    pub meta: Option<StatusRecord>,
}

impl StatusEntry {
    pub fn new(id: AssetId, asset_path: impl Into<String>) -> Self {
        Self {
            id,
            merged: StatusRecord::new(asset_path, FileState::None),
            asset: None,
            meta: None,
        }
    }

    /// Merge `record` into the given side and into the merged status.
    /// Returns whether the merged status changed.
    pub fn merge(&mut self, record: &StatusRecord, side: AssetSide) -> bool {
        let slot = match side {
            AssetSide::Asset => &mut self.asset,
            AssetSide::Meta => &mut self.meta,
        };
        match slot {
            Some(existing) => {
                merge_record(existing, record);
            }
            None => *slot = Some(record.clone()),
        }
        merge_record(&mut self.merged, record)
    }
}

/// Priority-merge `incoming` into `target`, keeping `target`'s path.
/// Returns whether `target` changed.
pub fn merge_record(target: &mut StatusRecord, incoming: &StatusRecord) -> bool {
    let before = target.clone();

    if target.file_state == FileState::None
        || incoming.file_state.priority() > target.file_state.priority()
    {
        let path = std::mem::take(&mut target.path);
        let previous = std::mem::replace(target, incoming.clone());
        target.path = path;
        backfill(target, &previous);
    } else {
        backfill(target, incoming);
    }

    if incoming.is_conflicted() || target.is_conflicted() {
        target.file_state = FileState::Conflicted;
    }

    *target != before
}

fn backfill(target: &mut StatusRecord, source: &StatusRecord) {
    if target.lock_state == LockState::NoLock && source.lock_state != LockState::NoLock {
        target.copy_lock_from(source);
    }
    if target.remote_state == RemoteState::None && source.remote_state != RemoteState::None {
        target.remote_state = source.remote_state;
    }
}

/// Builds the merged entry table of one refresh cycle
pub struct StatusMerger<'a> {
    identity: &'a dyn AssetIdentity,
    entries: HashMap<AssetId, StatusEntry>,
}

impl<'a> StatusMerger<'a> {
    pub fn new(identity: &'a dyn AssetIdentity) -> Self {
        Self {
            identity,
            entries: HashMap::new(),
        }
    }

    /// Merge one record into the entry of the asset it belongs to
    pub fn add(&mut self, record: StatusRecord) -> bool {
        if !record.is_valid() {
            return false;
        }
        let (asset_path, side) = split_sidecar(&record.path);
        let id = self.identity.identity_for(asset_path);
        let entry = self
            .entries
            .entry(id.clone())
            .or_insert_with(|| StatusEntry::new(id, asset_path));
        entry.merge(&record, side)
    }

    /// Mark the parent folders of every changed entry as modified
    pub fn propagate_to_parents(&mut self) {
        let mut changed: Vec<(String, bool)> = self
            .entries
            .values()
            .filter(|entry| entry.merged.file_state.propagates_to_parents())
            .map(|entry| (entry.merged.path.clone(), entry.merged.is_conflicted()))
            .collect();
        // Deterministic walk order keeps the stop condition reproducible
        changed.sort();

        for (path, conflicted) in changed {
            self.propagate_from(&path, conflicted);
        }
    }

    fn propagate_from(&mut self, path: &str, conflicted: bool) {
        let state = if conflicted {
            FileState::Conflicted
        } else {
            FileState::Modified
        };

        let mut current = parent_path(path);
        while let Some(folder) = current {
            let id = self.identity.identity_for(folder);
            if let Some(existing) = self.entries.get(&id) {
                if existing.merged.file_state == FileState::Added {
                    break;
                }
            }

            let record = StatusRecord {
                lock_state: LockState::NoLock,
                ..StatusRecord::new(folder, state)
            };
            let entry = self
                .entries
                .entry(id.clone())
                .or_insert_with(|| StatusEntry::new(id, folder));
            // Synthesized, so no raw side receives it
            if !merge_record(&mut entry.merged, &record) {
                break;
            }
            current = parent_path(folder);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Propagate and return all entries ordered by path
    pub fn finish(mut self) -> Vec<StatusEntry> {
        self.propagate_to_parents();
        let mut entries: Vec<StatusEntry> = self.entries.into_values().collect();
        entries.sort_by(|a, b| a.merged.path.cmp(&b.merged.path));
        entries
    }
}

/// Merge a flat record stream into one entry per asset, parents included
pub fn merge_statuses<I>(records: I, identity: &dyn AssetIdentity) -> Vec<StatusEntry>
where
    I: IntoIterator<Item = StatusRecord>,
{
    let mut merger = StatusMerger::new(identity);
    for record in records {
        merger.add(record);
    }
    merger.finish()
}
