//! Live status table of a working copy.
//!
//! [`StatusSource`] gathers one recursive `svn status` report per cycle,
//! merges it into one [`StatusEntry`] per asset and keys the table by
//! [`AssetId`]. [`StatusCache`] is the scheduler running that source.

use crate::core::config::CacheConfig;
use crate::core::error::{Result, SvnCacheError};
use crate::core::identity::{split_sidecar, AssetId, AssetIdentity, PathIdentity};
use crate::core::scheduler::{DatabaseScheduler, DatabaseSource, GatherContext};
use crate::core::snapshot::SnapshotStore;
use crate::core::status_merge::{merge_statuses, StatusEntry};
use crate::core::status_parser::{Depth, StatusOptions};
use crate::core::svn::SvnClient;
use crate::core::svn_status::StatusRecord;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Merged entries of the last applied cycle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusTable {
    entries: HashMap<AssetId, StatusEntry>,
}

impl StatusTable {
    pub fn get(&self, id: &AssetId) -> Option<&StatusEntry> {
        self.entries.get(id)
    }

    pub fn insert(&mut self, entry: StatusEntry) {
        self.entries.insert(entry.id.clone(), entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries ordered by path
    pub fn sorted(&self) -> Vec<&StatusEntry> {
        let mut entries: Vec<&StatusEntry> = self.entries.values().collect();
        entries.sort_by(|a, b| a.merged.path.cmp(&b.merged.path));
        entries
    }
}

pub struct StatusSource {
    client: SvnClient,
    target: String,
    options: StatusOptions,
    identity: Arc<dyn AssetIdentity>,
}

impl StatusSource {
    pub fn new(client: SvnClient, options: StatusOptions) -> Self {
        Self {
            client,
            target: ".".to_string(),
            options,
            identity: Arc::new(PathIdentity),
        }
    }

    pub fn from_config(client: SvnClient, config: &CacheConfig) -> Self {
        Self::new(
            client,
            StatusOptions {
                depth: Depth::Infinity,
                offline: !config.online_mode,
                fetch_lock_details: config.fetch_lock_details,
            },
        )
    }

    pub fn with_identity(mut self, identity: Arc<dyn AssetIdentity>) -> Self {
        self.identity = identity;
        self
    }

    pub fn client(&self) -> &SvnClient {
        &self.client
    }

    pub fn identity(&self) -> &dyn AssetIdentity {
        self.identity.as_ref()
    }

    fn query(&self, ctx: &GatherContext) -> Result<Vec<StatusRecord>> {
        let result = self
            .client
            .get_statuses(&self.target, self.options, Some(&ctx.token));
        match result {
            Err(e @ (SvnCacheError::Connection { .. } | SvnCacheError::Authentication { .. }))
                if !self.options.offline =>
            {
                ctx.reporter.report_error(&e);
                log::warn!("Online status failed, falling back to an offline query");
                let offline = StatusOptions {
                    offline: true,
                    ..self.options
                };
                self.client
                    .get_statuses(&self.target, offline, Some(&ctx.token))
            }
            other => other,
        }
    }
}

impl DatabaseSource for StatusSource {
    type Entry = StatusEntry;
    type Table = StatusTable;

    const NAME: &'static str = "status";

    fn gather(&self, ctx: &GatherContext) -> Result<Vec<StatusEntry>> {
        let records = self.query(ctx)?;
        let entries = merge_statuses(records, self.identity.as_ref());
        log::debug!("Merged status into {} entries", entries.len());
        Ok(entries)
    }

    fn apply(&self, entries: Vec<StatusEntry>, table: &mut StatusTable) {
        for entry in entries {
            table.insert(entry);
        }
    }
}

pub type StatusCache = DatabaseScheduler<StatusSource>;

impl DatabaseScheduler<StatusSource> {
    /// Status cache of `working_copy` as configured, persisting snapshots in
    /// the working copy's cache directory
    pub fn for_working_copy(client: SvnClient, config: &CacheConfig) -> Result<Self> {
        let store = SnapshotStore::for_working_copy(client.working_copy(), StatusSource::NAME)?;
        Ok(Self::new(StatusSource::from_config(client, config))
            .with_store(store)
            .with_auto_refresh(config.auto_refresh_interval()))
    }

    /// Last known merged status of the asset `id`. Never runs a query.
    pub fn get_known_status_data(&self, id: &AssetId) -> Option<&StatusRecord> {
        self.table().get(id).map(|entry| &entry.merged)
    }

    /// Last known merged status of the asset at `path` (or of the asset a
    /// `.meta` path belongs to)
    pub fn get_known_status(&self, path: &str) -> Option<&StatusRecord> {
        let (asset_path, _) = split_sidecar(path);
        let id = self.source().identity().identity_for(asset_path);
        self.get_known_status_data(&id)
    }
}
