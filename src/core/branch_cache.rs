//! Branches, tags and trunks of the repository a working copy belongs to.
//!
//! The repository is walked breadth-first with `svn list` from its root. A
//! `trunk` folder is a trunk; the children of a `branches` or `tags` folder are
//! branches or tags. Every other folder is descended into until the configured
//! depth is reached.

use crate::core::config::BranchesConfig;
use crate::core::error::{Result, SvnCacheError};
use crate::core::scheduler::{DatabaseScheduler, DatabaseSource, GatherContext};
use crate::core::svn::SvnClient;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BranchKind {
    Trunk,
    Branch,
    Tag,
}

impl fmt::Display for BranchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BranchKind::Trunk => "trunk",
            BranchKind::Branch => "branch",
            BranchKind::Tag => "tag",
        };
        f.pad(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchInfo {
    /// Repository-relative folder holding the trunk/branches/tags layout
    pub project: String,
    pub name: String,
    pub url: String,
    pub kind: BranchKind,
    /// The working copy is checked out from this branch
    pub is_current: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BranchTable {
    pub branches: Vec<BranchInfo>,
}

impl BranchTable {
    pub fn current(&self) -> Option<&BranchInfo> {
        self.branches.iter().find(|branch| branch.is_current)
    }
}

pub struct BranchSource {
    client: SvnClient,
    config: BranchesConfig,
}

impl BranchSource {
    pub fn new(client: SvnClient, config: BranchesConfig) -> Self {
        Self { client, config }
    }
}

impl DatabaseSource for BranchSource {
    type Entry = BranchInfo;
    type Table = BranchTable;

    const NAME: &'static str = "branches";

    fn gather(&self, ctx: &GatherContext) -> Result<Vec<BranchInfo>> {
        let root_url = self.client.info_item("repos-root-url", ".")?;
        let wc_url = self.client.info_item("url", ".")?;
        log::debug!("Walking branches of {root_url} (working copy at {wc_url})");

        walk_branches(&root_url, &wc_url, &self.config, |url| {
            if ctx.token.is_cancelled() {
                return Err(SvnCacheError::aborted(format!("svn list {url}")));
            }
            self.client.list(url, Some(&ctx.token))
        })
    }

    fn apply(&self, entries: Vec<BranchInfo>, table: &mut BranchTable) {
        table.branches = entries;
    }
}

pub type BranchCache = DatabaseScheduler<BranchSource>;

/// Breadth-first search for branch folders below `root_url`. `list` returns
/// the entries of a folder URL, folders ending in `/`.
pub fn walk_branches<F>(
    root_url: &str,
    wc_url: &str,
    config: &BranchesConfig,
    mut list: F,
) -> Result<Vec<BranchInfo>>
where
    F: FnMut(&str) -> Result<Vec<String>>,
{
    let root_url = root_url.trim_end_matches('/');
    let mut found = Vec::new();
    let mut queue = VecDeque::from([(String::new(), 0usize)]);

    while let Some((folder, depth)) = queue.pop_front() {
        let folder_url = join_url(root_url, &folder);
        for child in subfolders(list(&folder_url)?) {
            let relative = join_path(&folder, &child);
            if config.excludes.iter().any(|exclude| exclude.trim_matches('/') == relative) {
                log::debug!("Skipping excluded folder {relative}");
                continue;
            }

            let url = join_url(root_url, &relative);
            match child.as_str() {
                "trunk" => found.push(branch(&folder, &child, url, BranchKind::Trunk, wc_url)),
                "branches" | "tags" => {
                    let kind = if child == "tags" {
                        BranchKind::Tag
                    } else {
                        BranchKind::Branch
                    };
                    for name in subfolders(list(&url)?) {
                        let branch_url = join_url(&url, &name);
                        found.push(branch(&folder, &name, branch_url, kind, wc_url));
                    }
                }
                _ if depth + 1 < config.max_depth => queue.push_back((relative, depth + 1)),
                _ => {}
            }
        }
    }

    Ok(found)
}

fn branch(project: &str, name: &str, url: String, kind: BranchKind, wc_url: &str) -> BranchInfo {
    let is_current = wc_url == url || wc_url.starts_with(&format!("{url}/"));
    BranchInfo {
        project: project.to_string(),
        name: name.to_string(),
        url,
        kind,
        is_current,
    }
}

fn subfolders(entries: Vec<String>) -> impl Iterator<Item = String> {
    entries
        .into_iter()
        .filter_map(|entry| entry.strip_suffix('/').map(str::to_string))
}

fn join_path(parent: &str, child: &str) -> String {
    if parent.is_empty() {
        child.to_string()
    } else {
        format!("{parent}/{child}")
    }
}

fn join_url(base: &str, relative: &str) -> String {
    if relative.is_empty() {
        base.to_string()
    } else {
        format!("{}/{relative}", base.trim_end_matches('/'))
    }
}
