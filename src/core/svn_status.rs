//! Type-safe Subversion status enumerations and the decoded status record.
//!
//! This module defines [`StatusRecord`], one decoded line of `svn status`, and the
//! small enums for each of its status columns. Every enum knows the single-character
//! code `svn` prints for it, so the parser never compares raw strings.
//!
//! # Public API
//! - [`FileState`]: Content state of a path (column 0)
//! - [`PropertiesState`]: Properties state (column 1)
//! - [`LockState`]: Lock state (column 5)
//! - [`TreeConflict`]: Tree conflict marker (column 6)
//! - [`RemoteState`]: Out-of-date marker (online queries only)
//! - [`StatusRecord`]: One decoded status line
//!
//! # Key Features
//! - **Merge priority**: [`FileState::priority`] drives asset/meta merging and
//!   ancestor propagation
//! - **Conflict detection**: [`StatusRecord::is_conflicted`] folds the three
//!   conflict channels into one predicate
//! - **Serde support**: records are persisted as part of cache snapshots

use serde::{Deserialize, Serialize};
use std::fmt;

/// Content state of a versioned or unversioned path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FileState {
    /// No changes (' ')
    Normal,
    /// Scheduled for addition (A)
    Added,
    /// Content conflict (C)
    Conflicted,
    /// Scheduled for deletion (D)
    Deleted,
    /// Ignored (I)
    Ignored,
    /// Modified (M)
    Modified,
    /// Replaced (R)
    Replaced,
    /// Not under version control (?)
    Unversioned,
    /// Versioned but missing on disk (!)
    Missing,
    /// Unversioned directory created by an externals definition (X)
    External,
    /// Obstructed by an item of a different kind (~)
    Obstructed,
    /// No entry found. Never persisted.
    #[default]
    None,
}

impl FileState {
    /// Decode the column 0 status character
    pub fn from_code(code: char) -> Option<FileState> {
        match code {
            ' ' => Some(FileState::Normal),
            'A' => Some(FileState::Added),
            'C' => Some(FileState::Conflicted),
            'D' => Some(FileState::Deleted),
            'I' => Some(FileState::Ignored),
            'M' => Some(FileState::Modified),
            'R' => Some(FileState::Replaced),
            '?' => Some(FileState::Unversioned),
            '!' => Some(FileState::Missing),
            'X' => Some(FileState::External),
            '~' => Some(FileState::Obstructed),
            _ => None,
        }
    }

    /// The character `svn status` prints for this state
    pub fn as_code(&self) -> char {
        match self {
            FileState::Normal | FileState::None => ' ',
            FileState::Added => 'A',
            FileState::Conflicted => 'C',
            FileState::Deleted => 'D',
            FileState::Ignored => 'I',
            FileState::Modified => 'M',
            FileState::Replaced => 'R',
            FileState::Unversioned => '?',
            FileState::Missing => '!',
            FileState::External => 'X',
            FileState::Obstructed => '~',
        }
    }

    /// Merge priority. When two records describe the same asset, or a change is
    /// propagated to a parent folder, the state with the higher priority wins.
    pub fn priority(&self) -> u8 {
        match self {
            FileState::Conflicted | FileState::Obstructed => 10,
            FileState::Modified => 8,
            FileState::Added | FileState::Deleted | FileState::Missing => 6,
            FileState::Replaced => 5,
            FileState::Ignored => 3,
            FileState::Unversioned => 1,
            FileState::Normal | FileState::External | FileState::None => 0,
        }
    }

    /// Whether a change in this state should mark parent folders as modified
    pub fn propagates_to_parents(&self) -> bool {
        !matches!(
            self,
            FileState::Normal | FileState::Unversioned | FileState::Ignored | FileState::None
        )
    }

    /// Get human-readable description for status
    pub fn description(&self) -> &'static str {
        match self {
            FileState::Normal => "normal",
            FileState::Added => "added",
            FileState::Conflicted => "conflicted",
            FileState::Deleted => "deleted",
            FileState::Ignored => "ignored",
            FileState::Modified => "modified",
            FileState::Replaced => "replaced",
            FileState::Unversioned => "unversioned",
            FileState::Missing => "missing",
            FileState::External => "external",
            FileState::Obstructed => "obstructed",
            FileState::None => "none",
        }
    }
}

impl fmt::Display for FileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_code())
    }
}

/// Properties state, independent of the file content state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PropertiesState {
    #[default]
    Normal,
    Conflicted,
    Modified,
}

impl PropertiesState {
    /// Decode the column 1 status character
    pub fn from_code(code: char) -> Option<PropertiesState> {
        match code {
            ' ' => Some(PropertiesState::Normal),
            'C' => Some(PropertiesState::Conflicted),
            'M' => Some(PropertiesState::Modified),
            _ => None,
        }
    }
}

/// Tree conflict marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TreeConflict {
    #[default]
    Normal,
    Conflict,
}

impl TreeConflict {
    /// Decode the column 6 status character
    pub fn from_code(code: char) -> Option<TreeConflict> {
        match code {
            ' ' => Some(TreeConflict::Normal),
            'C' => Some(TreeConflict::Conflict),
            _ => None,
        }
    }
}

/// Lock state of a path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LockState {
    #[default]
    NoLock,
    /// Locked by this working copy (K)
    LockedHere,
    /// Locked by somebody else (O)
    LockedByOther,
    /// Our lock was stolen (T)
    LockedButStolen,
    /// Our lock was broken (B)
    BrokenLock,
}

impl LockState {
    /// Decode the column 5 status character
    pub fn from_code(code: char) -> Option<LockState> {
        match code {
            ' ' => Some(LockState::NoLock),
            'K' => Some(LockState::LockedHere),
            'O' => Some(LockState::LockedByOther),
            'T' => Some(LockState::LockedButStolen),
            'B' => Some(LockState::BrokenLock),
            _ => None,
        }
    }

    /// Whether a lock owner can still be looked up for this state
    pub fn has_resolvable_lock(&self) -> bool {
        matches!(
            self,
            LockState::LockedHere | LockState::LockedByOther | LockState::LockedButStolen
        )
    }
}

/// Out-of-date marker, populated only by online queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RemoteState {
    #[default]
    None,
    ModifiedOnServer,
}

/// One decoded line of an `svn status` report
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatusRecord {
    /// Working-copy relative path with `/` separators
    pub path: String,
    pub file_state: FileState,
    pub properties_state: PropertiesState,
    pub tree_conflict: TreeConflict,
    pub lock_state: LockState,
    pub remote_state: RemoteState,
    /// Working revision, online queries only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_date: Option<String>,
}

impl StatusRecord {
    /// A record in the given state with every other column at its default
    pub fn new(path: impl Into<String>, file_state: FileState) -> Self {
        Self {
            path: path.into(),
            file_state,
            ..Default::default()
        }
    }

    /// A record reporting no changes for `path`
    pub fn normal(path: impl Into<String>) -> Self {
        Self::new(path, FileState::Normal)
    }

    /// True when any of the content, properties or tree channels is conflicted
    pub fn is_conflicted(&self) -> bool {
        self.file_state == FileState::Conflicted
            || self.properties_state == PropertiesState::Conflicted
            || self.tree_conflict == TreeConflict::Conflict
    }

    pub fn is_valid(&self) -> bool {
        !self.path.is_empty()
    }

    /// Copy the lock columns (state, owner, message, date) from `other`
    pub fn copy_lock_from(&mut self, other: &StatusRecord) {
        self.lock_state = other.lock_state;
        self.lock_owner = other.lock_owner.clone();
        self.lock_message = other.lock_message.clone();
        self.lock_date = other.lock_date.clone();
    }
}
