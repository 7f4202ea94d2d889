//! Core functionality of the status cache.
//!
//! This module provides the building blocks for running `svn`, decoding and
//! merging its status reports, and keeping the result in a background-refreshed
//! table.

pub mod branch_cache;
pub mod cancel;
pub mod clients;
pub mod colors;
pub mod config;
pub mod dirs;
pub mod error;
pub mod identity;
pub mod operation;
pub mod output;
pub mod reporter;
pub mod scheduler;
pub mod shell;
pub mod snapshot;
pub mod status_cache;
pub mod status_merge;
pub mod status_parser;
pub mod svn;
pub mod svn_status;

// === Error handling ===
pub use error::{ErrorCategory, Result, SvnCacheError};

// === Status records ===
pub use svn_status::{
    FileState, LockState, PropertiesState, RemoteState, StatusRecord, TreeConflict,
};

// === Report decoding and merging ===
pub use status_merge::{merge_statuses, StatusEntry, StatusMerger};
pub use status_parser::{Depth, StatusOptions, StatusParser};

// === Process execution and background work ===
pub use cancel::{
    cancellation_pair, CancellationHandle, CancellationToken, CounterGuard, ScopedCounter,
};
pub use operation::{AsyncOperation, OperationHandle, TickControl, TickLoop};
pub use shell::{ProcessResult, Shell, ShellMonitor};
pub use svn::SvnClient;

// === Caches ===
pub use branch_cache::{BranchCache, BranchInfo, BranchSource};
pub use scheduler::{DatabaseScheduler, DatabaseSource, GatherContext, HostEnvironment};
pub use status_cache::{StatusCache, StatusSource, StatusTable};

// === Output formatting ===
pub use output::{print_error, print_info, print_section_header, print_success, print_warning};
