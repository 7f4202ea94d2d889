//! SVN Status Cache - a background-refreshed, queryable cache of Subversion
//! working copy status.
//!
//! The cache runs `svn status` off the consumer thread, decodes the report,
//! merges every asset with its `.meta` sidecar, propagates changes to parent
//! folders and publishes the result to a single-threaded consumer.
//!
//! # Public API
//! The main public interface is re-exported from the [`core`] module:
//! - Status records, the report parser and the merge engine
//! - The generic refresh scheduler and the status and branch caches built on it
//! - Process execution, async operations and cancellation
//! - Error handling and result types

pub mod commands;
pub mod core;

pub use core::{
    // Caches
    BranchCache,
    DatabaseScheduler,
    DatabaseSource,
    // Records and decoding
    Depth,
    FileState,
    StatusCache,
    StatusEntry,
    StatusOptions,
    StatusParser,
    StatusRecord,
    // Error handling
    Result,
    SvnCacheError,
    // Running svn
    SvnClient,
    TickLoop,
};
