//! Shared test utilities for svn-status-cache
//!
//! Integration tests never need a real Subversion installation: captured
//! reports live in [`fixtures`], and [`working_copy`] installs a scripted fake
//! `svn` executable that replays them.

pub mod assertions;
pub mod fixtures;
pub mod working_copy;
