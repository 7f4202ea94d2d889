use crate::core::error::SvnCacheError;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "svn-status-cache";

pub fn get_config_directory() -> Result<PathBuf, SvnCacheError> {
    let base = match std::env::consts::OS {
        "linux" | "freebsd" | "netbsd" | "openbsd" => std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| dirs::home_dir().unwrap_or_default().join(".config")),
        "macos" => dirs::home_dir()
            .unwrap_or_default()
            .join("Library/Application Support"),
        _ => dirs::config_dir().ok_or(SvnCacheError::CacheDirectoryNotFound)?,
    };

    Ok(base.join(APP_DIR))
}

pub fn get_cache_directory() -> Result<PathBuf, SvnCacheError> {
    let base = match std::env::consts::OS {
        "linux" | "freebsd" | "netbsd" | "openbsd" => std::env::var("XDG_CACHE_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| dirs::home_dir().unwrap_or_default().join(".cache")),
        "macos" => dirs::home_dir().unwrap_or_default().join("Library/Caches"),
        _ => dirs::cache_dir().ok_or(SvnCacheError::CacheDirectoryNotFound)?,
    };

    Ok(base.join(APP_DIR))
}

/// Snapshot directory of one working copy, keyed by the hash of its path
pub fn get_working_copy_cache_directory(working_copy: &Path) -> Result<PathBuf, SvnCacheError> {
    let wc_hash = format!("{:x}", md5::compute(working_copy.to_string_lossy().as_bytes()));
    log::debug!(
        "get_working_copy_cache_directory: working_copy = {working_copy:?}, hash = {wc_hash}"
    );
    Ok(get_cache_directory()?.join(wc_hash))
}
