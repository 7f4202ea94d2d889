//! Stable identities for cached assets.
//!
//! An asset and its `.meta` sidecar are one logical entity, so the cache is keyed
//! by an [`AssetId`] derived from the asset path rather than by raw paths.

use serde::{Deserialize, Serialize};
use std::fmt;

pub const META_SUFFIX: &str = ".meta";

/// Which file of an asset a status record describes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetSide {
    Asset,
    Meta,
}

/// Stable key of a cached asset
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssetId(pub String);

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Maps asset paths to identities.
pub trait AssetIdentity: Send + Sync {
    fn identity_for(&self, asset_path: &str) -> AssetId;
}

/// Identity derived from the md5 hash of the normalized asset path. Stable
/// across refresh cycles for any asset that was not renamed.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathIdentity;

impl AssetIdentity for PathIdentity {
    fn identity_for(&self, asset_path: &str) -> AssetId {
        let normalized = asset_path.replace('\\', "/");
        let normalized = normalized.trim_end_matches('/');
        AssetId(format!("{:x}", md5::compute(normalized.as_bytes())))
    }
}

/// Split a path into the asset path it belongs to and the side it describes.
pub fn split_sidecar(path: &str) -> (&str, AssetSide) {
    match path.strip_suffix(META_SUFFIX) {
        Some(asset) if !asset.is_empty() && !asset.ends_with('/') => (asset, AssetSide::Meta),
        _ => (path, AssetSide::Asset),
    }
}

/// Parent folder of a `/`-separated path, `None` at the top level.
pub fn parent_path(path: &str) -> Option<&str> {
    let trimmed = path.trim_end_matches('/');
    trimmed
        .rfind('/')
        .map(|index| &trimmed[..index])
        .filter(|parent| !parent.is_empty())
}
