use crate::core::clients::ClientKind;
use crate::core::dirs::get_config_directory;
use crate::core::error::SvnCacheError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct BranchesConfig {
    /// How many folder levels below the repository root are searched
    pub max_depth: usize,
    /// Repository-relative folders that are never listed
    pub excludes: Vec<String>,
}

impl Default for BranchesConfig {
    fn default() -> Self {
        Self {
            max_depth: 3,
            excludes: Vec::new(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    /// Explicit path to the svn executable. `None` uses `svn` from PATH.
    pub svn_cli_path: Option<PathBuf>,
    /// Seconds between automatic refreshes. Zero or negative disables them.
    pub auto_refresh_interval_secs: i64,
    pub online_mode: bool,
    pub fetch_lock_details: bool,
    pub local_timeout_ms: u64,
    pub online_timeout_ms: u64,
    pub client: ClientKind,
    pub branches: BranchesConfig,
    pub last_refreshed: Option<chrono::DateTime<chrono::Utc>>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            svn_cli_path: None,
            auto_refresh_interval_secs: 30,
            online_mode: false,
            fetch_lock_details: false,
            local_timeout_ms: 15_000,
            online_timeout_ms: 60_000,
            client: ClientKind::default(),
            branches: BranchesConfig::default(),
            last_refreshed: None,
        }
    }
}

impl CacheConfig {
    pub fn load_or_create() -> Result<Self, SvnCacheError> {
        let config_file = get_config_directory()?.join("config.json");
        if config_file.exists() {
            Self::load_from(&config_file)
        } else {
            let config = Self::default();
            config.save_to(&config_file)?;
            Ok(config)
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, SvnCacheError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self) -> Result<(), SvnCacheError> {
        self.save_to(&get_config_directory()?.join("config.json"))
    }

    pub fn save_to(&self, path: &Path) -> Result<(), SvnCacheError> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .map_err(|e| SvnCacheError::directory_creation_failed(dir, e))?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn auto_refresh_interval(&self) -> Option<Duration> {
        u64::try_from(self.auto_refresh_interval_secs)
            .ok()
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    pub fn local_timeout(&self) -> Duration {
        Duration::from_millis(self.local_timeout_ms)
    }

    pub fn online_timeout(&self) -> Duration {
        Duration::from_millis(self.online_timeout_ms)
    }

    pub fn mark_refreshed(&mut self) {
        self.last_refreshed = Some(chrono::Utc::now());
    }
}
