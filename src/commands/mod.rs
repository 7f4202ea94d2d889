pub mod branches;
pub mod open;
pub mod parse;
pub mod status;
pub mod watch;

pub use branches::*;
pub use open::*;
pub use parse::*;
pub use status::*;
pub use watch::*;

use crate::core::config::CacheConfig;
use crate::core::print_warning;

/// The user configuration, or defaults when it cannot be read
pub(crate) fn load_config() -> CacheConfig {
    match CacheConfig::load_or_create() {
        Ok(config) => config,
        Err(e) => {
            log::warn!("Using default configuration: {e}");
            print_warning(&format!("Could not load configuration, using defaults ({e})"));
            CacheConfig::default()
        }
    }
}
