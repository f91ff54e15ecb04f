//! Config path resolution helpers.

use std::path::{Path, PathBuf};

use crate::error::{ExtensionError, Result};

/// File name of the repository configuration.
pub const CONFIG_FILE_NAME: &str = "repositories.toml";

/// Location of the bootstrap repository, as stored in the config.
pub const BOOTSTRAP_LOCATION: &str = "~/.tabext";

/// Per-user config directory (`<config_dir>/tabext`).
pub fn default_config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|p| p.join("tabext"))
        .or_else(|| dirs::home_dir().map(|h| h.join(".config").join("tabext")))
        .ok_or_else(|| ExtensionError::Config("could not determine config directory".to_string()))
}

pub fn config_path_in(config_dir: &Path) -> PathBuf {
    config_dir.join(CONFIG_FILE_NAME)
}
