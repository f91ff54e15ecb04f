//! Per-extension manifest written next to the installed files.

use std::fs;
use std::path::Path;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ExtensionError, IoResultExt, Result};
use crate::types::INSTALL_TIME_FORMAT;

pub const MANIFEST_FILE: &str = "__manifest__.toml";

/// Install metadata of one extension, stored as `__manifest__.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Entry point as `<file>::<function>`.
    pub entry: String,
    /// Matched source file, relative to the module directory.
    pub extension_file: String,
    pub extension_name: String,
    pub enabled: bool,
    /// Spec line the extension was installed from (`location -> name`).
    pub install_location: String,
    pub install_collection: String,
    pub install_repository: String,
    /// Digest of the installed files.
    pub install_files: String,
    pub install_time: String,
}

impl Manifest {
    pub fn entry_for(file: &str, name: &str) -> String {
        format!("{}::{}", file, name)
    }

    pub fn read(module_dir: &Path) -> Result<Self> {
        let path = module_dir.join(MANIFEST_FILE);
        let content = fs::read_to_string(&path).at_path(&path)?;
        let manifest: Manifest = toml::from_str(&content).map_err(|e| ExtensionError::Manifest {
            path: path.clone(),
            message: e.to_string(),
        })?;
        parse_time(&manifest.install_time).map_err(|_| ExtensionError::Manifest {
            path,
            message: format!("invalid install_time '{}'", manifest.install_time),
        })?;
        Ok(manifest)
    }

    /// Write the manifest, replacing any previous one.
    pub fn write(&self, module_dir: &Path) -> Result<()> {
        let path = module_dir.join(MANIFEST_FILE);
        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content).at_path(&path)
    }

    pub fn installed_at(&self) -> Result<DateTime<Utc>> {
        parse_time(&self.install_time)
    }

    /// Whether this extension was installed strictly before `timestamp`.
    pub fn is_earlier_than(&self, timestamp: &str) -> Result<bool> {
        Ok(self.installed_at()? < parse_time(timestamp)?)
    }
}

pub fn format_time(time: DateTime<Utc>) -> String {
    time.format(INSTALL_TIME_FORMAT).to_string()
}

pub fn parse_time(text: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(text, INSTALL_TIME_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|_| ExtensionError::InvalidTimestamp(text.to_string()))
}

/// Current time in the manifest format.
pub fn now() -> String {
    format_time(Utc::now())
}
