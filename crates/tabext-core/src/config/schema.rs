//! Configuration schema for repositories.toml
//!
//! ```toml
//! default_repository = "user"
//!
//! [[repositories]]
//! name = "user"
//! location = "~/.tabext"
//!
//! [[repositories]]
//! name = "shared"
//! location = "/opt/data/.tabext"
//! ```
//!
//! The order of `[[repositories]]` tables is the search order.

use std::collections::HashSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{ExtensionError, Result};

/// Name of the repository synthesized when no config exists yet.
pub const BOOTSTRAP_REPOSITORY: &str = "user";

/// Root configuration structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoriesConfig {
    /// Install target when no repository is named
    pub default_repository: String,

    /// Repositories in search order
    #[serde(default)]
    pub repositories: Vec<RepositoryEntry>,
}

/// A named, searchable location on the filesystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryEntry {
    pub name: String,
    /// Location as entered by the user (may start with `~/`)
    pub location: String,
}

impl RepositoryEntry {
    pub fn new(name: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location: location.into(),
        }
    }

    /// Location with a leading `~/` expanded to the home directory.
    pub fn path(&self) -> PathBuf {
        expand_home(&self.location)
    }
}

impl RepositoriesConfig {
    /// Single-repository config used on first run.
    pub fn bootstrap(location: impl Into<String>) -> Self {
        Self {
            default_repository: BOOTSTRAP_REPOSITORY.to_string(),
            repositories: vec![RepositoryEntry::new(BOOTSTRAP_REPOSITORY, location)],
        }
    }

    /// Repository names in search order.
    pub fn search_order(&self) -> Vec<String> {
        self.repositories.iter().map(|r| r.name.clone()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&RepositoryEntry> {
        self.repositories.iter().find(|r| r.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Validate names and the default repository.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for repo in &self.repositories {
            if repo.name.trim().is_empty() {
                return Err(ExtensionError::Config(
                    "repository name cannot be empty".to_string(),
                ));
            }
            if repo.location.trim().is_empty() {
                return Err(ExtensionError::Config(format!(
                    "repository '{}' has an empty location",
                    repo.name
                )));
            }
            if !seen.insert(repo.name.as_str()) {
                return Err(ExtensionError::Config(format!(
                    "repository '{}' is defined more than once",
                    repo.name
                )));
            }
        }
        if !self.contains(&self.default_repository) {
            return Err(ExtensionError::Config(format!(
                "default repository '{}' is not in the repository list",
                self.default_repository
            )));
        }
        Ok(())
    }
}

/// Expand a leading `~/` (or a lone `~`) using the home directory.
pub fn expand_home(location: &str) -> PathBuf {
    if location == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    if let Some(rest) = location.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(location)
}
