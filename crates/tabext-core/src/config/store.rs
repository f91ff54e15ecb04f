//! Config store for loading and saving repositories.toml.

use std::path::{Path, PathBuf};

use tracing::info;

use super::paths::{BOOTSTRAP_LOCATION, config_path_in};
use super::{RepositoriesConfig, parser};
use crate::error::{IoResultExt, Result};

#[derive(Debug, Clone)]
pub struct ConfigStore {
    config_path: PathBuf,
    bootstrap_location: String,
}

impl ConfigStore {
    pub fn from_dir(config_dir: &Path) -> Self {
        Self::from_path(config_path_in(config_dir))
    }

    pub fn from_path(config_path: PathBuf) -> Self {
        Self {
            config_path,
            bootstrap_location: BOOTSTRAP_LOCATION.to_string(),
        }
    }

    /// Override where the bootstrap repository points (used by tests).
    pub fn with_bootstrap_location(mut self, location: impl Into<String>) -> Self {
        self.bootstrap_location = location.into();
        self
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn exists(&self) -> bool {
        self.config_path.exists()
    }

    /// Parse the existing config file.
    pub fn load(&self) -> Result<RepositoriesConfig> {
        parser::parse_repositories_toml(&self.config_path)
    }

    /// Load the config, synthesizing and persisting the bootstrap config on first use.
    ///
    /// Every repository directory is created if it does not exist yet.
    pub fn load_or_bootstrap(&self) -> Result<RepositoriesConfig> {
        let config = if self.exists() {
            self.load()?
        } else {
            let config = RepositoriesConfig::bootstrap(self.bootstrap_location.clone());
            info!(
                "No repository config at {}, creating default repository '{}'",
                self.config_path.display(),
                config.default_repository
            );
            self.save(&config)?;
            config
        };

        for repo in &config.repositories {
            let path = repo.path();
            if !path.exists() {
                std::fs::create_dir_all(&path).at_path(&path)?;
            }
        }

        Ok(config)
    }

    /// Write the whole config, replacing the previous file.
    pub fn save(&self, config: &RepositoriesConfig) -> Result<()> {
        config.validate()?;
        let content = parser::to_toml(config)?;
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent).at_path(parent)?;
        }
        std::fs::write(&self.config_path, content).at_path(&self.config_path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_file_fails() {
        let tmp = TempDir::new().unwrap();
        let store = ConfigStore::from_dir(tmp.path());
        assert!(store.load().is_err());
        assert!(!store.exists());
    }

    #[test]
    fn test_bootstrap_then_load() {
        let tmp = TempDir::new().unwrap();
        let repo_dir = tmp.path().join("repo");
        let store = ConfigStore::from_dir(&tmp.path().join("cfg"))
            .with_bootstrap_location(repo_dir.to_string_lossy());

        let bootstrapped = store.load_or_bootstrap().unwrap();
        assert!(store.exists());
        assert!(repo_dir.is_dir());
        assert_eq!(store.load().unwrap(), bootstrapped);
    }
}
