//! Ordered repository list with persistence.

use std::collections::BTreeSet;

use tracing::info;

use crate::config::{ConfigStore, RepositoriesConfig, RepositoryEntry};
use crate::error::{ExtensionError, IoResultExt, Result};

/// The configured repositories, kept in sync with the config file.
///
/// Every mutation writes the whole config before it becomes visible in
/// memory, so a failed write leaves both unchanged.
#[derive(Debug)]
pub struct RepositoryStore {
    store: ConfigStore,
    config: RepositoriesConfig,
}

impl RepositoryStore {
    /// Load the config, bootstrapping it on first use.
    pub fn open(store: ConfigStore) -> Result<Self> {
        let config = store.load_or_bootstrap()?;
        config.validate()?;
        Ok(Self { store, config })
    }

    pub fn config(&self) -> &RepositoriesConfig {
        &self.config
    }

    pub fn config_store(&self) -> &ConfigStore {
        &self.store
    }

    /// Repositories in search order.
    pub fn repositories(&self) -> &[RepositoryEntry] {
        &self.config.repositories
    }

    pub fn search_order(&self) -> Vec<String> {
        self.config.search_order()
    }

    pub fn default_name(&self) -> &str {
        &self.config.default_repository
    }

    pub fn default_repository(&self) -> Result<&RepositoryEntry> {
        self.get(&self.config.default_repository)
    }

    pub fn get(&self, name: &str) -> Result<&RepositoryEntry> {
        self.config
            .get(name)
            .ok_or_else(|| ExtensionError::repository_not_found(name))
    }

    /// Add a repository at the front (highest precedence) or back of the
    /// search order, creating its directory.
    pub fn add(
        &mut self,
        name: &str,
        location: &str,
        at_front: bool,
        make_default: bool,
    ) -> Result<()> {
        if self.config.contains(name) {
            return Err(ExtensionError::DuplicateName(name.to_string()));
        }

        let entry = RepositoryEntry::new(name, location);
        let mut next = self.config.clone();
        if at_front {
            next.repositories.insert(0, entry.clone());
        } else {
            next.repositories.push(entry.clone());
        }
        if make_default {
            next.default_repository = name.to_string();
        }
        next.validate()?;

        let path = entry.path();
        std::fs::create_dir_all(&path).at_path(&path)?;
        self.commit(next)?;
        info!(repository = name, location, at_front, make_default, "Added repository");
        Ok(())
    }

    /// Remove a repository from the config. Its files are left on disk.
    pub fn remove(&mut self, name: &str) -> Result<RepositoryEntry> {
        let entry = self.get(name)?.clone();
        if self.config.default_repository == name {
            return Err(ExtensionError::CannotRemoveDefault(name.to_string()));
        }

        let mut next = self.config.clone();
        next.repositories.retain(|r| r.name != name);
        self.commit(next)?;
        info!(repository = name, "Removed repository");
        Ok(entry)
    }

    /// Replace the search order. `order` must name every repository exactly once.
    pub fn reorder(&mut self, order: &[String]) -> Result<()> {
        let current = self.search_order();
        let requested: BTreeSet<&str> = order.iter().map(String::as_str).collect();
        let existing: BTreeSet<&str> = current.iter().map(String::as_str).collect();
        if order.len() != current.len() || requested != existing {
            return Err(ExtensionError::InvalidOrder {
                requested: order.to_vec(),
                current,
            });
        }

        let mut next = self.config.clone();
        next.repositories = order
            .iter()
            .filter_map(|name| self.config.get(name).cloned())
            .collect();
        self.commit(next)?;
        info!(order = ?order, "Reordered repositories");
        Ok(())
    }

    pub fn set_default(&mut self, name: &str) -> Result<()> {
        self.get(name)?;
        let mut next = self.config.clone();
        next.default_repository = name.to_string();
        self.commit(next)?;
        info!(repository = name, "Set default repository");
        Ok(())
    }

    fn commit(&mut self, next: RepositoriesConfig) -> Result<()> {
        self.store.save(&next)?;
        self.config = next;
        Ok(())
    }
}
