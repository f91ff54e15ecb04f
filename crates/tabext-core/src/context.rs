//! Application context for unified dependency injection.

use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::config::paths::config_path_in;
use crate::config::{ConfigStore, default_config_dir};
use crate::error::Result;
use crate::loader::{ExtensionLoader, ScriptLoader};
use crate::repository::{ExtensionRepository, RepositoryStore};
use crate::source::{ArchiveFetcher, HttpArchiveFetcher};

/// Unified application context for dependency injection.
///
/// Holds the config location and the pluggable services. Frontends create
/// this once and build the [`ExtensionRepository`] from it.
#[derive(Debug, Clone)]
pub struct AppContext {
    config_path: PathBuf,
    bootstrap_location: Option<String>,
    loader: Rc<dyn ExtensionLoader>,
    fetcher: Rc<dyn ArchiveFetcher>,
}

impl AppContext {
    /// Context reading the config at `config_path`, with the script loader and
    /// the HTTP fetcher.
    pub fn new(config_path: PathBuf) -> Result<Self> {
        Ok(Self {
            config_path,
            bootstrap_location: None,
            loader: Rc::new(ScriptLoader::new()),
            fetcher: Rc::new(HttpArchiveFetcher::new()?),
        })
    }

    /// Context at the per-user config location.
    pub fn with_defaults() -> Result<Self> {
        Self::new(config_path_in(&default_config_dir()?))
    }

    /// Where the bootstrap repository points if no config exists yet (for testing).
    pub fn with_bootstrap_location(mut self, location: impl Into<String>) -> Self {
        self.bootstrap_location = Some(location.into());
        self
    }

    pub fn with_loader(mut self, loader: Rc<dyn ExtensionLoader>) -> Self {
        self.loader = loader;
        self
    }

    pub fn with_fetcher(mut self, fetcher: Rc<dyn ArchiveFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn loader(&self) -> &Rc<dyn ExtensionLoader> {
        &self.loader
    }

    pub fn config_store(&self) -> ConfigStore {
        let store = ConfigStore::from_path(self.config_path.clone());
        match &self.bootstrap_location {
            Some(location) => store.with_bootstrap_location(location.clone()),
            None => store,
        }
    }

    pub fn repository_store(&self) -> Result<RepositoryStore> {
        RepositoryStore::open(self.config_store())
    }

    /// Open the config and index every repository.
    pub fn repository(&self) -> Result<ExtensionRepository> {
        ExtensionRepository::new(
            self.repository_store()?,
            Rc::clone(&self.loader),
            Rc::clone(&self.fetcher),
        )
    }
}
