//! User-facing operations over repositories and installed extensions.

use std::fs;
use std::path::Path;
use std::rc::Rc;

use tracing::{debug, info, warn};

use super::store::RepositoryStore;
use crate::collection::CollectionIndex;
use crate::config::RepositoryEntry;
use crate::error::{ExtensionError, IoResultExt, Result};
use crate::extension::{ExtensionFunction, ExtensionUnit};
use crate::import_spec::{ImportSpec, InstallDirective, split_spec_line};
use crate::loader::ExtensionLoader;
use crate::source::{ArchiveFetcher, ExtensionLocation, LocationResolver};
use crate::types::QualifiedName;

/// What an import pass did, per spec line.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportReport {
    /// Freshly installed into the default repository.
    pub installed: Vec<QualifiedName>,
    /// Already present in the default repository and loading cleanly.
    pub unchanged: Vec<QualifiedName>,
    /// Installed or present, but missing a runtime dependency.
    pub degraded: Vec<QualifiedName>,
}

/// The single entry point an application holds: repository management,
/// extension lifecycle, and resolution for table integrations.
///
/// Every structural change ends with a rebuild of the collection index.
#[derive(Debug)]
pub struct ExtensionRepository {
    store: RepositoryStore,
    loader: Rc<dyn ExtensionLoader>,
    locations: LocationResolver,
    index: CollectionIndex,
}

impl ExtensionRepository {
    pub fn new(
        store: RepositoryStore,
        loader: Rc<dyn ExtensionLoader>,
        fetcher: Rc<dyn ArchiveFetcher>,
    ) -> Result<Self> {
        let locations = LocationResolver::new(fetcher, loader.source_suffix());
        let index = CollectionIndex::build(store.repositories(), &loader)?;
        Ok(Self {
            store,
            loader,
            locations,
            index,
        })
    }

    pub fn store(&self) -> &RepositoryStore {
        &self.store
    }

    pub fn index(&self) -> &CollectionIndex {
        &self.index
    }

    /// Re-scan every repository directory.
    pub fn rebuild(&mut self) -> Result<()> {
        self.index = CollectionIndex::build(self.store.repositories(), &self.loader)?;
        Ok(())
    }

    // Repository management

    pub fn repositories(&self) -> &[RepositoryEntry] {
        self.store.repositories()
    }

    pub fn search_order(&self) -> Vec<String> {
        self.store.search_order()
    }

    pub fn default_repository(&self) -> &str {
        self.store.default_name()
    }

    pub fn add_repository(
        &mut self,
        name: &str,
        location: &str,
        at_front: bool,
        make_default: bool,
    ) -> Result<()> {
        self.store.add(name, location, at_front, make_default)?;
        self.rebuild()
    }

    pub fn remove_repository(&mut self, name: &str) -> Result<()> {
        self.store.remove(name)?;
        self.rebuild()
    }

    pub fn reorder_repositories(&mut self, order: &[String]) -> Result<()> {
        self.store.reorder(order)?;
        self.rebuild()
    }

    pub fn set_default_repository(&mut self, name: &str) -> Result<()> {
        self.store.set_default(name)?;
        self.rebuild()
    }

    // Extension lifecycle

    /// Install each of `names` from `location` into `repository` (the default
    /// repository when `None`).
    ///
    /// Names may be qualified (`collection.name`) unless `collection` is given.
    /// The location is staged once for all names. Installation stops at the
    /// first failing name; names installed before it stay installed.
    pub fn install(
        &mut self,
        names: &[&str],
        location: &str,
        collection: Option<&str>,
        repository: Option<&str>,
    ) -> Result<Vec<QualifiedName>> {
        let repository = match repository {
            Some(name) => self.store.get(name)?.clone(),
            None => self.store.default_repository()?.clone(),
        };
        let targets = names
            .iter()
            .map(|name| target_name(name, collection))
            .collect::<Result<Vec<_>>>()?;

        let staged = self.locations.locate(location);
        let result = self.install_targets(&targets, &staged, &repository);
        let released = staged.release();
        self.rebuild()?;
        let installed = result?;
        released?;
        Ok(installed)
    }

    fn install_targets(
        &self,
        targets: &[QualifiedName],
        location: &ExtensionLocation,
        repository: &RepositoryEntry,
    ) -> Result<Vec<QualifiedName>> {
        let mut installed = Vec::with_capacity(targets.len());
        for target in targets {
            let unit = self.unit_in(repository, target.clone());
            unit.install(&location.staged_dir()?, location.descriptor())?;
            installed.push(target.clone());
        }
        Ok(installed)
    }

    /// Install every directive of an import specification into the default
    /// repository.
    ///
    /// Targets already present in the default repository are left alone when
    /// they load. Staged files are released even when a line fails.
    pub fn import_spec(&mut self, text: &str) -> Result<ImportReport> {
        let spec = ImportSpec::parse(text, &self.locations);
        debug!(
            directives = spec.len(),
            locations = spec.location_count(),
            "Importing extension spec"
        );

        let mut report = ImportReport::default();
        let result = spec
            .directives()
            .try_for_each(|directive| self.import_directive(directive?, &mut report));
        let released = spec.release();
        result?;
        released?;
        Ok(report)
    }

    /// Read an import specification from a file and import it.
    pub fn import_file(&mut self, path: &Path) -> Result<ImportReport> {
        let text = fs::read_to_string(path).at_path(path)?;
        self.import_spec(&text)
    }

    fn import_directive(
        &mut self,
        directive: InstallDirective<'_>,
        report: &mut ImportReport,
    ) -> Result<()> {
        let repository = self.store.default_repository()?.clone();
        let unit = self.unit_in(&repository, directive.target.clone());

        if unit.is_installed()
            && let Ok(function) = unit.get_callable()
        {
            if function.is_degraded() {
                report.degraded.push(directive.target);
            } else {
                debug!(extension = %directive.target, "Already installed, skipping");
                report.unchanged.push(directive.target);
            }
            return Ok(());
        }

        let location = directive.location;
        unit.install(&location.staged_dir()?, location.descriptor())?;
        self.rebuild()?;

        let function = unit.get_callable()?;
        if let Some(missing) = function.missing_dependency() {
            warn!(
                extension = %directive.target,
                module = %missing.module,
                "Imported extension {} requires module {} which is not installed",
                directive.target,
                missing.module
            );
            report.degraded.push(directive.target);
        } else {
            report.installed.push(directive.target);
        }
        Ok(())
    }

    pub fn enable(&mut self, name: &str) -> Result<()> {
        self.set_enabled(name, true)
    }

    pub fn disable(&mut self, name: &str) -> Result<()> {
        self.set_enabled(name, false)
    }

    fn set_enabled(&mut self, name: &str, enabled: bool) -> Result<()> {
        let unit = self.unit(name)?;
        unit.set_enabled(enabled)?;
        unit.reload()?;
        info!(extension = %unit.qualified_name(), enabled, "Updated extension state");
        self.rebuild()
    }

    /// Delete an extension from disk and from the index.
    ///
    /// A same-named extension in a later repository becomes visible again
    /// after the rebuild.
    pub fn remove(&mut self, name: &str) -> Result<()> {
        let unit = Rc::clone(self.unit(name)?);
        unit.remove()?;
        self.index.remove(unit.qualified_name());
        self.rebuild()
    }

    /// Refresh an extension from the location it was installed from, keeping
    /// its collection, name, and repository.
    pub fn reinstall(&mut self, name: &str) -> Result<()> {
        let unit = Rc::clone(self.unit(name)?);
        let provenance = unit.install_location()?;
        let Some((location, _)) = split_spec_line(&provenance) else {
            return Err(ExtensionError::InvalidLocation(provenance.clone()));
        };

        let staged = self.locations.locate(location);
        let result = staged.staged_dir().and_then(|dir| {
            unit.remove()?;
            unit.install(&dir, staged.descriptor())
        });
        let released = staged.release();
        self.rebuild()?;
        result?;
        released?;
        info!(extension = %unit.qualified_name(), location, "Reinstalled extension");
        Ok(())
    }

    // Resolution

    /// The indexed unit for `name` (`name` or `collection.name`).
    pub fn unit(&self, name: &str) -> Result<&Rc<ExtensionUnit>> {
        let qualified = QualifiedName::parse(name)?;
        self.index
            .get(&qualified)
            .ok_or_else(|| ExtensionError::extension_not_found(qualified.to_string()))
    }

    /// The callable a table integration exposes for `collection.name`.
    pub fn resolve(&self, collection: &str, name: &str) -> Result<ExtensionFunction> {
        let qualified = QualifiedName::new(collection, name);
        let unit = self
            .index
            .get(&qualified)
            .ok_or_else(|| ExtensionError::extension_not_found(qualified.to_string()))?;
        unit.get_callable()
    }

    pub fn is_known(&self, collection: &str, name: &str) -> bool {
        self.index.contains(&QualifiedName::new(collection, name))
    }

    fn unit_in(&self, repository: &RepositoryEntry, name: QualifiedName) -> ExtensionUnit {
        ExtensionUnit::new(
            &repository.name,
            &repository.path(),
            name,
            Rc::clone(&self.loader),
        )
    }
}

fn target_name(name: &str, collection: Option<&str>) -> Result<QualifiedName> {
    match collection {
        None => QualifiedName::parse(name),
        Some(collection) => {
            let bare = QualifiedName::parse(name)?;
            if !bare.is_default_collection() {
                return Err(ExtensionError::InvalidExtensionName(format!(
                    "{}.{}",
                    collection, name
                )));
            }
            QualifiedName::parse(&format!("{}.{}", collection, bare.name))
        }
    }
}
