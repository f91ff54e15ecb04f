//! One installed extension on disk.
//!
//! Layout under a repository root:
//!
//! ```text
//! <collection>/<name>/<module id>/
//!     __manifest__.toml
//!     <copied extension files>
//! ```

use std::cell::RefCell;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tracing::{debug, info, warn};

use super::manifest::{MANIFEST_FILE, Manifest, now};
use crate::error::{ExtensionError, IoResultExt, Result};
use crate::fs::{copy_tree, files_with_suffix, hash_tree_skipping, remove_tree};
use crate::import_spec::format_spec_line;
use crate::loader::{
    ExtensionCallable, ExtensionLoader, LoadOutcome, LoadRequest, MissingDependency, ModuleId,
};
use crate::table::{Table, Value};
use crate::types::QualifiedName;

/// An installed extension, identified by repository and qualified name.
pub struct ExtensionUnit {
    qualified: QualifiedName,
    repository: String,
    path: PathBuf,
    module_id: ModuleId,
    module_path: PathBuf,
    loader: Rc<dyn ExtensionLoader>,
    manifest: RefCell<Option<Manifest>>,
    function: RefCell<Option<ExtensionFunction>>,
}

impl fmt::Debug for ExtensionUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionUnit")
            .field("qualified", &self.qualified)
            .field("repository", &self.repository)
            .field("path", &self.path)
            .field("module_id", &self.module_id)
            .finish_non_exhaustive()
    }
}

impl ExtensionUnit {
    pub fn new(
        repository: impl Into<String>,
        repository_root: &Path,
        qualified: QualifiedName,
        loader: Rc<dyn ExtensionLoader>,
    ) -> Self {
        let path = repository_root
            .join(&qualified.collection)
            .join(&qualified.name);
        let module_id = ModuleId::for_path(&path);
        let module_path = path.join(module_id.as_str());
        Self {
            qualified,
            repository: repository.into(),
            path,
            module_id,
            module_path,
            loader,
            manifest: RefCell::new(None),
            function: RefCell::new(None),
        }
    }

    pub fn qualified_name(&self) -> &QualifiedName {
        &self.qualified
    }

    pub fn name(&self) -> &str {
        &self.qualified.name
    }

    pub fn collection(&self) -> &str {
        &self.qualified.collection
    }

    /// Name of the repository this unit lives in.
    pub fn repository(&self) -> &str {
        &self.repository
    }

    /// Extension directory, `<repo>/<collection>/<name>`.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn module_id(&self) -> &ModuleId {
        &self.module_id
    }

    pub fn module_path(&self) -> &Path {
        &self.module_path
    }

    pub fn is_installed(&self) -> bool {
        self.module_path.join(MANIFEST_FILE).is_file()
    }

    /// Copy `staged` into this unit's module directory and record a manifest.
    ///
    /// Any previous content is deleted first. If no staged file defines the
    /// extension's function, nothing is left behind.
    pub fn install(&self, staged: &Path, location: &str) -> Result<()> {
        self.invalidate();
        self.loader.evict(&self.module_id);
        remove_tree(&self.module_path)?;

        match self.install_files(staged, location) {
            Ok(manifest) => {
                info!(
                    extension = %self.qualified,
                    repository = %self.repository,
                    file = %manifest.extension_file,
                    "Installed extension"
                );
                *self.manifest.borrow_mut() = Some(manifest);
                Ok(())
            }
            Err(e) => {
                remove_tree(&self.module_path)?;
                self.prune_empty_parents()?;
                Err(e)
            }
        }
    }

    fn install_files(&self, staged: &Path, location: &str) -> Result<Manifest> {
        copy_tree(staged, &self.module_path)?;

        let extension_file =
            self.find_definition()?
                .ok_or_else(|| ExtensionError::DefinitionNotFound {
                    name: self.qualified.name.clone(),
                    location: location.to_string(),
                })?;

        let manifest = Manifest {
            entry: Manifest::entry_for(&extension_file, &self.qualified.name),
            extension_file,
            extension_name: self.qualified.name.clone(),
            enabled: true,
            install_location: format_spec_line(location, &self.qualified.to_string()),
            install_collection: self.qualified.collection.clone(),
            install_repository: self.repository.clone(),
            install_files: hash_tree_skipping(&self.module_path, &[MANIFEST_FILE])?,
            install_time: now(),
        };
        manifest.write(&self.module_path)?;
        Ok(manifest)
    }

    /// First source file (depth-first, alphabetical) with a top-level
    /// definition of this extension's function, relative to the module dir.
    fn find_definition(&self) -> Result<Option<String>> {
        let suffix = self.loader.source_suffix().to_string();
        for file in files_with_suffix(&self.module_path, &suffix)? {
            let source = fs::read_to_string(&file).at_path(&file)?;
            if self.loader.defines(&source, &self.qualified.name) {
                let relative = file.strip_prefix(&self.module_path).unwrap_or(&file);
                let parts: Vec<String> = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().to_string())
                    .collect();
                return Ok(Some(parts.join("/")));
            }
        }
        Ok(None)
    }

    /// The manifest, read from disk on first use.
    pub fn manifest(&self) -> Result<Manifest> {
        if let Some(manifest) = self.manifest.borrow().as_ref() {
            return Ok(manifest.clone());
        }
        if !self.is_installed() {
            return Err(ExtensionError::NotInstalled {
                name: self.qualified.to_string(),
            });
        }
        let manifest = Manifest::read(&self.module_path)?;
        *self.manifest.borrow_mut() = Some(manifest.clone());
        Ok(manifest)
    }

    pub fn enabled(&self) -> Result<bool> {
        Ok(self.manifest()?.enabled)
    }

    /// Persist the enabled flag immediately.
    pub fn set_enabled(&self, enabled: bool) -> Result<()> {
        let mut manifest = self.manifest()?;
        if manifest.enabled == enabled {
            return Ok(());
        }
        manifest.enabled = enabled;
        manifest.write(&self.module_path)?;
        *self.manifest.borrow_mut() = Some(manifest);
        self.function.borrow_mut().take();
        Ok(())
    }

    pub fn install_location(&self) -> Result<String> {
        Ok(self.manifest()?.install_location)
    }

    pub fn install_time(&self) -> Result<String> {
        Ok(self.manifest()?.install_time)
    }

    pub fn is_earlier_than(&self, timestamp: &str) -> Result<bool> {
        self.manifest()?.is_earlier_than(timestamp)
    }

    /// Resolve the extension's function.
    ///
    /// A missing runtime dependency does not fail: the returned function is a
    /// stand-in that logs a warning when called.
    pub fn get_callable(&self) -> Result<ExtensionFunction> {
        if let Some(function) = self.function.borrow().as_ref() {
            return Ok(function.clone());
        }

        let manifest = self.manifest()?;
        let digest = hash_tree_skipping(&self.module_path, &[MANIFEST_FILE])?;
        let request = LoadRequest {
            module_id: &self.module_id,
            module_dir: &self.module_path,
            entry_file: Path::new(&manifest.extension_file),
            name: &self.qualified.name,
            digest: &digest,
        };

        let function = match self.loader.load(&request)? {
            LoadOutcome::Loaded(callable) => {
                ExtensionFunction::loaded(self.qualified.clone(), manifest.enabled, callable)
            }
            LoadOutcome::Degraded(missing) => {
                debug!(
                    extension = %self.qualified,
                    module = %missing.module,
                    "Extension loaded in degraded state"
                );
                ExtensionFunction::degraded(self.qualified.clone(), manifest.enabled, missing)
            }
        };

        *self.function.borrow_mut() = Some(function.clone());
        Ok(function)
    }

    /// Re-read the manifest and reload the module from disk.
    ///
    /// The loader reuses its compiled module when the files are unchanged.
    pub fn reload(&self) -> Result<()> {
        self.invalidate();
        self.manifest()?;
        self.get_callable()?;
        Ok(())
    }

    /// Delete the whole extension directory. Returns whether anything was removed.
    pub fn remove(&self) -> Result<bool> {
        self.invalidate();
        self.loader.evict(&self.module_id);
        let removed = remove_tree(&self.path)?;
        self.prune_empty_parents()?;
        if removed {
            info!(extension = %self.qualified, repository = %self.repository, "Removed extension");
        }
        Ok(removed)
    }

    /// Remove the extension and collection directories if they are left empty.
    fn prune_empty_parents(&self) -> Result<()> {
        let collection_dir = self.path.parent().map(Path::to_path_buf);
        for dir in std::iter::once(self.path.clone()).chain(collection_dir) {
            if fs::read_dir(&dir).is_ok_and(|mut entries| entries.next().is_none()) {
                fs::remove_dir(&dir).at_path(&dir)?;
            }
        }
        Ok(())
    }

    fn invalidate(&self) {
        self.manifest.borrow_mut().take();
        self.function.borrow_mut().take();
    }
}

#[derive(Debug, Clone)]
enum FunctionState {
    Ready(Rc<dyn ExtensionCallable>),
    Degraded(MissingDependency),
}

/// A resolved extension function, ready to apply to a table.
#[derive(Debug, Clone)]
pub struct ExtensionFunction {
    qualified: QualifiedName,
    usage: String,
    doc: String,
    enabled: bool,
    state: FunctionState,
}

impl ExtensionFunction {
    fn loaded(qualified: QualifiedName, enabled: bool, callable: Rc<dyn ExtensionCallable>) -> Self {
        let others: Vec<String> = callable
            .params()
            .iter()
            .skip(1)
            .map(|p| p.to_string())
            .collect();
        let usage = format!("{}({})", qualified.call_path(), others.join(", "));
        let doc = with_usage(callable.doc(), &usage);
        Self {
            qualified,
            usage,
            doc,
            enabled,
            state: FunctionState::Ready(callable),
        }
    }

    fn degraded(qualified: QualifiedName, enabled: bool, missing: MissingDependency) -> Self {
        let usage = format!("{}(...)", qualified.call_path());
        let text = format!(
            "EXTENSION CANNOT BE LOADED\n\n\
             There is a module dependency within the extension code that needs\n\
             to be installed before this extension can be loaded:\n\
             module: {} needs to be installed",
            missing.module
        );
        let doc = with_usage(&text, &usage);
        Self {
            qualified,
            usage,
            doc,
            enabled,
            state: FunctionState::Degraded(missing),
        }
    }

    pub fn name(&self) -> &str {
        &self.qualified.name
    }

    pub fn qualified_name(&self) -> &QualifiedName {
        &self.qualified
    }

    /// Call signature as seen from a table.
    pub fn usage(&self) -> &str {
        &self.usage
    }

    /// Documentation followed by a single `USAGE:` line.
    pub fn doc(&self) -> &str {
        &self.doc
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn missing_dependency(&self) -> Option<&MissingDependency> {
        match &self.state {
            FunctionState::Degraded(missing) => Some(missing),
            FunctionState::Ready(_) => None,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.missing_dependency().is_some()
    }

    /// Apply the extension to `table`.
    ///
    /// Disabled extensions do nothing. A degraded extension logs one warning
    /// and does nothing. Both return [`Value::Nil`].
    pub fn call(&self, table: &mut Table, args: &[Value]) -> Result<Value> {
        if !self.enabled {
            debug!(extension = %self.qualified, "Extension is disabled, skipping call");
            return Ok(Value::Nil);
        }
        match &self.state {
            FunctionState::Ready(callable) => callable.call(table, args),
            FunctionState::Degraded(missing) => {
                warn!(
                    extension = %self.qualified,
                    module = %missing.module,
                    "tabext extension {} requires module {} which is not installed",
                    self.qualified,
                    missing.module
                );
                Ok(Value::Nil)
            }
        }
    }
}

fn with_usage(doc: &str, usage: &str) -> String {
    let doc = doc.trim_end();
    if doc.is_empty() {
        format!("USAGE: {}", usage)
    } else {
        format!("{}\nUSAGE: {}", doc, usage)
    }
}
