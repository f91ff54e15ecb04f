//! Staging of extension files from a location descriptor.

use std::cell::RefCell;
use std::fs;
use std::io::{Cursor, Read};
use std::path::{Component, Path, PathBuf};
use std::rc::Rc;

use tempfile::TempDir;
use tracing::{debug, info};

use super::fetcher::ArchiveFetcher;
use super::remote::RemoteSpec;
use crate::config::expand_home;
use crate::error::{ExtensionError, IoResultExt, Result};
use crate::fs::copy_tree;

/// Creates [`ExtensionLocation`]s that share one fetcher and source suffix.
#[derive(Debug, Clone)]
pub struct LocationResolver {
    fetcher: Rc<dyn ArchiveFetcher>,
    source_suffix: String,
}

impl LocationResolver {
    pub fn new(fetcher: Rc<dyn ArchiveFetcher>, source_suffix: impl Into<String>) -> Self {
        Self {
            fetcher,
            source_suffix: source_suffix.into(),
        }
    }

    pub fn locate(&self, descriptor: &str) -> ExtensionLocation {
        ExtensionLocation {
            descriptor: descriptor.trim().to_string(),
            resolver: self.clone(),
            staged: RefCell::new(None),
        }
    }
}

/// A location descriptor and, once staged, the temporary copy of its files.
///
/// The staging directory is created on first use and reused afterwards. It is
/// deleted by [`ExtensionLocation::release`] or when the location is dropped.
#[derive(Debug)]
pub struct ExtensionLocation {
    descriptor: String,
    resolver: LocationResolver,
    staged: RefCell<Option<TempDir>>,
}

impl ExtensionLocation {
    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    pub fn is_staged(&self) -> bool {
        self.staged.borrow().is_some()
    }

    /// Directory holding exactly the files to install.
    pub fn staged_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = self.staged.borrow().as_ref() {
            return Ok(dir.path().to_path_buf());
        }

        let dir = tempfile::Builder::new()
            .prefix("tabext-stage-")
            .tempdir()
            .map_err(|e| ExtensionError::io(std::env::temp_dir(), e))?;
        self.stage_into(dir.path())?;
        debug!(location = %self.descriptor, staged = %dir.path().display(), "Staged extension files");

        let path = dir.path().to_path_buf();
        *self.staged.borrow_mut() = Some(dir);
        Ok(path)
    }

    /// Delete the staging directory. Later calls are no-ops.
    pub fn release(&self) -> Result<()> {
        if let Some(dir) = self.staged.borrow_mut().take() {
            let path = dir.path().to_path_buf();
            dir.close().at_path(&path)?;
            debug!(location = %self.descriptor, "Released staged files");
        }
        Ok(())
    }

    fn stage_into(&self, dest: &Path) -> Result<()> {
        let local = expand_home(&self.descriptor);
        if local.is_dir() {
            return copy_tree(&local, dest);
        }
        if local.is_file() {
            return self.stage_file(&local, dest);
        }
        if RemoteSpec::is_remote(&self.descriptor) {
            let spec = RemoteSpec::parse(&self.descriptor)?;
            return self.stage_remote(&spec, dest);
        }
        Err(ExtensionError::InvalidLocation(self.descriptor.clone()))
    }

    fn stage_file(&self, file: &Path, dest: &Path) -> Result<()> {
        let suffix = &self.resolver.source_suffix;
        if file
            .extension()
            .is_none_or(|ext| ext.to_string_lossy() != suffix.as_str())
        {
            return Err(ExtensionError::InvalidLocation(format!(
                "{} (single files must end in .{})",
                self.descriptor, suffix
            )));
        }
        let Some(name) = file.file_name() else {
            return Err(ExtensionError::InvalidLocation(self.descriptor.clone()));
        };
        let target = dest.join(name);
        fs::copy(file, &target).at_path(file)?;
        Ok(())
    }

    fn stage_remote(&self, spec: &RemoteSpec, dest: &Path) -> Result<()> {
        let url = spec.archive_url();
        let bytes = self.resolver.fetcher.fetch(&url)?;

        if let Some(expected) = &spec.checksum {
            let actual = blake3::hash(&bytes).to_hex().to_string();
            if *expected != actual {
                return Err(ExtensionError::ChecksumMismatch {
                    expected: expected.clone(),
                    actual,
                });
            }
        }

        let extracted = extract_subpath(&bytes, spec.subpath.as_deref(), dest)?;
        if extracted == 0 {
            return Err(ExtensionError::InvalidLocation(format!(
                "{} (no files found in archive)",
                spec
            )));
        }
        info!(remote = %spec, files = extracted, "Extracted remote extension files");
        Ok(())
    }
}

/// Extract the files under `subpath` of a snapshot archive into `dest`.
///
/// The archive's single top-level directory is stripped whatever its name.
/// A `subpath` naming a file extracts just that file. Returns the number of
/// files written.
pub(crate) fn extract_subpath(data: &[u8], subpath: Option<&str>, dest: &Path) -> Result<usize> {
    let mut archive = zip::ZipArchive::new(Cursor::new(data))?;
    let wanted: PathBuf = subpath.map(PathBuf::from).unwrap_or_default();
    let mut written = 0;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if entry.is_dir() {
            continue;
        }
        let Some(enclosed) = entry.enclosed_name() else {
            continue;
        };
        let inner: PathBuf = enclosed
            .components()
            .skip(1)
            .filter(|c| matches!(c, Component::Normal(_)))
            .collect();

        let relative = if inner == wanted {
            match inner.file_name() {
                Some(name) => PathBuf::from(name),
                None => continue,
            }
        } else {
            match inner.strip_prefix(&wanted) {
                Ok(rel) if !rel.as_os_str().is_empty() => rel.to_path_buf(),
                _ => continue,
            }
        };

        let out = dest.join(&relative);
        if let Some(parent) = out.parent() {
            fs::create_dir_all(parent).at_path(parent)?;
        }
        let mut buffer = Vec::new();
        entry
            .read_to_end(&mut buffer)
            .map_err(|e| ExtensionError::io(&out, e))?;
        fs::write(&out, &buffer).at_path(&out)?;
        written += 1;
    }

    Ok(written)
}
