//! Plugin-loading abstraction.
//!
//! Extension units never touch loader mechanics directly: they hand a
//! [`LoadRequest`] to an [`ExtensionLoader`] and get back a [`LoadOutcome`].

pub mod script;

use std::fmt;
use std::path::Path;
use std::rc::Rc;

use crate::error::Result;
use crate::table::{Table, Value};

pub use script::ScriptLoader;

/// Content-addressed identifier of an installed module, derived from its path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(String);

impl ModuleId {
    pub fn for_path(path: &Path) -> Self {
        let digest = blake3::hash(path.to_string_lossy().as_bytes());
        Self(digest.to_hex()[..32].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A runtime dependency an extension needs but the host cannot provide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingDependency {
    pub module: String,
}

/// A parameter of a loaded extension, as shown in usage strings.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: String,
    pub default: Option<String>,
}

impl fmt::Display for ParamSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.default {
            Some(default) => write!(f, "{}={}", self.name, default),
            None => write!(f, "{}", self.name),
        }
    }
}

/// A loaded function applied to a table.
pub trait ExtensionCallable: fmt::Debug {
    /// All parameters, the table parameter first.
    fn params(&self) -> &[ParamSpec];

    fn doc(&self) -> &str;

    fn call(&self, table: &mut Table, args: &[Value]) -> Result<Value>;
}

#[derive(Debug, Clone)]
pub enum LoadOutcome {
    Loaded(Rc<dyn ExtensionCallable>),
    Degraded(MissingDependency),
}

/// Everything a loader needs to bring one installed extension to life.
#[derive(Debug, Clone, Copy)]
pub struct LoadRequest<'a> {
    pub module_id: &'a ModuleId,
    pub module_dir: &'a Path,
    /// Entry file, relative to `module_dir`.
    pub entry_file: &'a Path,
    pub name: &'a str,
    /// Digest of the module directory contents.
    pub digest: &'a str,
}

pub trait ExtensionLoader: fmt::Debug {
    /// File suffix (without the dot) of sources this loader understands.
    fn source_suffix(&self) -> &str;

    /// Whether `source` defines a top-level function called `name`.
    fn defines(&self, source: &str, name: &str) -> bool;

    fn load(&self, request: &LoadRequest<'_>) -> Result<LoadOutcome>;

    /// Forget anything cached for `module_id`.
    fn evict(&self, module_id: &ModuleId);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_id_is_stable_and_path_sensitive() {
        let a = ModuleId::for_path(Path::new("/repo/circle/area"));
        let b = ModuleId::for_path(Path::new("/repo/circle/area"));
        let c = ModuleId::for_path(Path::new("/repo/square/area"));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.as_str().len(), 32);
    }

    #[test]
    fn test_param_display() {
        let plain = ParamSpec {
            name: "col".to_string(),
            default: None,
        };
        let with_default = ParamSpec {
            name: "radius".to_string(),
            default: Some("\"radius\"".to_string()),
        };
        assert_eq!(plain.to_string(), "col");
        assert_eq!(with_default.to_string(), "radius=\"radius\"");
    }
}
