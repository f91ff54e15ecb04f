//! Shared core types used across the repository, collection and extension layers.

use std::fmt;
use std::path::{Component, Path};

use serde::{Deserialize, Serialize};

use crate::error::{ExtensionError, Result};

/// Collection that holds extensions installed without a collection prefix.
pub const DEFAULT_COLLECTION: &str = "__no_collection";

/// Namespace through which a table exposes its extensions, used in usage strings.
pub const TABLE_NAMESPACE: &str = "table.extensions";

/// Separator between location and name in an import specification line.
pub const SPEC_SEPARATOR: &str = "->";

/// Fixed install timestamp format (UTC).
pub const INSTALL_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// A `(collection, name)` pair identifying an extension within the index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QualifiedName {
    pub collection: String,
    pub name: String,
}

impl QualifiedName {
    pub fn new(collection: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            name: name.into(),
        }
    }

    /// Parse `name` or `collection.name`.
    ///
    /// A bare name lands in [`DEFAULT_COLLECTION`]; more than one dot is rejected.
    /// Each part becomes a directory under the repository root, so path
    /// separators and hidden or absolute segments are rejected too.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        let parts: Vec<&str> = input.split('.').collect();
        if !parts.iter().all(|p| is_plain_segment(p)) {
            return Err(ExtensionError::InvalidExtensionName(input.to_string()));
        }
        match parts.as_slice() {
            [name] => Ok(Self::new(DEFAULT_COLLECTION, *name)),
            [collection, name] => Ok(Self::new(*collection, *name)),
            _ => Err(ExtensionError::InvalidExtensionName(input.to_string())),
        }
    }

    pub fn is_default_collection(&self) -> bool {
        self.collection == DEFAULT_COLLECTION
    }

    /// Call path as seen from a table, e.g. `table.extensions.circle.area`.
    pub fn call_path(&self) -> String {
        if self.is_default_collection() {
            format!("{}.{}", TABLE_NAMESPACE, self.name)
        } else {
            format!("{}.{}.{}", TABLE_NAMESPACE, self.collection, self.name)
        }
    }
}

/// A single relative path component that is neither hidden nor empty.
fn is_plain_segment(segment: &str) -> bool {
    if segment.is_empty() || segment.starts_with('.') || segment.contains(['/', '\\']) {
        return false;
    }
    let mut components = Path::new(segment).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_default_collection() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}.{}", self.collection, self.name)
        }
    }
}
