//! Error taxonomy for repository and extension operations.

use std::path::PathBuf;

use thiserror::Error;

/// What kind of object a `NotFound` refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Repository,
    Extension,
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObjectKind::Repository => write!(f, "Repository"),
            ObjectKind::Extension => write!(f, "Extension"),
        }
    }
}

/// Unified error type for tabext.
#[derive(Debug, Error)]
pub enum ExtensionError {
    #[error("{kind} '{name}' does not exist")]
    NotFound { kind: ObjectKind, name: String },

    #[error("Repository '{0}' already exists")]
    DuplicateName(String),

    #[error("Not allowed to remove default repository '{0}'")]
    CannotRemoveDefault(String),

    #[error("Search order {requested:?} is not a permutation of repositories {current:?}")]
    InvalidOrder {
        requested: Vec<String>,
        current: Vec<String>,
    },

    #[error("Invalid location of extension files: {0}")]
    InvalidLocation(String),

    #[error("Unable to parse remote location: {0}. Expected 'github:owner/repo[@ref][/path]'")]
    MalformedRemoteReference(String),

    #[error("'{name}' is not defined in extension files from {location}")]
    DefinitionNotFound { name: String, location: String },

    #[error("Invalid extension name '{0}': extensions can't be nested more than one collection deep")]
    InvalidExtensionName(String),

    #[error("Extension '{name}' is not installed")]
    NotInstalled { name: String },

    #[error("Archive checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("Failed to download {url}: {message}")]
    Download {
        url: String,
        message: String,
        retryable: bool,
    },

    #[error("{}:{line}: {message}", .file.display())]
    Script {
        file: PathBuf,
        line: usize,
        message: String,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid manifest at {}: {message}", .path.display())]
    Manifest { path: PathBuf, message: String },

    #[error("Invalid timestamp '{0}': expected YYYY-MM-DDTHH:MM:SSZ")]
    InvalidTimestamp(String),

    #[error("IO error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Zip extraction error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("TOML parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

pub type Result<T> = std::result::Result<T, ExtensionError>;

impl ExtensionError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ExtensionError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn repository_not_found(name: impl Into<String>) -> Self {
        ExtensionError::NotFound {
            kind: ObjectKind::Repository,
            name: name.into(),
        }
    }

    pub(crate) fn extension_not_found(name: impl Into<String>) -> Self {
        ExtensionError::NotFound {
            kind: ObjectKind::Extension,
            name: name.into(),
        }
    }

    /// Whether a failed download is worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ExtensionError::Download {
                retryable: true,
                ..
            }
        )
    }
}

/// Attach a path to a bare `std::io::Error`.
pub(crate) trait IoResultExt<T> {
    fn at_path(self, path: &std::path::Path) -> Result<T>;
}

impl<T> IoResultExt<T> for std::result::Result<T, std::io::Error> {
    fn at_path(self, path: &std::path::Path) -> Result<T> {
        self.map_err(|e| ExtensionError::io(path, e))
    }
}
