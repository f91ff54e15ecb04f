//! Tabext Core Library
//!
//! Installs, indexes, and resolves user-authored table extensions stored in
//! an ordered list of on-disk repositories.

pub mod collection;
pub mod config;
pub mod context;
pub mod error;
pub mod extension;
pub mod fs;
pub mod import_spec;
pub mod loader;
pub mod repository;
pub mod source;
pub mod table;
pub mod types;

/// Re-exports of commonly used types
pub mod prelude {
    // Configuration
    pub use crate::config::{ConfigStore, RepositoriesConfig, RepositoryEntry};
    pub use crate::context::AppContext;

    // Errors
    pub use crate::error::{ExtensionError, Result};

    // Repository
    pub use crate::repository::{
        ExtensionDetails, ExtensionRepository, ExtensionState, ExtensionSummary, ImportReport,
        RepositoryStore,
    };

    // Extensions
    pub use crate::extension::{ExtensionFunction, ExtensionUnit, Manifest};
    pub use crate::loader::{ExtensionLoader, LoadOutcome, ScriptLoader};
    pub use crate::source::{ArchiveFetcher, HttpArchiveFetcher, RetryPolicy};

    // Tables
    pub use crate::table::{Table, Value};
    pub use crate::types::{DEFAULT_COLLECTION, QualifiedName};
}
