//! Repository configuration
//!
//! The ordered repository list and the default repository are persisted as a
//! single TOML document, rewritten wholesale on every change.

pub mod parser;
pub mod paths;
pub mod schema;
pub mod store;

pub use parser::{parse_repositories_toml, parse_repositories_toml_str, to_toml};
pub use paths::{BOOTSTRAP_LOCATION, CONFIG_FILE_NAME, default_config_dir};
pub use schema::{BOOTSTRAP_REPOSITORY, RepositoriesConfig, RepositoryEntry, expand_home};
pub use store::ConfigStore;
