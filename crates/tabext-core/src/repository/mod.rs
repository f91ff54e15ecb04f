//! The repository facade.
//!
//! [`ExtensionRepository`] is what an application constructs once and hands
//! to its table integration. Methods are grouped by concern:
//! - repository management, backed by [`RepositoryStore`]
//! - extension lifecycle (install, import, enable, remove, reinstall)
//! - listing and resolution

mod facade;
mod listing;
mod store;

pub use facade::{ExtensionRepository, ImportReport};
pub use listing::{ExtensionDetails, ExtensionState, ExtensionSummary};
pub use store::RepositoryStore;
