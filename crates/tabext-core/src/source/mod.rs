//! Extension sources.
//!
//! Turns a location descriptor into a staging directory holding the files to
//! install. Handles:
//! - local directories, copied recursively
//! - single `.tbx` files
//! - `github:owner/repo[@ref][/subpath]` archive references

mod fetcher;
mod location;
mod remote;

pub use fetcher::{ArchiveFetcher, HttpArchiveFetcher, RetryPolicy};
pub use location::{ExtensionLocation, LocationResolver};
pub use remote::{REMOTE_PREFIX, RemoteSpec};
