//! Filesystem primitives shared across features.

pub mod copy;
pub mod tree_hash;

pub use copy::{copy_tree, files_with_suffix, list_subdirs, remove_tree};
pub use tree_hash::hash_tree_skipping;
