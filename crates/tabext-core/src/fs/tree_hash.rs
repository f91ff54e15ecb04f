//! Deterministic tree hashing for staged and installed extension files
//!
//! The digest is recorded in each manifest and lets a reload tell whether the
//! files behind a loaded module changed on disk.

use std::fs;
use std::path::Path;

use crate::error::{ExtensionError, IoResultExt, Result};

/// Compute deterministic tree hash of a directory
///
/// # Algorithm
/// - Recursive directory traversal
/// - Sort paths lexicographically for determinism
/// - Hash format: `blake3(relative_path || 0x00 || content)`, directories as
///   `relative_path || 0xFF`
/// - Output: hex string
///
/// Entries whose name is in `skip` are ignored at the top level only, so the
/// manifest written next to the installed files does not change the digest.
pub fn hash_tree_skipping(path: &Path, skip: &[&str]) -> Result<String> {
    let mut hasher = blake3::Hasher::new();
    hash_dir_recursive(&mut hasher, path, "", skip)?;
    Ok(hasher.finalize().to_hex().to_string())
}

fn hash_dir_recursive(
    hasher: &mut blake3::Hasher,
    dir: &Path,
    base: &str,
    skip: &[&str],
) -> Result<()> {
    let entries = fs::read_dir(dir).at_path(dir)?;

    let mut sorted_entries: Vec<_> = entries.collect::<std::io::Result<Vec<_>>>().at_path(dir)?;
    sorted_entries.sort_by_key(|e| e.file_name());

    for entry in sorted_entries {
        let name = entry.file_name();
        let name_str = name.to_string_lossy();
        if base.is_empty() && skip.contains(&name_str.as_ref()) {
            continue;
        }
        let rel_path = if base.is_empty() {
            name_str.to_string()
        } else {
            format!("{}/{}", base, name_str)
        };

        let entry_path = entry.path();
        let ty = entry.file_type().at_path(&entry_path)?;

        if ty.is_dir() {
            hasher.update(rel_path.as_bytes());
            hasher.update(&[0xFF]);
            hash_dir_recursive(hasher, &entry_path, &rel_path, &[])?;
        } else if ty.is_file() {
            hasher.update(rel_path.as_bytes());
            hasher.update(&[0x00]);
            let content = fs::read(&entry_path).at_path(&entry_path)?;
            hasher.update(&content);
        } else {
            return Err(ExtensionError::InvalidLocation(format!(
                "unsupported filesystem entry (symlinks are not followed): {}",
                entry_path.display()
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_file(path: &Path, content: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create_dir_all should succeed in test temp dirs");
        }
        fs::write(path, content).expect("write should succeed in test temp dirs");
    }

    #[test]
    fn test_digest_is_independent_of_creation_order() {
        let first = TempDir::new().expect("tempdir should succeed");
        write_file(&first.path().join("a.tbx"), "fn a(t):\n    return 1\n");
        write_file(&first.path().join("lib/b.tbx"), "fn b(t):\n    return 2\n");

        let second = TempDir::new().expect("tempdir should succeed");
        write_file(&second.path().join("lib/b.tbx"), "fn b(t):\n    return 2\n");
        write_file(&second.path().join("a.tbx"), "fn a(t):\n    return 1\n");

        assert_eq!(
            hash_tree_skipping(first.path(), &[]).expect("hash should succeed"),
            hash_tree_skipping(second.path(), &[]).expect("hash should succeed")
        );
    }

    #[test]
    fn test_digest_changes_with_content() {
        let tmp = TempDir::new().expect("tempdir should succeed");
        let file = tmp.path().join("ext.tbx");
        write_file(&file, "fn ext(t):\n    return 1\n");
        let before = hash_tree_skipping(tmp.path(), &[]).expect("hash should succeed");

        write_file(&file, "fn ext(t):\n    return 2\n");
        let after = hash_tree_skipping(tmp.path(), &[]).expect("hash should succeed");
        assert_ne!(before, after);
    }

    #[test]
    fn test_skipped_top_level_entries_do_not_affect_digest() {
        let tmp = TempDir::new().expect("tempdir should succeed");
        write_file(&tmp.path().join("ext.tbx"), "fn ext(t):\n    return 1\n");
        let before = hash_tree_skipping(tmp.path(), &["__manifest__.toml"])
            .expect("hash should succeed");

        write_file(&tmp.path().join("__manifest__.toml"), "enabled = true\n");
        let after = hash_tree_skipping(tmp.path(), &["__manifest__.toml"])
            .expect("hash should succeed");
        assert_eq!(before, after);
    }

    #[test]
    fn test_nonexistent_path_fails() {
        assert!(hash_tree_skipping(Path::new("/nonexistent/path/that/does/not/exist"), &[]).is_err());
    }
}
