//! Recursive copy and removal helpers.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{IoResultExt, Result};

/// Copy a directory tree into `dst`, creating it. `.git` directories are skipped.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst).at_path(dst)?;
    for entry in fs::read_dir(src).at_path(src)? {
        let entry = entry.at_path(src)?;
        let file_name = entry.file_name();
        if file_name == ".git" {
            continue;
        }
        let src_path = entry.path();
        let dst_path = dst.join(&file_name);
        if src_path.is_dir() {
            copy_tree(&src_path, &dst_path)?;
        } else {
            fs::copy(&src_path, &dst_path).at_path(&src_path)?;
        }
    }
    Ok(())
}

/// Remove a directory tree if present. Returns whether anything was removed.
pub fn remove_tree(path: &Path) -> Result<bool> {
    if !path.exists() {
        return Ok(false);
    }
    fs::remove_dir_all(path).at_path(path)?;
    Ok(true)
}

/// Immediate subdirectory names of `dir`, sorted. A missing directory has none.
pub fn list_subdirs(dir: &Path) -> Result<Vec<String>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in fs::read_dir(dir).at_path(dir)? {
        let entry = entry.at_path(dir)?;
        if entry.file_type().at_path(&entry.path())?.is_dir() {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
    }
    names.sort();
    Ok(names)
}

/// All files under `dir` with the given suffix, depth-first with entries in
/// alphabetical order at each level.
pub fn files_with_suffix(dir: &Path, suffix: &str) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    collect_files(dir, suffix, &mut found)?;
    Ok(found)
}

fn collect_files(dir: &Path, suffix: &str, found: &mut Vec<PathBuf>) -> Result<()> {
    let mut entries: Vec<_> = fs::read_dir(dir)
        .at_path(dir)?
        .collect::<std::io::Result<Vec<_>>>()
        .at_path(dir)?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let path = entry.path();
        if path.is_dir() {
            collect_files(&path, suffix, found)?;
        } else if path
            .extension()
            .is_some_and(|ext| ext.to_string_lossy() == suffix)
        {
            found.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_copy_tree_keeps_nesting_and_skips_git() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        fs::create_dir_all(src.join("deep/nested")).unwrap();
        fs::create_dir_all(src.join(".git")).unwrap();
        fs::write(src.join("top.tbx"), "top").unwrap();
        fs::write(src.join("deep/nested/inner.tbx"), "inner").unwrap();
        fs::write(src.join(".git/HEAD"), "ref").unwrap();

        let dst = tmp.path().join("dst");
        copy_tree(&src, &dst).unwrap();

        assert!(dst.join("top.tbx").exists());
        assert!(dst.join("deep/nested/inner.tbx").exists());
        assert!(!dst.join(".git").exists());
    }

    #[test]
    fn test_files_with_suffix_is_depth_first_alphabetical() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("a_dir")).unwrap();
        fs::write(tmp.path().join("a_dir/inner.tbx"), "").unwrap();
        fs::write(tmp.path().join("b.tbx"), "").unwrap();
        fs::write(tmp.path().join("c.txt"), "").unwrap();

        let files = files_with_suffix(tmp.path(), "tbx").unwrap();
        let rel: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(tmp.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            rel,
            vec![PathBuf::from("a_dir/inner.tbx"), PathBuf::from("b.tbx")]
        );
    }

    #[test]
    fn test_list_subdirs_missing_dir_is_empty() {
        let tmp = TempDir::new().unwrap();
        assert!(list_subdirs(&tmp.path().join("nope")).unwrap().is_empty());
    }

    #[test]
    fn test_remove_tree_reports_absence() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("gone");
        fs::create_dir_all(&dir).unwrap();
        assert!(remove_tree(&dir).unwrap());
        assert!(!remove_tree(&dir).unwrap());
    }
}
