//! Filesystem utilities.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use glob::glob;
use walkdir::WalkDir;

/// Ensure a directory exists, creating it if necessary.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("failed to create directory: {}", path.display()))?;
    }
    Ok(())
}

/// Read a file to string, with nice error messages.
pub fn read_to_string(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .with_context(|| format!("failed to read file: {}", path.display()))
}

/// Write `contents` to `path` only if the file is missing or its bytes differ.
///
/// Returns `true` if the file was written. An unchanged file keeps its
/// modification time, so incremental builds are not invalidated.
pub fn update_file(path: &Path, contents: &str) -> Result<bool> {
    if let Ok(existing) = fs::read(path) {
        if existing == contents.as_bytes() {
            return Ok(false);
        }
    }

    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }

    tracing::info!("Writing {}", path.display());
    fs::write(path, contents)
        .with_context(|| format!("failed to write file: {}", path.display()))?;
    Ok(true)
}

/// Copy a single file unless the destination already exists.
///
/// Returns `true` if the file was copied.
pub fn copy_file_additive(src: &Path, dst: &Path) -> Result<bool> {
    if dst.exists() {
        tracing::debug!("Keeping existing {}", dst.display());
        return Ok(false);
    }
    if let Some(parent) = dst.parent() {
        ensure_dir(parent)?;
    }
    fs::copy(src, dst)
        .with_context(|| format!("failed to copy {} to {}", src.display(), dst.display()))?;
    Ok(true)
}

/// Recursively copy a directory, never touching files already present at the destination.
///
/// Returns the number of files copied.
pub fn copy_tree_additive(src: &Path, dst: &Path) -> Result<usize> {
    ensure_dir(dst)?;

    let mut copied = 0;
    for entry in WalkDir::new(src).follow_links(true).sort_by_file_name() {
        let entry =
            entry.with_context(|| format!("failed to read directory: {}", src.display()))?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .with_context(|| format!("unexpected path outside {}", src.display()))?;
        let target = dst.join(rel);

        if entry.file_type().is_dir() {
            ensure_dir(&target)?;
        } else if copy_file_additive(entry.path(), &target)? {
            copied += 1;
        }
    }

    Ok(copied)
}

/// Find files matching glob patterns relative to a base directory.
pub fn glob_files(base: &Path, patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut results = Vec::new();

    for pattern in patterns {
        let full_pattern = base.join(pattern);
        let pattern_str = full_pattern.to_string_lossy();

        for entry in glob(&pattern_str)
            .with_context(|| format!("invalid glob pattern: {}", pattern))?
        {
            match entry {
                Ok(path) => {
                    if path.is_file() {
                        results.push(path);
                    }
                }
                Err(e) => {
                    tracing::warn!("glob error: {}", e);
                }
            }
        }
    }

    results.sort();
    results.dedup();
    Ok(results)
}

/// Canonicalize a path, but don't fail if it doesn't exist yet.
/// Returns the path as-is if canonicalization fails.
pub fn normalize_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// Get the relative path from `base` to `path`.
pub fn relative_path(base: &Path, path: &Path) -> PathBuf {
    pathdiff::diff_paths(path, base).unwrap_or_else(|| path.to_path_buf())
}

/// Point `link` at `target`, replacing a previous symlink at that location.
///
/// A real file or directory at `link` is left alone and reported as an error.
pub fn replace_symlink(target: &Path, link: &Path) -> Result<()> {
    if let Ok(meta) = fs::symlink_metadata(link) {
        if meta.file_type().is_symlink() {
            remove_symlink(link)
                .with_context(|| format!("failed to remove stale link: {}", link.display()))?;
        } else {
            anyhow::bail!(
                "refusing to replace {} with a symlink: path exists and is not a link",
                link.display()
            );
        }
    }

    symlink(target, link).with_context(|| {
        format!(
            "failed to link {} -> {}",
            link.display(),
            target.display()
        )
    })
}

#[cfg(unix)]
fn remove_symlink(link: &Path) -> io::Result<()> {
    fs::remove_file(link)
}

#[cfg(windows)]
fn remove_symlink(link: &Path) -> io::Result<()> {
    fs::remove_dir(link).or_else(|_| fs::remove_file(link))
}

/// Create a symlink (platform-aware).
#[cfg(unix)]
pub fn symlink(src: &Path, dst: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(src, dst)
}

#[cfg(windows)]
pub fn symlink(src: &Path, dst: &Path) -> io::Result<()> {
    if src.is_dir() {
        std::os::windows::fs::symlink_dir(src, dst)
    } else {
        std::os::windows::fs::symlink_file(src, dst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_update_file_only_writes_on_change() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("gen").join("utility.cmake");

        assert!(update_file(&path, "add_library(utility OBJECT)\n").unwrap());
        let first = fs::metadata(&path).unwrap().modified().unwrap();

        std::thread::sleep(Duration::from_millis(20));
        assert!(!update_file(&path, "add_library(utility OBJECT)\n").unwrap());
        let second = fs::metadata(&path).unwrap().modified().unwrap();
        assert_eq!(first, second);

        assert!(update_file(&path, "add_library(core OBJECT)\n").unwrap());
        assert_eq!(read_to_string(&path).unwrap(), "add_library(core OBJECT)\n");
    }

    #[test]
    fn test_copy_tree_additive_keeps_existing_files() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        let dst = tmp.path().join("dst");

        fs::create_dir_all(src.join("demo")).unwrap();
        fs::write(src.join("demo/a.py"), "new").unwrap();
        fs::write(src.join("b.py"), "fresh").unwrap();
        fs::create_dir_all(dst.join("demo")).unwrap();
        fs::write(dst.join("demo/a.py"), "old").unwrap();

        let copied = copy_tree_additive(&src, &dst).unwrap();

        assert_eq!(copied, 1);
        assert_eq!(fs::read_to_string(dst.join("demo/a.py")).unwrap(), "old");
        assert_eq!(fs::read_to_string(dst.join("b.py")).unwrap(), "fresh");
    }

    #[test]
    fn test_glob_files() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("core.1.src.settings"), "").unwrap();
        fs::write(tmp.path().join("utility.src.settings"), "").unwrap();
        fs::write(tmp.path().join("readme.txt"), "").unwrap();

        let files = glob_files(tmp.path(), &["*.src.settings".to_string()]).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("core.1.src.settings"));
    }

    #[cfg(unix)]
    #[test]
    fn test_replace_symlink() {
        let tmp = TempDir::new().unwrap();
        let first = tmp.path().join("first");
        let second = tmp.path().join("second");
        let link = tmp.path().join("link");
        fs::create_dir_all(&first).unwrap();
        fs::create_dir_all(&second).unwrap();

        replace_symlink(&first, &link).unwrap();
        replace_symlink(&second, &link).unwrap();
        assert_eq!(fs::read_link(&link).unwrap(), second);

        let plain = tmp.path().join("plain");
        fs::create_dir_all(&plain).unwrap();
        assert!(replace_symlink(&first, &plain).is_err());
    }
}
