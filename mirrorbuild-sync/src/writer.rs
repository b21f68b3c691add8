//! Atomic, content-gated file writes.
//!
//! ## `atomic_write` protocol
//!
//! 1. Read the current content (absent counts as empty-and-different).
//! 2. Compare with the new content → skip if identical.
//! 3. Write to `<path>.mirrorbuild.tmp`.
//! 4. Rename to final path (atomic on POSIX).
//!
//! Readers of `path` see either the old or the new content, never a torn write.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;

use crate::error::{io_err, SyncError};

/// Outcome of an individual file write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteResult {
    /// File was written (content changed or did not previously exist).
    Written { path: PathBuf },
    /// File was skipped — on-disk content already matches.
    Unchanged { path: PathBuf },
}

/// Atomically replace the content of `path`.
///
/// The parent directory must already exist; it is not created.
pub async fn atomic_write(path: &Path, content: &str) -> Result<WriteResult, SyncError> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".mirrorbuild.tmp");
    atomic_write_with_tmp(path, content, &PathBuf::from(tmp)).await
}

async fn atomic_write_with_tmp(
    path: &Path,
    content: &str,
    tmp: &Path,
) -> Result<WriteResult, SyncError> {
    match fs::read(path).await {
        Ok(existing) if existing == content.as_bytes() => {
            tracing::debug!("unchanged: {}", path.display());
            return Ok(WriteResult::Unchanged {
                path: path.to_path_buf(),
            });
        }
        Ok(_) => {}
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => return Err(io_err(path, err)),
    }

    fs::write(tmp, content).await.map_err(|e| io_err(tmp, e))?;

    if let Err(e) = fs::rename(tmp, path).await {
        let _ = fs::remove_file(tmp).await;
        return Err(io_err(path, e));
    }

    tracing::debug!("wrote: {}", path.display());
    Ok(WriteResult::Written {
        path: path.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs as stdfs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn first_write_returns_written() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("token.ts");
        let result = atomic_write(&path, "hello").await.unwrap();
        assert!(matches!(result, WriteResult::Written { .. }));
        assert_eq!(stdfs::read_to_string(&path).unwrap(), "hello");
    }

    #[tokio::test]
    async fn second_write_same_content_returns_unchanged() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("token.ts");
        atomic_write(&path, "same content").await.unwrap();
        let result = atomic_write(&path, "same content").await.unwrap();
        assert!(matches!(result, WriteResult::Unchanged { .. }));
    }

    #[tokio::test]
    async fn tmp_file_removed_after_write() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("clean.ts");
        atomic_write(&path, "data").await.unwrap();
        let tmp_path = PathBuf::from(format!("{}.mirrorbuild.tmp", path.display()));
        assert!(!tmp_path.exists(), ".mirrorbuild.tmp must be cleaned up");
    }

    #[tokio::test]
    async fn missing_parent_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("no-such-dir").join("file.ts");
        let err = atomic_write(&path, "x").await.unwrap_err();
        assert!(matches!(err, SyncError::Io { .. }), "got: {err}");
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn rename_failure_leaves_original_and_cleans_tmp() {
        use std::os::unix::fs::PermissionsExt;

        let root = TempDir::new().unwrap();
        let readonly_dir = root.path().join("readonly");
        stdfs::create_dir_all(&readonly_dir).unwrap();

        let path = readonly_dir.join("file.ts");
        stdfs::write(&path, "original").unwrap();

        let mut perms = stdfs::metadata(&readonly_dir).unwrap().permissions();
        perms.set_mode(0o555);
        stdfs::set_permissions(&readonly_dir, perms).unwrap();

        let tmp_dir = TempDir::new().unwrap();
        let tmp_path = tmp_dir.path().join("file.ts.mirrorbuild.tmp");

        let result = atomic_write_with_tmp(&path, "new content", &tmp_path).await;

        let mut perms = stdfs::metadata(&readonly_dir).unwrap().permissions();
        perms.set_mode(0o755);
        stdfs::set_permissions(&readonly_dir, perms).unwrap();

        // A privileged user can rename into a read-only directory.
        if result.is_err() {
            let current = stdfs::read_to_string(&path).unwrap();
            assert_eq!(current, "original", "original file should be intact");
            assert!(!tmp_path.exists(), ".mirrorbuild.tmp should be cleaned up");
        }
    }
}
