//! Filesystem primitives shared by the detector, mirror, and relocation code.

use std::collections::BTreeSet;
use std::ffi::OsString;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use futures::future::{try_join_all, BoxFuture, FutureExt};
use tokio::fs;

use mirrorbuild_core::ExclusionSet;

use crate::error::{io_err, SyncError};

/// What sits at a path, following symlinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EntryKind {
    File,
    Dir,
}

/// `Ok(None)` when nothing exists at `path`.
pub(crate) async fn probe(path: &Path) -> io::Result<Option<EntryKind>> {
    match fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => Ok(Some(EntryKind::Dir)),
        Ok(_) => Ok(Some(EntryKind::File)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}

/// Names of the direct children of `dir`, sorted.
pub(crate) async fn entry_names(dir: &Path) -> io::Result<Vec<OsString>> {
    let mut reader = fs::read_dir(dir).await?;
    let mut names = Vec::new();
    while let Some(entry) = reader.next_entry().await? {
        names.push(entry.file_name());
    }
    names.sort();
    Ok(names)
}

/// Sorted union of the children of `a` and `b`; a missing side contributes nothing.
pub(crate) async fn union_names(a: &Path, b: &Path) -> io::Result<BTreeSet<OsString>> {
    let (left, right) = tokio::join!(entry_names_or_empty(a), entry_names_or_empty(b));
    let mut names: BTreeSet<OsString> = left?.into_iter().collect();
    names.extend(right?);
    Ok(names)
}

async fn entry_names_or_empty(dir: &Path) -> io::Result<Vec<OsString>> {
    match probe(dir).await? {
        Some(EntryKind::Dir) => entry_names(dir).await,
        _ => Ok(Vec::new()),
    }
}

/// Remove a file or a whole directory. Missing paths are not an error.
pub async fn remove_path(path: &Path) -> io::Result<()> {
    let meta = match fs::symlink_metadata(path).await {
        Ok(meta) => meta,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(err),
    };
    let result = if meta.is_dir() {
        fs::remove_dir_all(path).await
    } else {
        fs::remove_file(path).await
    };
    match result {
        Err(err) if err.kind() != ErrorKind::NotFound => Err(err),
        _ => Ok(()),
    }
}

/// Make `destination` a copy of `source`, skipping excluded paths.
///
/// Directories are replaced, not merged: destination entries the source lacks
/// are removed. An absent source removes the destination. Sibling entries are
/// copied concurrently.
pub fn replace_tree<'a>(
    source: PathBuf,
    destination: PathBuf,
    exclusions: &'a ExclusionSet,
) -> BoxFuture<'a, Result<(), SyncError>> {
    async move {
        if exclusions.covers(&source) || exclusions.covers(&destination) {
            return Ok(());
        }
        let source_kind = probe(&source).await.map_err(|e| io_err(&source, e))?;
        let destination_kind = probe(&destination)
            .await
            .map_err(|e| io_err(&destination, e))?;

        match source_kind {
            None => remove_path(&destination)
                .await
                .map_err(|e| io_err(&destination, e)),
            Some(EntryKind::File) => {
                if destination_kind == Some(EntryKind::Dir) {
                    remove_path(&destination)
                        .await
                        .map_err(|e| io_err(&destination, e))?;
                }
                if let Some(parent) = destination.parent() {
                    fs::create_dir_all(parent)
                        .await
                        .map_err(|e| io_err(parent, e))?;
                }
                fs::copy(&source, &destination)
                    .await
                    .map_err(|e| io_err(&destination, e))?;
                Ok(())
            }
            Some(EntryKind::Dir) => {
                if destination_kind == Some(EntryKind::File) {
                    remove_path(&destination)
                        .await
                        .map_err(|e| io_err(&destination, e))?;
                }
                fs::create_dir_all(&destination)
                    .await
                    .map_err(|e| io_err(&destination, e))?;
                let names = union_names(&source, &destination)
                    .await
                    .map_err(|e| io_err(&source, e))?;
                try_join_all(names.into_iter().map(|name| {
                    replace_tree(source.join(&name), destination.join(&name), exclusions)
                }))
                .await?;
                Ok(())
            }
        }
    }
    .boxed()
}
