//! Unified diff preview of mirror drift, for `mirrorbuild diff`.
//!
//! No files are written.

use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use futures::future::try_join_all;
use similar::TextDiff;
use tokio::fs;

use mirrorbuild_core::ChangeRecord;

use crate::{enumerate::leaf_paths, error::io_err, mirror::TreeMirror, SyncError};

/// A single drifted file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDiff {
    /// Path relative to the mirror roots.
    pub path: PathBuf,
    pub unified_diff: String,
}

/// Diff every drifted leaf between the mirror's destination (`a/`) and
/// source (`b/`), i.e. what the next convergence would apply.
pub async fn diff_tree(mirror: &TreeMirror) -> Result<Vec<FileDiff>, SyncError> {
    let records = mirror.inspect().await?;

    let mut relative: BTreeSet<PathBuf> = BTreeSet::new();
    for record in &records {
        let ChangeRecord::Changed { path, .. } = record else {
            continue;
        };
        let Some(rel) = mirror.relative(path) else {
            continue;
        };
        relative.extend(drifted_leaves(mirror, rel).await?);
    }

    let diffs = try_join_all(relative.into_iter().map(|rel| diff_leaf(mirror, rel))).await?;
    Ok(diffs.into_iter().flatten().collect())
}

/// Leaves under `rel` on either side; a directory record expands to its files.
async fn drifted_leaves(mirror: &TreeMirror, rel: &Path) -> Result<Vec<PathBuf>, SyncError> {
    let mut leaves = Vec::new();
    for root in [mirror.source_root(), mirror.destination_root()] {
        let path = root.join(rel);
        if fs::metadata(&path).await.is_err() {
            continue;
        }
        for leaf in leaf_paths([path]).await? {
            if let Ok(stripped) = leaf.strip_prefix(root) {
                leaves.push(stripped.to_path_buf());
            }
        }
    }
    Ok(leaves)
}

async fn diff_leaf(mirror: &TreeMirror, rel: PathBuf) -> Result<Option<FileDiff>, SyncError> {
    let destination = mirror.destination_root().join(&rel);
    let source = mirror.source_root().join(&rel);
    let (current, incoming) =
        tokio::try_join!(read_or_empty(&destination), read_or_empty(&source))?;
    if current == incoming {
        return Ok(None);
    }

    let old_header = format!("a/{}", rel.display());
    let new_header = format!("b/{}", rel.display());
    let unified_diff = match (std::str::from_utf8(&current), std::str::from_utf8(&incoming)) {
        (Ok(old), Ok(new)) => TextDiff::from_lines(old, new)
            .unified_diff()
            .header(&old_header, &new_header)
            .context_radius(3)
            .to_string(),
        _ => format!("Binary files {old_header} and {new_header} differ\n"),
    };

    Ok(Some(FileDiff {
        path: rel,
        unified_diff,
    }))
}

async fn read_or_empty(path: &Path) -> Result<Vec<u8>, SyncError> {
    match fs::read(path).await {
        Ok(content) => Ok(content),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(Vec::new()),
        Err(err) => Err(io_err(path, err)),
    }
}
