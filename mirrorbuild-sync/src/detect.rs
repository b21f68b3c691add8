//! Change detection between one source path and one destination path.
//!
//! Verdicts:
//! 1. `unchanged` — same kind on both sides, byte-identical files, and for
//!    directories every entry recursively unchanged (or both sides absent).
//! 2. `deleted` — source absent, destination present. In converge mode the
//!    destination is removed while reporting.
//! 3. `created` — source present, destination absent.
//! 4. `updated` — both present, kind or content differs.
//!
//! Directories recurse into the union of both sides' entries so that
//! destination-only files are found. Excluded paths are skipped with their
//! whole subtree. Any I/O failure during comparison is reported as `updated`
//! instead of an error.

use std::io;
use std::path::{Path, PathBuf};

use futures::future::{join_all, BoxFuture, FutureExt};
use tokio::fs;

use mirrorbuild_core::{ChangeReason, ChangeRecord, ExclusionSet};

use crate::ops::{probe, remove_path, union_names, EntryKind};

/// Whether detection may remediate deletions as it finds them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DetectMode {
    /// Remove destination-only entries while reporting them.
    #[default]
    Converge,
    /// Report only; never touch the filesystem.
    Inspect,
}

/// Compares paths under a fixed exclusion set.
#[derive(Debug, Clone, Copy)]
pub struct Detector<'a> {
    exclusions: &'a ExclusionSet,
    mode: DetectMode,
}

impl<'a> Detector<'a> {
    pub fn new(exclusions: &'a ExclusionSet) -> Self {
        Self {
            exclusions,
            mode: DetectMode::Converge,
        }
    }

    pub fn inspect(exclusions: &'a ExclusionSet) -> Self {
        Self {
            exclusions,
            mode: DetectMode::Inspect,
        }
    }

    pub fn mode(&self) -> DetectMode {
        self.mode
    }

    /// Verdict for `source` against `destination`.
    ///
    /// For directories the record names the first drifted path in sorted
    /// order; every drifted path is still visited (and remediated in
    /// converge mode).
    pub async fn compare(&self, source: &Path, destination: &Path) -> ChangeRecord {
        self.changes(source, destination)
            .await
            .into_iter()
            .next()
            .unwrap_or(ChangeRecord::Unchanged)
    }

    /// Every drifted path under `source` / `destination`, in sorted order.
    ///
    /// A directory that only exists on one side is reported once, not per file.
    pub fn changes(&self, source: &Path, destination: &Path) -> BoxFuture<'a, Vec<ChangeRecord>> {
        self.walk(source.to_path_buf(), destination.to_path_buf())
    }

    fn walk(&self, source: PathBuf, destination: PathBuf) -> BoxFuture<'a, Vec<ChangeRecord>> {
        let this = *self;
        async move {
            if this.exclusions.covers(&source) || this.exclusions.covers(&destination) {
                return Vec::new();
            }
            match this.compare_entry(&source, &destination).await {
                Ok(records) => records,
                Err(err) => {
                    tracing::warn!(
                        event = "path-changed",
                        path = %source.display(),
                        error = %err,
                        "comparison failed, treating as changed"
                    );
                    vec![ChangeRecord::changed(ChangeReason::Updated, source)]
                }
            }
        }
        .boxed()
    }

    async fn compare_entry(
        &self,
        source: &Path,
        destination: &Path,
    ) -> io::Result<Vec<ChangeRecord>> {
        let (source_kind, destination_kind) = tokio::join!(probe(source), probe(destination));
        let record = match (source_kind?, destination_kind?) {
            (None, None) => return Ok(Vec::new()),
            (None, Some(_)) => {
                if self.mode == DetectMode::Converge {
                    remove_path(destination).await?;
                    tracing::info!(
                        event = "path-deleted",
                        path = %destination.display(),
                        "removed, no longer in source"
                    );
                }
                ChangeRecord::changed(ChangeReason::Deleted, destination)
            }
            (Some(_), None) => ChangeRecord::changed(ChangeReason::Created, source),
            (Some(EntryKind::Dir), Some(EntryKind::Dir)) => {
                return self.compare_dirs(source, destination).await;
            }
            (Some(EntryKind::File), Some(EntryKind::File)) => {
                let (left, right) = tokio::try_join!(fs::read(source), fs::read(destination))?;
                if left == right {
                    return Ok(Vec::new());
                }
                ChangeRecord::changed(ChangeReason::Updated, source)
            }
            _ => ChangeRecord::changed(ChangeReason::Updated, source),
        };
        tracing::debug!(event = "path-changed", ?record, "drift detected");
        Ok(vec![record])
    }

    async fn compare_dirs(
        &self,
        source: &Path,
        destination: &Path,
    ) -> io::Result<Vec<ChangeRecord>> {
        let names = union_names(source, destination).await?;
        let nested = join_all(
            names
                .into_iter()
                .map(|name| self.walk(source.join(&name), destination.join(&name))),
        )
        .await;
        Ok(nested.into_iter().flatten().collect())
    }
}
