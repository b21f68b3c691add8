//! Tree mirror: converge a destination tree onto a manifest.
//!
//! ## `converge`
//!
//! 1. Enumerate source leaves for every manifest entry and destination leaves
//!    under the destination root.
//! 2. Per manifest entry, run the [`Detector`]; on drift, replace the whole
//!    destination subtree with the source subtree.
//! 3. Delete destination leaves outside every manifest entry whose relative
//!    path is not a source leaf.
//! 4. `outdated` = any step-2 drift or any step-3 deletion.
//!
//! Steps 2 and 3 touch disjoint paths and run concurrently; within each, all
//! paths fan out concurrently. A second `converge` against an unchanged
//! source reports nothing and performs no writes.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use futures::future::{join_all, try_join_all};
use serde::Serialize;
use tokio::fs;

use mirrorbuild_core::{ChangeReason, ChangeRecord, ExclusionSet, Manifest};

use crate::detect::Detector;
use crate::enumerate::leaf_paths;
use crate::error::{io_err, SyncError};
use crate::ops::{remove_path, replace_tree};

/// Immutable description of one mirror relationship.
#[derive(Debug, Clone)]
pub struct TreeMirror {
    source_root: PathBuf,
    destination_root: PathBuf,
    manifest: Manifest,
    exclusions: ExclusionSet,
}

/// What a convergence pass found and did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MirrorReport {
    /// Drifted manifest entries, one record per entry.
    pub changes: Vec<ChangeRecord>,
    /// Manifest entries (relative) whose destination subtree was replaced.
    pub copied: Vec<PathBuf>,
    /// Destination-only leaves (relative) removed in the cleanup step.
    pub removed: Vec<PathBuf>,
}

impl MirrorReport {
    /// The drift signal consumed by the build orchestrator.
    pub fn outdated(&self) -> bool {
        !self.changes.is_empty() || !self.removed.is_empty()
    }
}

impl TreeMirror {
    pub fn new(
        source_root: impl Into<PathBuf>,
        destination_root: impl Into<PathBuf>,
        manifest: Manifest,
    ) -> Self {
        Self {
            source_root: source_root.into(),
            destination_root: destination_root.into(),
            manifest,
            exclusions: ExclusionSet::default(),
        }
    }

    pub fn with_exclusions(mut self, exclusions: ExclusionSet) -> Self {
        self.exclusions = exclusions;
        self
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    pub fn destination_root(&self) -> &Path {
        &self.destination_root
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Path relative to whichever root it lives under.
    ///
    /// The destination usually sits inside the source root, so the deeper
    /// match wins.
    pub fn relative<'p>(&self, path: &'p Path) -> Option<&'p Path> {
        let from_source = path.strip_prefix(&self.source_root).ok();
        let from_destination = path.strip_prefix(&self.destination_root).ok();
        match (from_source, from_destination) {
            (Some(a), Some(b)) if b.components().count() < a.components().count() => Some(b),
            (Some(a), _) => Some(a),
            (None, b) => b,
        }
    }

    /// Converge the destination onto the manifest.
    ///
    /// Fails if a manifest entry is missing from the source or a copy/delete
    /// fails. Comparison errors never fail; they force a copy instead.
    pub async fn converge(&self) -> Result<MirrorReport, SyncError> {
        fs::create_dir_all(&self.destination_root)
            .await
            .map_err(|e| io_err(&self.destination_root, e))?;

        let (source_leaves, destination_leaves) = tokio::try_join!(
            leaf_paths(self.manifest.resolve(&self.source_root)),
            leaf_paths([self.destination_root.clone()]),
        )?;
        let stale = self.stale_leaves(&source_leaves, destination_leaves);

        let detector = Detector::new(&self.exclusions);
        let (synced, removed) = tokio::try_join!(
            try_join_all(
                self.manifest
                    .entries()
                    .iter()
                    .map(|entry| self.sync_entry(detector, entry))
            ),
            try_join_all(stale.into_iter().map(|leaf| self.remove_stale(leaf))),
        )?;

        let mut report = MirrorReport {
            removed,
            ..MirrorReport::default()
        };
        for (entry, record) in synced {
            if record.is_changed() {
                report.changes.push(record);
                report.copied.push(entry);
            }
        }
        tracing::debug!(
            destination = %self.destination_root.display(),
            changed = report.changes.len(),
            removed = report.removed.len(),
            "mirror converged"
        );
        Ok(report)
    }

    /// Drift the next `converge` would act on, without touching disk.
    ///
    /// Unlike [`converge`](Self::converge), directory records are expanded
    /// into every drifted path underneath.
    pub async fn inspect(&self) -> Result<Vec<ChangeRecord>, SyncError> {
        let source_leaves = leaf_paths(self.manifest.resolve(&self.source_root)).await?;
        let destination_leaves = match fs::metadata(&self.destination_root).await {
            Ok(meta) if meta.is_dir() => leaf_paths([self.destination_root.clone()]).await?,
            _ => BTreeSet::new(),
        };

        let detector = Detector::inspect(&self.exclusions);
        let nested = join_all(self.manifest.entries().iter().map(|entry| {
            detector.changes(
                &self.source_root.join(entry),
                &self.destination_root.join(entry),
            )
        }))
        .await;

        let mut records: Vec<ChangeRecord> = nested.into_iter().flatten().collect();
        records.extend(
            self.stale_leaves(&source_leaves, destination_leaves)
                .into_iter()
                .map(|leaf| ChangeRecord::changed(ChangeReason::Deleted, leaf)),
        );
        Ok(records)
    }

    /// Destination leaves outside every manifest entry with no source counterpart.
    ///
    /// Leaves under a manifest entry are left to that entry's detector pass,
    /// which already recurses into destination-only paths.
    fn stale_leaves(
        &self,
        source_leaves: &BTreeSet<PathBuf>,
        destination_leaves: BTreeSet<PathBuf>,
    ) -> Vec<PathBuf> {
        let source_relative: BTreeSet<&Path> = source_leaves
            .iter()
            .filter_map(|leaf| leaf.strip_prefix(&self.source_root).ok())
            .collect();

        destination_leaves
            .into_iter()
            .filter(|leaf| match leaf.strip_prefix(&self.destination_root) {
                Ok(relative) => {
                    !source_relative.contains(relative)
                        && !self.manifest.covers(relative)
                        && !self.exclusions.covers(leaf)
                }
                Err(_) => false,
            })
            .collect()
    }

    async fn sync_entry(
        &self,
        detector: Detector<'_>,
        entry: &Path,
    ) -> Result<(PathBuf, ChangeRecord), SyncError> {
        let source = self.source_root.join(entry);
        let destination = self.destination_root.join(entry);
        let record = detector.compare(&source, &destination).await;

        if let ChangeRecord::Changed { reason, path } = &record {
            let event = match reason {
                ChangeReason::Created => "path-created",
                ChangeReason::Updated => "path-changed",
                ChangeReason::Deleted => "path-deleted",
            };
            tracing::info!(
                event,
                reason = %reason,
                path = %path.display(),
                entry = %entry.display(),
                "detected change, updating copy"
            );
            replace_tree(source, destination, &self.exclusions).await?;
        }
        Ok((entry.to_path_buf(), record))
    }

    async fn remove_stale(&self, leaf: PathBuf) -> Result<PathBuf, SyncError> {
        remove_path(&leaf).await.map_err(|e| io_err(&leaf, e))?;
        let relative = leaf
            .strip_prefix(&self.destination_root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| leaf.clone());
        tracing::info!(
            event = "path-deleted",
            path = %relative.display(),
            "removed from destination, no longer in source"
        );
        Ok(relative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs as stdfs;
    use tempfile::TempDir;

    fn app() -> (TempDir, PathBuf, PathBuf) {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("app");
        let dst = tmp.path().join("mirror");
        stdfs::create_dir_all(src.join("src/components")).unwrap();
        stdfs::write(src.join("package.json"), "{}").unwrap();
        stdfs::write(src.join("src/index.ts"), "export {}").unwrap();
        stdfs::write(src.join("src/components/Pay.tsx"), "pay").unwrap();
        (tmp, src, dst)
    }

    #[tokio::test]
    async fn first_pass_copies_everything_and_is_outdated() {
        let (_tmp, src, dst) = app();
        let mirror = TreeMirror::new(&src, &dst, Manifest::new(["package.json", "src"]));

        let report = mirror.converge().await.unwrap();
        assert!(report.outdated());
        assert_eq!(
            report.copied,
            vec![PathBuf::from("package.json"), PathBuf::from("src")]
        );
        assert_eq!(
            stdfs::read_to_string(dst.join("src/components/Pay.tsx")).unwrap(),
            "pay"
        );
    }

    #[tokio::test]
    async fn second_pass_is_a_fixpoint() {
        let (_tmp, src, dst) = app();
        let mirror = TreeMirror::new(&src, &dst, Manifest::new(["package.json", "src"]));
        mirror.converge().await.unwrap();

        let report = mirror.converge().await.unwrap();
        assert!(!report.outdated(), "unexpected drift: {report:?}");
        assert_eq!(report, MirrorReport::default());
    }

    #[tokio::test]
    async fn stray_destination_file_outside_manifest_is_removed() {
        let (_tmp, src, dst) = app();
        stdfs::create_dir_all(dst.join("old")).unwrap();
        stdfs::write(dst.join("old/leftover.js"), "x").unwrap();
        let mirror = TreeMirror::new(&src, &dst, Manifest::new(["package.json"]));

        let report = mirror.converge().await.unwrap();
        assert_eq!(report.removed, vec![PathBuf::from("old/leftover.js")]);
        assert!(!dst.join("old/leftover.js").exists());
    }

    #[tokio::test]
    async fn missing_manifest_entry_fails_the_pass() {
        let (_tmp, src, dst) = app();
        let mirror = TreeMirror::new(&src, &dst, Manifest::new(["package.json", ".env.local"]));
        let err = mirror.converge().await.unwrap_err();
        assert!(err.to_string().contains(".env.local"), "got: {err}");
    }

    #[tokio::test]
    async fn inspect_reports_drift_but_changes_nothing() {
        let (_tmp, src, dst) = app();
        let mirror = TreeMirror::new(&src, &dst, Manifest::new(["package.json", "src"]));
        mirror.converge().await.unwrap();
        stdfs::write(src.join("src/index.ts"), "export const x = 1").unwrap();
        stdfs::write(dst.join("stray.txt"), "s").unwrap();

        let records = mirror.inspect().await.unwrap();
        assert_eq!(
            records,
            vec![
                ChangeRecord::changed(ChangeReason::Updated, src.join("src/index.ts")),
                ChangeRecord::changed(ChangeReason::Deleted, dst.join("stray.txt")),
            ]
        );
        assert_eq!(
            stdfs::read_to_string(dst.join("src/index.ts")).unwrap(),
            "export {}"
        );
        assert!(dst.join("stray.txt").exists());
    }

    #[test]
    fn relative_strips_either_root() {
        let (_tmp, src, dst) = app();
        let mirror = TreeMirror::new(&src, &dst, Manifest::new(["src"]));
        assert_eq!(
            mirror.relative(&src.join("src/a.ts")),
            Some(Path::new("src/a.ts"))
        );
        assert_eq!(
            mirror.relative(&dst.join("src/a.ts")),
            Some(Path::new("src/a.ts"))
        );
        assert_eq!(mirror.relative(Path::new("/elsewhere")), None);
    }

    #[test]
    fn relative_prefers_nested_destination_root() {
        let mirror = TreeMirror::new("/app", "/app/.e2e/base", Manifest::new(["src"]));
        assert_eq!(
            mirror.relative(Path::new("/app/.e2e/base/src/a.ts")),
            Some(Path::new("src/a.ts"))
        );
    }
}
