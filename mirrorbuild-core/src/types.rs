//! Domain types for the mirror-and-build pipeline.
//!
//! All path fields use `PathBuf`; never `&str` or `String` for filesystem paths.
//! Manifest entries and patch targets are relative to a tree root; exclusion
//! sets hold absolute paths.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Manifest
// ---------------------------------------------------------------------------

/// Ordered set of root-relative paths that make up "the application".
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest(Vec<PathBuf>);

impl Manifest {
    /// Build a manifest, dropping exact duplicates while keeping first-seen order.
    pub fn new<I, P>(entries: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut seen = BTreeSet::new();
        let mut ordered = Vec::new();
        for entry in entries {
            let entry = entry.into();
            if seen.insert(entry.clone()) {
                ordered.push(entry);
            }
        }
        Self(ordered)
    }

    pub fn entries(&self) -> &[PathBuf] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Join every entry onto `root`.
    pub fn resolve(&self, root: &Path) -> Vec<PathBuf> {
        self.0.iter().map(|entry| root.join(entry)).collect()
    }

    /// True when `relative` is an entry or lies underneath one.
    pub fn covers(&self, relative: &Path) -> bool {
        self.0.iter().any(|entry| relative.starts_with(entry))
    }
}

// ---------------------------------------------------------------------------
// Exclusion set
// ---------------------------------------------------------------------------

/// Absolute paths that change detection and copy/delete must never touch.
///
/// A path is covered when it, or any of its ancestors, is in the set, so
/// excluding a directory protects its whole subtree.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExclusionSet(BTreeSet<PathBuf>);

impl ExclusionSet {
    pub fn new<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self(paths.into_iter().map(Into::into).collect())
    }

    /// Resolve root-relative exclusions against each of `roots`.
    ///
    /// The mirror excludes the same relative path on both the source and the
    /// destination side.
    pub fn from_relative(relative: &[PathBuf], roots: &[&Path]) -> Self {
        Self(
            roots
                .iter()
                .flat_map(|root| relative.iter().map(move |rel| root.join(rel)))
                .collect(),
        )
    }

    pub fn covers(&self, path: &Path) -> bool {
        !self.0.is_empty() && path.ancestors().any(|ancestor| self.0.contains(ancestor))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PathBuf> {
        self.0.iter()
    }
}

// ---------------------------------------------------------------------------
// Change records
// ---------------------------------------------------------------------------

/// Why a path was reported as drifted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeReason {
    /// Present in the source, absent at the destination.
    Created,
    /// Present on both sides with different content or kind.
    Updated,
    /// Absent from the source, present at the destination.
    Deleted,
}

impl fmt::Display for ChangeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            ChangeReason::Created => "created",
            ChangeReason::Updated => "updated",
            ChangeReason::Deleted => "deleted",
        })
    }
}

/// Verdict of comparing one source path against one destination path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ChangeRecord {
    Unchanged,
    Changed {
        reason: ChangeReason,
        /// The path that triggered the verdict (source side for
        /// created/updated, destination side for deleted).
        path: PathBuf,
    },
}

impl ChangeRecord {
    pub fn changed(reason: ChangeReason, path: impl Into<PathBuf>) -> Self {
        Self::Changed {
            reason,
            path: path.into(),
        }
    }

    pub fn is_changed(&self) -> bool {
        matches!(self, Self::Changed { .. })
    }

    pub fn reason(&self) -> Option<ChangeReason> {
        match self {
            Self::Unchanged => None,
            Self::Changed { reason, .. } => Some(*reason),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Unchanged => None,
            Self::Changed { path, .. } => Some(path),
        }
    }
}

// ---------------------------------------------------------------------------
// Patch rules
// ---------------------------------------------------------------------------

/// A single textual substitution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplaceSpec {
    pub pattern: String,
    /// Treat `pattern` as a regular expression instead of literal text.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub regex: bool,
    pub with: String,
}

/// What to do to a patch target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatchAction {
    /// Replace every occurrence of a pattern.
    Replace(ReplaceSpec),
    /// Replace the whole file content.
    Overwrite(String),
}

/// One entry of the ordered patch list applied to a variant tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchRule {
    /// Path relative to the variant root.
    pub file: PathBuf,
    #[serde(flatten)]
    pub action: PatchAction,
}

impl PatchRule {
    pub fn replace(file: impl Into<PathBuf>, pattern: &str, with: &str) -> Self {
        Self {
            file: file.into(),
            action: PatchAction::Replace(ReplaceSpec {
                pattern: pattern.to_owned(),
                regex: false,
                with: with.to_owned(),
            }),
        }
    }

    pub fn replace_regex(file: impl Into<PathBuf>, pattern: &str, with: &str) -> Self {
        Self {
            file: file.into(),
            action: PatchAction::Replace(ReplaceSpec {
                pattern: pattern.to_owned(),
                regex: true,
                with: with.to_owned(),
            }),
        }
    }

    pub fn overwrite(file: impl Into<PathBuf>, content: &str) -> Self {
        Self {
            file: file.into(),
            action: PatchAction::Overwrite(content.to_owned()),
        }
    }
}

// ---------------------------------------------------------------------------
// Build / serve settings
// ---------------------------------------------------------------------------

/// How to invoke the compile step and where it leaves its output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Program followed by its arguments; run with the variant root as cwd.
    pub command: Vec<String>,
    /// Compile output directory, relative to the variant root.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".next")
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            command: vec!["npm".into(), "run".into(), "build".into()],
            output_dir: default_output_dir(),
        }
    }
}

/// Test server settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ServeConfig {
    /// Listen port; `0` asks the OS for an ephemeral port.
    #[serde(default)]
    pub port: u16,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
