//! Variant patching: deterministic text substitutions on a mirrored tree.
//!
//! Two primitives per file, [`PatchTarget::replace`] and
//! [`PatchTarget::overwrite`]. [`Patcher::apply`] runs an ordered rule list:
//! rules for different files run concurrently, rules for the same file run
//! strictly in list order. Re-applying a rule whose pattern no longer matches
//! is a no-op, so a patched tree is a fixpoint of its own rule list.

use std::borrow::Cow;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use futures::future::try_join_all;
use regex::Regex;
use tokio::fs;

use mirrorbuild_core::{PatchAction, PatchRule, ReplaceSpec};

use crate::error::{io_err, SyncError};
use crate::writer::{atomic_write, WriteResult};

/// Search side of a `replace`.
#[derive(Debug, Clone)]
pub enum Pattern {
    Literal(String),
    Regex(Regex),
}

impl Pattern {
    pub fn literal(text: impl Into<String>) -> Self {
        Self::Literal(text.into())
    }

    pub fn regex(expr: &str) -> Result<Self, SyncError> {
        Regex::new(expr)
            .map(Self::Regex)
            .map_err(|source| SyncError::Pattern {
                pattern: expr.to_owned(),
                source,
            })
    }

    pub fn from_spec(spec: &ReplaceSpec) -> Result<Self, SyncError> {
        if spec.regex {
            Self::regex(&spec.pattern)
        } else {
            Ok(Self::literal(spec.pattern.clone()))
        }
    }

    /// Replace every match; `None` when nothing matched.
    ///
    /// Regex replacements expand `$1`-style capture references.
    fn replace_all<'t>(&self, text: &'t str, replacement: &str) -> Option<(Cow<'t, str>, usize)> {
        match self {
            Self::Literal(needle) => {
                let count = text.matches(needle.as_str()).count();
                (count > 0).then(|| (Cow::Owned(text.replace(needle.as_str(), replacement)), count))
            }
            Self::Regex(re) => {
                let count = re.find_iter(text).count();
                (count > 0).then(|| (re.replace_all(text, replacement), count))
            }
        }
    }
}

/// What a single patch operation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchOutcome {
    /// `replace` matched and the file was rewritten.
    Replaced { path: PathBuf, matches: usize },
    /// `overwrite` changed the file content.
    Overwritten { path: PathBuf },
    /// Nothing matched, or the content was already in place.
    NoOp { path: PathBuf },
}

impl PatchOutcome {
    pub fn path(&self) -> &Path {
        match self {
            Self::Replaced { path, .. } | Self::Overwritten { path } | Self::NoOp { path } => path,
        }
    }

    pub fn is_noop(&self) -> bool {
        matches!(self, Self::NoOp { .. })
    }
}

/// Patch entry point for one tree root.
#[derive(Debug, Clone)]
pub struct Patcher {
    root: PathBuf,
}

impl Patcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Address one file, relative to the root.
    pub fn file(&self, relative: impl AsRef<Path>) -> PatchTarget {
        PatchTarget {
            path: self.root.join(relative),
        }
    }

    /// Apply `rules`, returning one outcome per rule in rule order.
    ///
    /// Fails on the first missing target or invalid pattern; every pattern is
    /// compiled before any file is touched.
    pub async fn apply(&self, rules: &[PatchRule]) -> Result<Vec<PatchOutcome>, SyncError> {
        let mut groups: Vec<(PathBuf, Vec<(usize, Operation<'_>)>)> = Vec::new();
        for (index, rule) in rules.iter().enumerate() {
            let op = match &rule.action {
                PatchAction::Replace(spec) => Operation::Replace {
                    pattern: Pattern::from_spec(spec)?,
                    with: &spec.with,
                },
                PatchAction::Overwrite(content) => Operation::Overwrite(content),
            };
            match groups.iter_mut().find(|(file, _)| *file == rule.file) {
                Some((_, ops)) => ops.push((index, op)),
                None => groups.push((rule.file.clone(), vec![(index, op)])),
            }
        }

        let per_file = try_join_all(groups.into_iter().map(|(file, ops)| {
            let target = self.file(&file);
            async move {
                let mut outcomes = Vec::with_capacity(ops.len());
                for (index, op) in ops {
                    let outcome = match op {
                        Operation::Replace { pattern, with } => {
                            target.replace(&pattern, with).await?
                        }
                        Operation::Overwrite(content) => target.overwrite(content).await?,
                    };
                    outcomes.push((index, outcome));
                }
                Ok::<_, SyncError>(outcomes)
            }
        }))
        .await?;

        let mut outcomes: Vec<(usize, PatchOutcome)> = per_file.into_iter().flatten().collect();
        outcomes.sort_by_key(|(index, _)| *index);
        Ok(outcomes.into_iter().map(|(_, outcome)| outcome).collect())
    }
}

enum Operation<'r> {
    Replace { pattern: Pattern, with: &'r str },
    Overwrite(&'r str),
}

/// One file inside a patched tree.
#[derive(Debug, Clone)]
pub struct PatchTarget {
    path: PathBuf,
}

impl PatchTarget {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace every occurrence of `pattern` with `replacement`.
    ///
    /// The file must exist. No match leaves the file untouched.
    pub async fn replace(
        &self,
        pattern: &Pattern,
        replacement: &str,
    ) -> Result<PatchOutcome, SyncError> {
        let text = match fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(SyncError::PatchTargetMissing {
                    path: self.path.clone(),
                })
            }
            Err(err) => return Err(io_err(&self.path, err)),
        };

        let Some((patched, matches)) = pattern.replace_all(&text, replacement) else {
            tracing::debug!(event = "patch-noop", path = %self.path.display(), "pattern not found");
            return Ok(PatchOutcome::NoOp {
                path: self.path.clone(),
            });
        };

        match atomic_write(&self.path, &patched).await? {
            WriteResult::Unchanged { path } => Ok(PatchOutcome::NoOp { path }),
            WriteResult::Written { path } => {
                tracing::info!(
                    event = "patch-applied",
                    path = %path.display(),
                    matches,
                    "replaced"
                );
                Ok(PatchOutcome::Replaced { path, matches })
            }
        }
    }

    /// Replace the whole file content. The parent directory must exist.
    pub async fn overwrite(&self, content: &str) -> Result<PatchOutcome, SyncError> {
        let parent_is_dir = match self.path.parent() {
            Some(parent) => match fs::metadata(parent).await {
                Ok(meta) => meta.is_dir(),
                Err(err) if err.kind() == ErrorKind::NotFound => false,
                Err(err) => return Err(io_err(parent, err)),
            },
            None => false,
        };
        if !parent_is_dir {
            return Err(SyncError::PatchTargetMissing {
                path: self.path.clone(),
            });
        }

        match atomic_write(&self.path, content).await? {
            WriteResult::Unchanged { path } => {
                tracing::debug!(event = "patch-noop", path = %path.display(), "already in place");
                Ok(PatchOutcome::NoOp { path })
            }
            WriteResult::Written { path } => {
                tracing::info!(event = "patch-applied", path = %path.display(), "overwritten");
                Ok(PatchOutcome::Overwritten { path })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs as stdfs;
    use tempfile::TempDir;

    const PROVIDER: &str = r#"const Braintree = dynamic(() => import("./Braintree"))
export default function PaymentProvider() { return <Braintree /> }
"#;

    fn tree() -> (TempDir, Patcher) {
        let tmp = TempDir::new().unwrap();
        let components = tmp.path().join("src/components");
        stdfs::create_dir_all(&components).unwrap();
        stdfs::write(components.join("PaymentProvider.tsx"), PROVIDER).unwrap();
        let patcher = Patcher::new(tmp.path());
        (tmp, patcher)
    }

    #[tokio::test]
    async fn regex_replace_then_noop_on_reapply() {
        let (tmp, patcher) = tree();
        let target = patcher.file("src/components/PaymentProvider.tsx");
        let pattern = Pattern::regex(r#"import\("\./Braintree"\)"#).unwrap();

        let first = target
            .replace(&pattern, r#"import("./MockedBraintree")"#)
            .await
            .unwrap();
        assert!(matches!(first, PatchOutcome::Replaced { matches: 1, .. }));

        let second = target
            .replace(&pattern, r#"import("./MockedBraintree")"#)
            .await
            .unwrap();
        assert!(second.is_noop());

        let text =
            stdfs::read_to_string(tmp.path().join("src/components/PaymentProvider.tsx")).unwrap();
        assert!(text.contains(r#"import("./MockedBraintree")"#));
        assert!(!text.contains(r#"import("./Braintree")"#));
    }

    #[tokio::test]
    async fn literal_replace_hits_every_occurrence() {
        let (tmp, patcher) = tree();
        stdfs::write(tmp.path().join("env.ts"), "KEY=live\nOTHER=live\n").unwrap();

        let outcome = patcher
            .file("env.ts")
            .replace(&Pattern::literal("live"), "sandbox")
            .await
            .unwrap();
        assert!(matches!(outcome, PatchOutcome::Replaced { matches: 2, .. }));
        assert_eq!(
            stdfs::read_to_string(tmp.path().join("env.ts")).unwrap(),
            "KEY=sandbox\nOTHER=sandbox\n"
        );
    }

    #[tokio::test]
    async fn replace_on_missing_file_fails() {
        let (_tmp, patcher) = tree();
        let err = patcher
            .file("src/nope.ts")
            .replace(&Pattern::literal("x"), "y")
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::PatchTargetMissing { .. }), "got: {err}");
    }

    #[tokio::test]
    async fn overwrite_needs_parent_but_not_file() {
        let (tmp, patcher) = tree();
        let created = patcher
            .file("src/components/token.ts")
            .overwrite("export const token = 'fake'\n")
            .await
            .unwrap();
        assert!(matches!(created, PatchOutcome::Overwritten { .. }));
        assert!(tmp.path().join("src/components/token.ts").exists());

        let err = patcher
            .file("src/lib/token.ts")
            .overwrite("x")
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::PatchTargetMissing { .. }), "got: {err}");
    }

    #[tokio::test]
    async fn same_file_rules_apply_in_order() {
        let (tmp, patcher) = tree();
        stdfs::write(tmp.path().join("a.ts"), "one").unwrap();
        let rules = vec![
            PatchRule::overwrite("a.ts", "two"),
            PatchRule::replace("a.ts", "two", "three"),
            PatchRule::replace_regex("src/components/PaymentProvider.tsx", "Braintree", "Mock"),
            PatchRule::replace("a.ts", "three", "four"),
        ];

        let outcomes = patcher.apply(&rules).await.unwrap();
        assert_eq!(outcomes.len(), 4);
        assert!(matches!(outcomes[0], PatchOutcome::Overwritten { .. }));
        assert!(matches!(outcomes[2], PatchOutcome::Replaced { matches: 3, .. }));
        assert_eq!(stdfs::read_to_string(tmp.path().join("a.ts")).unwrap(), "four");
    }

    #[tokio::test]
    async fn invalid_regex_fails_before_touching_files() {
        let (tmp, patcher) = tree();
        stdfs::write(tmp.path().join("a.ts"), "one").unwrap();
        let rules = vec![
            PatchRule::overwrite("a.ts", "two"),
            PatchRule::replace_regex("a.ts", "(unclosed", "x"),
        ];
        let err = patcher.apply(&rules).await.unwrap_err();
        assert!(matches!(err, SyncError::Pattern { .. }), "got: {err}");
        assert_eq!(stdfs::read_to_string(tmp.path().join("a.ts")).unwrap(), "one");
    }
}
