//! Pipeline driver: mirror → clone → patch → conditional build.
//!
//! Stage order is the only ordering the run imposes; each stage fans out
//! internally. The rebuild decision comes from the base mirror's drift plus
//! two artifact checks (cache present, stamp matches the patch set); the
//! variant clone's own drift is reported but never gates the build.
//!
//! Drift must survive until a build succeeds. Any base convergence that
//! changed something removes the build stamp, and so does opening the gate,
//! so a `mirror` without a build or a failed compile leaves the next run
//! with [`RebuildReason::NoSuccessfulBuild`].

use std::fmt;
use std::path::PathBuf;

use chrono::Utc;
use serde::Serialize;
use tokio::fs;

use mirrorbuild_core::{Manifest, PipelineConfig, WorkspaceLayout};
use mirrorbuild_sync::{MirrorReport, PatchOutcome, Patcher, TreeMirror};

use crate::error::{BuildError, PipelineError};
use crate::orchestrator::{BuildOutcome, Orchestrator};
use crate::stamp::{self, BuildStamp};

/// Why a build was considered outdated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RebuildReason {
    /// The base mirror changed or deleted something.
    SourceDrift,
    /// No artifact in the cache.
    ArtifactMissing,
    /// No stamp: never built, or drift and a failed build since the last one.
    NoSuccessfulBuild,
    /// The stamp was made with different patches or build settings.
    PatchSetChanged,
}

impl fmt::Display for RebuildReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::SourceDrift => "source drift",
            Self::ArtifactMissing => "artifact missing",
            Self::NoSuccessfulBuild => "no successful build since last change",
            Self::PatchSetChanged => "patch set changed",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub base: MirrorReport,
    pub variant: MirrorReport,
    pub patches: Vec<PatchOutcome>,
    /// Empty when the build was skipped.
    pub reasons: Vec<RebuildReason>,
    pub build: BuildOutcome,
}

impl fmt::Display for PipelineReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.build {
            BuildOutcome::Skipped => f.write_str("build skipped, no changes"),
            BuildOutcome::Succeeded(_) => f.write_str("build completed, artifact relocated"),
        }
    }
}

/// One configured pipeline. The config is never mutated after construction.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    layout: WorkspaceLayout,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        let layout = config.layout();
        Self { config, layout }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn layout(&self) -> &WorkspaceLayout {
        &self.layout
    }

    /// Application source → `<workspace>/base`.
    pub fn base_mirror(&self) -> TreeMirror {
        let base = self.layout.base();
        TreeMirror::new(&self.config.app_root, &base, self.config.manifest.clone())
            .with_exclusions(self.config.exclusions(&base))
    }

    /// `<workspace>/base` → `<workspace>/variant`.
    ///
    /// Manifest entries that are excluded outright never reach the base tree,
    /// so they are dropped from the clone manifest.
    pub fn variant_mirror(&self) -> TreeMirror {
        let variant = self.layout.variant();
        let exclude = &self.config.exclude;
        let entries = self
            .config
            .manifest
            .entries()
            .iter()
            .filter(|entry| !exclude.iter().any(|x| entry.starts_with(x)))
            .cloned();
        TreeMirror::new(self.layout.base(), &variant, Manifest::new(entries))
            .with_exclusions(self.config.exclusions(&variant))
    }

    pub fn orchestrator(&self) -> Orchestrator {
        Orchestrator::new(&self.config.build, self.layout.artifact())
    }

    /// Converge the base mirror, invalidating the build stamp on drift.
    ///
    /// Every base convergence goes through here so drift consumed outside
    /// [`run`](Self::run) still forces the next build.
    pub async fn converge_base(&self) -> Result<MirrorReport, PipelineError> {
        let report = self.base_mirror().converge().await?;
        if report.outdated() {
            stamp::invalidate(&self.layout.build_stamp()).await?;
        }
        Ok(report)
    }

    /// Run every stage. Any stage error aborts the run.
    pub async fn run(&self) -> Result<PipelineReport, PipelineError> {
        let base = self.converge_base().await?;
        let variant = self.variant_mirror().converge().await?;
        let patches = Patcher::new(self.layout.variant())
            .apply(&self.config.patches)
            .await?;

        let fingerprint = self.fingerprint()?;
        let reasons = self.rebuild_reasons(base.outdated(), &fingerprint).await;
        tracing::debug!(
            base_changes = base.changes.len(),
            variant_changes = variant.changes.len(),
            ?reasons,
            "rebuild decision"
        );

        let outdated = !reasons.is_empty();
        if outdated {
            stamp::invalidate(&self.layout.build_stamp()).await?;
        }
        let build = self
            .orchestrator()
            .run(&self.layout.variant(), outdated)
            .await?;
        if let BuildOutcome::Succeeded(summary) = &build {
            let stamp = BuildStamp {
                built_at: Utc::now(),
                fingerprint,
                duration_ms: stamp::millis(summary.duration),
            };
            stamp::save(&self.layout.build_stamp(), &stamp).await?;
        }

        Ok(PipelineReport {
            base,
            variant,
            patches,
            reasons,
            build,
        })
    }

    /// Identity of the configured patch list and build settings.
    pub fn fingerprint(&self) -> Result<String, BuildError> {
        stamp::fingerprint(&self.config.patches, &self.config.build)
    }

    /// Reasons the cached artifact cannot be reused; empty means skip.
    ///
    /// `source_drift` is the base mirror's `outdated` flag.
    pub async fn rebuild_reasons(&self, source_drift: bool, fingerprint: &str) -> Vec<RebuildReason> {
        let mut reasons = Vec::new();
        if source_drift {
            reasons.push(RebuildReason::SourceDrift);
        }
        let artifact_present = fs::metadata(self.layout.artifact())
            .await
            .map(|meta| meta.is_dir())
            .unwrap_or(false);
        if !artifact_present {
            reasons.push(RebuildReason::ArtifactMissing);
        }
        match stamp::load(&self.layout.build_stamp()).await {
            Some(stamp) if stamp.fingerprint == fingerprint => {}
            Some(_) => reasons.push(RebuildReason::PatchSetChanged),
            // Drift removes the stamp, so it already explains the absence.
            None if !source_drift => reasons.push(RebuildReason::NoSuccessfulBuild),
            None => {}
        }
        reasons
    }

    /// The last successful build, if any.
    pub async fn last_build(&self) -> Option<BuildStamp> {
        stamp::load(&self.layout.build_stamp()).await
    }

    pub fn artifact(&self) -> PathBuf {
        self.layout.artifact()
    }
}
