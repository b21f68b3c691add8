//! Build orchestrator: gate, run, and relocate the external compile step.
//!
//! ```text
//! Idle ──outdated=false──▶ Skipped
//!   └───outdated=true───▶ Building ──exit 0──▶ Succeeded (relocated)
//!                                  └─exit≠0──▶ Failed (fatal, no retry)
//! ```

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::process::Command;

use mirrorbuild_core::BuildConfig;

use crate::error::BuildError;
use crate::relocate::relocate;
use crate::stamp::millis;

/// Runs one configured compile command and owns one artifact cache path.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    command: Vec<String>,
    output_dir: PathBuf,
    cache: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    /// Nothing drifted; the cached artifact is current.
    Skipped,
    Succeeded(BuildSummary),
}

impl BuildOutcome {
    pub fn ran(&self) -> bool {
        matches!(self, Self::Succeeded(_))
    }
}

/// A finished compile: captured output and where the artifact now lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSummary {
    pub artifact: PathBuf,
    pub duration: Duration,
    pub stdout: String,
    pub stderr: String,
}

impl Orchestrator {
    pub fn new(build: &BuildConfig, cache: impl Into<PathBuf>) -> Self {
        Self {
            command: build.command.clone(),
            output_dir: build.output_dir.clone(),
            cache: cache.into(),
        }
    }

    pub fn cache(&self) -> &Path {
        &self.cache
    }

    /// Compile `root` if `outdated`, then move its output into the cache.
    pub async fn run(&self, root: &Path, outdated: bool) -> Result<BuildOutcome, BuildError> {
        if !outdated {
            tracing::info!(event = "build-skipped", root = %root.display(), "build skipped, no changes");
            return Ok(BuildOutcome::Skipped);
        }

        let program = self.command.first().map(String::as_str).unwrap_or_default();
        tracing::info!(
            event = "build-started",
            root = %root.display(),
            command = %self.command.join(" "),
            "running compile step"
        );
        let started = Instant::now();

        let output = Command::new(program)
            .args(self.command.iter().skip(1))
            .current_dir(root)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| {
                tracing::error!(event = "build-failed", error = %source, "compile step did not start");
                BuildError::Spawn {
                    program: program.to_owned(),
                    source,
                }
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if !output.status.success() {
            tracing::error!(
                event = "build-failed",
                status = %output.status,
                "compile step failed"
            );
            return Err(BuildError::CompileFailed {
                status: output.status.to_string(),
                stderr,
            });
        }
        if !stderr.trim().is_empty() {
            tracing::warn!(stderr = %stderr.trim_end(), "compile step wrote to stderr");
        }
        tracing::debug!(stdout = %stdout.trim_end(), "compile step output");

        relocate(&root.join(&self.output_dir), &self.cache).await?;
        let duration = started.elapsed();
        tracing::info!(
            event = "build-succeeded",
            duration_ms = millis(duration),
            artifact = %self.cache.display(),
            "build completed, artifact relocated"
        );
        Ok(BuildOutcome::Succeeded(BuildSummary {
            artifact: self.cache.clone(),
            duration,
            stdout,
            stderr,
        }))
    }
}
