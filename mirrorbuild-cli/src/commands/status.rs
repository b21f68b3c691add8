//! `mirrorbuild status` — drift and rebuild visibility, read-only.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use mirrorbuild_build::{BuildStamp, Pipeline, RebuildReason};
use mirrorbuild_core::{ChangeReason, ChangeRecord};

use super::{block_on, load_pipeline};

/// Arguments for `mirrorbuild status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub fn run(self, config_path: &Path) -> Result<()> {
        let pipeline = load_pipeline(config_path)?;
        let report = block_on(build_report(&pipeline))??;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
            return Ok(());
        }
        print_table(report);
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct StatusReport {
    app_root: String,
    drift: Vec<DriftRow>,
    artifact_present: bool,
    last_build: Option<BuildStamp>,
    rebuild_reasons: Vec<RebuildReason>,
}

#[derive(Debug, Serialize, Tabled)]
struct DriftRow {
    #[tabled(rename = "change")]
    reason: ChangeReason,
    #[tabled(rename = "path")]
    path: String,
}

async fn build_report(pipeline: &Pipeline) -> Result<StatusReport> {
    let mirror = pipeline.base_mirror();
    let records = mirror
        .inspect()
        .await
        .context("failed to inspect base mirror")?;
    let drift: Vec<DriftRow> = records
        .iter()
        .filter_map(|record| match record {
            ChangeRecord::Changed { reason, path } => Some(DriftRow {
                reason: *reason,
                path: mirror
                    .relative(path)
                    .unwrap_or(path.as_path())
                    .display()
                    .to_string(),
            }),
            ChangeRecord::Unchanged => None,
        })
        .collect();

    let fingerprint = pipeline.fingerprint()?;
    let rebuild_reasons = pipeline
        .rebuild_reasons(!drift.is_empty(), &fingerprint)
        .await;

    Ok(StatusReport {
        app_root: pipeline.config().app_root.display().to_string(),
        artifact_present: !rebuild_reasons.contains(&RebuildReason::ArtifactMissing),
        last_build: pipeline.last_build().await,
        drift,
        rebuild_reasons,
    })
}

fn print_table(report: StatusReport) {
    let last_build = match &report.last_build {
        Some(stamp) => format!(
            "{} ago ({}ms)",
            format_datetime_age(stamp.built_at),
            stamp.duration_ms
        ),
        None => "never".to_string(),
    };
    println!(
        "Mirrorbuild v{} | {} | {} drifted | last build {}",
        env!("CARGO_PKG_VERSION"),
        report.app_root,
        report.drift.len(),
        last_build,
    );

    if report.drift.is_empty() {
        println!("{} base mirror matches the source", "●".green());
    } else {
        let mut table = Table::new(report.drift);
        table.with(Style::rounded());
        println!("{table}");
    }

    if report.rebuild_reasons.is_empty() {
        println!("{} next run: build skipped", "●".green());
    } else {
        let reasons: Vec<String> = report
            .rebuild_reasons
            .iter()
            .map(ToString::to_string)
            .collect();
        println!("{} next run: rebuild ({})", "●".yellow(), reasons.join(", "));
    }
}

fn format_datetime_age(timestamp: DateTime<Utc>) -> String {
    let seconds = Utc::now()
        .signed_duration_since(timestamp)
        .num_seconds()
        .max(0) as u64;
    if seconds < 60 {
        return format!("{seconds}s");
    }
    if seconds < 60 * 60 {
        return format!("{}m", seconds / 60);
    }
    if seconds < 60 * 60 * 24 {
        return format!("{}h", seconds / (60 * 60));
    }
    format!("{}d", seconds / (60 * 60 * 24))
}
