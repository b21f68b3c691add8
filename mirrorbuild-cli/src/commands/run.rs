//! `mirrorbuild run` — the full pipeline.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use mirrorbuild_build::{BuildOutcome, PipelineReport};
use mirrorbuild_sync::PatchOutcome;

use super::{block_on, display_relative, load_pipeline};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Echo the compile step's stdout after a build.
    #[arg(long)]
    pub show_output: bool,
}

impl RunArgs {
    pub fn run(self, config_path: &Path) -> Result<()> {
        let pipeline = load_pipeline(config_path)?;
        let report = block_on(pipeline.run())?.context("pipeline run failed")?;
        print_report(&report, pipeline.layout().variant().as_path(), self.show_output);
        Ok(())
    }
}

fn print_report(report: &PipelineReport, variant_root: &Path, show_output: bool) {
    println!(
        "base mirror: {} changed, {} removed",
        report.base.changes.len(),
        report.base.removed.len()
    );
    println!(
        "variant clone: {} changed, {} removed",
        report.variant.changes.len(),
        report.variant.removed.len()
    );
    for outcome in &report.patches {
        let path = display_relative(outcome.path(), variant_root);
        match outcome {
            PatchOutcome::Replaced { matches, .. } => {
                println!("  ✎  {path} ({matches} replaced)")
            }
            PatchOutcome::Overwritten { .. } => println!("  ✎  {path} (overwritten)"),
            PatchOutcome::NoOp { .. } => println!("  ·  {path}"),
        }
    }

    match &report.build {
        BuildOutcome::Skipped => println!("{} {report}", "✓".green()),
        BuildOutcome::Succeeded(summary) => {
            let reasons: Vec<String> = report.reasons.iter().map(ToString::to_string).collect();
            println!("rebuild: {}", reasons.join(", "));
            if show_output && !summary.stdout.trim().is_empty() {
                println!("{}", summary.stdout.trim_end());
            }
            println!(
                "{} {report} in {}ms → {}",
                "✓".green(),
                summary.duration.as_millis(),
                summary.artifact.display()
            );
        }
    }
}
