//! `mirrorbuild mirror` — converge the base mirror without building.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;

use mirrorbuild_core::ChangeRecord;

use super::{block_on, load_pipeline};

#[derive(Args, Debug)]
pub struct MirrorArgs {
    /// Emit the mirror report as JSON.
    #[arg(long)]
    pub json: bool,
}

impl MirrorArgs {
    pub fn run(self, config_path: &Path) -> Result<()> {
        let pipeline = load_pipeline(config_path)?;
        let report = block_on(pipeline.converge_base())?.context("mirror failed")?;
        let mirror = pipeline.base_mirror();

        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
            return Ok(());
        }

        if !report.outdated() {
            println!("✓ base mirror up to date");
            return Ok(());
        }
        for record in &report.changes {
            if let ChangeRecord::Changed { reason, path } = record {
                let shown = mirror
                    .relative(path)
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| path.display().to_string());
                println!("  {reason:<8} {shown}");
            }
        }
        for removed in &report.removed {
            println!("  {:<8} {}", "removed", removed.display());
        }
        println!(
            "✓ base mirror converged ({} changed, {} removed)",
            report.changes.len(),
            report.removed.len()
        );
        Ok(())
    }
}
