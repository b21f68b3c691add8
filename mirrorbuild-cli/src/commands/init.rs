//! `mirrorbuild init [--force]`

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;

use mirrorbuild_core::config;

/// Write a starter config for a Next.js app with a mocked payment provider.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite an existing config file.
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    pub fn run(self, config_path: &Path) -> Result<()> {
        let written = config::init(config_path, self.force)
            .with_context(|| format!("failed to init '{}'", config_path.display()))?;

        println!("✓ Wrote starter config to {}", config_path.display());
        println!(
            "  {} manifest entries, {} patches, workspace {}",
            written.manifest.len(),
            written.patches.len(),
            written.workspace.display()
        );
        Ok(())
    }
}
