//! `mirrorbuild diff` — show unified diffs for what the next mirror pass would apply.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;

use mirrorbuild_sync::diff::diff_tree;

use super::{block_on, load_pipeline};

/// Arguments for `mirrorbuild diff`.
#[derive(Args, Debug)]
pub struct DiffArgs {}

impl DiffArgs {
    pub fn run(self, config_path: &Path) -> Result<()> {
        let pipeline = load_pipeline(config_path)?;
        let mirror = pipeline.base_mirror();
        let diffs = block_on(diff_tree(&mirror))?.context("diff failed")?;

        if diffs.is_empty() {
            println!("No differences between source and base mirror.");
            return Ok(());
        }

        for diff in diffs {
            print!("{}", diff.unified_diff);
            if !diff.unified_diff.ends_with('\n') {
                println!();
            }
        }
        Ok(())
    }
}
