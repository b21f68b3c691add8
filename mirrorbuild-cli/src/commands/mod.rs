pub mod diff;
pub mod init;
pub mod mirror;
pub mod run;
pub mod serve;
pub mod status;

use std::future::Future;
use std::path::Path;

use anyhow::{Context, Result};

use mirrorbuild_build::Pipeline;
use mirrorbuild_core::config;

/// Load and validate the config at `path` into a pipeline.
pub(crate) fn load_pipeline(path: &Path) -> Result<Pipeline> {
    let config = config::load(path)
        .with_context(|| format!("failed to load config '{}'", path.display()))?;
    Ok(Pipeline::new(config))
}

/// Drive `future` to completion on a fresh multi-thread runtime.
pub(crate) fn block_on<F: Future>(future: F) -> Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    Ok(runtime.block_on(future))
}

/// `path` relative to `root` for display, or as-is if outside it.
pub(crate) fn display_relative(path: &Path, root: &Path) -> String {
    path.strip_prefix(root).unwrap_or(path).display().to_string()
}
