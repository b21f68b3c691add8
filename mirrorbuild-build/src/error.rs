use std::path::PathBuf;

use thiserror::Error;

/// Failures of the compile step and artifact handling. All are fatal.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to start compile step `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("compile step exited with {status}\n{stderr}")]
    CompileFailed { status: String, stderr: String },

    #[error("compile step succeeded but produced no output at {path}")]
    MissingOutput { path: PathBuf },

    #[error("failed to relocate {from} to {to}: {source}")]
    Relocate {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("sync error: {0}")]
    Sync(#[from] mirrorbuild_sync::SyncError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Anything that aborts a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("config error: {0}")]
    Config(#[from] mirrorbuild_core::ConfigError),

    #[error("mirror error: {0}")]
    Sync(#[from] mirrorbuild_sync::SyncError),

    #[error("build error: {0}")]
    Build(#[from] BuildError),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> BuildError {
    BuildError::Io {
        path: path.into(),
        source,
    }
}
