//! Error types for mirrorbuild-sync.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from mirror and patch operations.
///
/// Comparison failures never show up here: the detector downgrades them to a
/// `changed` verdict.
#[derive(Debug, Error)]
pub enum SyncError {
    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A patch addressed a file (or parent directory) the mirror did not produce.
    #[error("patch target missing: {path}")]
    PatchTargetMissing { path: PathBuf },

    /// A replace rule's regular expression failed to compile.
    #[error("invalid patch pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
