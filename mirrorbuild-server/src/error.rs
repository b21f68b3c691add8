use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    /// Nothing to serve yet; the pipeline has not produced an artifact.
    #[error("no build artifact at {path}; run `mirrorbuild run` first")]
    MissingArtifact { path: PathBuf },

    #[error("cannot listen on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("server task ended abnormally: {0}")]
    Join(#[from] tokio::task::JoinError),
}
