//! # mirrorbuild-server
//!
//! Static test server for the relocated build artifact.
//!
//! [`serve`] binds `127.0.0.1:<port>` (`0` = ephemeral), starts serving in a
//! background task, and returns a [`TestServer`] handle carrying the bound
//! port. The server stops gracefully on [`TestServer::shutdown`] or when the
//! handle is dropped.

pub mod error;

use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub use error::ServerError;

/// Liveness probe path, answered before falling through to the artifact.
pub const HEALTH_PATH: &str = "/__mirrorbuild/health";

/// Handle to a running server.
#[derive(Debug)]
pub struct TestServer {
    addr: SocketAddr,
    root: PathBuf,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<std::io::Result<()>>>,
}

impl TestServer {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// The bound port, never `0`.
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Base URL for building request URLs, without a trailing slash.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Stop accepting connections and wait for in-flight requests.
    pub async fn shutdown(mut self) -> Result<(), ServerError> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.join().await
    }

    /// Wait for the server task to finish without signalling it.
    pub async fn join(mut self) -> Result<(), ServerError> {
        match self.task.take() {
            Some(task) => Ok(task.await??),
            None => Ok(()),
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// Router serving `root` statically, with `index.html` for directories.
pub fn router(root: &Path) -> Router {
    Router::new()
        .route(HEALTH_PATH, get(|| async { "ok" }))
        .fallback_service(ServeDir::new(root).append_index_html_on_directories(true))
        .layer(TraceLayer::new_for_http())
}

/// Serve `root` on `127.0.0.1:port`.
pub async fn serve(root: impl Into<PathBuf>, port: u16) -> Result<TestServer, ServerError> {
    let root = root.into();
    match tokio::fs::metadata(&root).await {
        Ok(meta) if meta.is_dir() => {}
        _ => return Err(ServerError::MissingArtifact { path: root }),
    }

    let requested = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
    let listener = TcpListener::bind(requested)
        .await
        .map_err(|source| ServerError::Bind {
            addr: requested,
            source,
        })?;
    let addr = listener.local_addr()?;

    let (tx, rx) = oneshot::channel::<()>();
    let app = router(&root);
    let task = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = rx.await;
            })
            .await
    });

    tracing::info!(addr = %addr, root = %root.display(), "test server listening");
    Ok(TestServer {
        addr,
        root,
        shutdown: Some(tx),
        task: Some(task),
    })
}
