//! `mirrorbuild serve [--port <port>]`

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;

use mirrorbuild_server::serve;

use super::{block_on, load_pipeline};

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Listen port; overrides `serve.port` from the config. `0` picks a free port.
    #[arg(long, short = 'p')]
    pub port: Option<u16>,
}

impl ServeArgs {
    pub fn run(self, config_path: &Path) -> Result<()> {
        let pipeline = load_pipeline(config_path)?;
        let port = self.port.unwrap_or(pipeline.config().serve.port);
        let artifact = pipeline.artifact();

        block_on(async move {
            let server = serve(&artifact, port)
                .await
                .context("failed to start test server")?;
            println!("Serving {} at {}", artifact.display(), server.url());

            tokio::signal::ctrl_c()
                .await
                .context("failed to listen for ctrl-c")?;
            tracing::info!("received ctrl-c, shutting down test server");
            server.shutdown().await.context("test server failed")
        })?
    }
}
