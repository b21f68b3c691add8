//! Mirrorbuild — incremental mirror-and-build for end-to-end test artifacts.
//!
//! # Usage
//!
//! ```text
//! mirrorbuild init [--force]
//! mirrorbuild run
//! mirrorbuild mirror [--json]
//! mirrorbuild status [--json]
//! mirrorbuild diff
//! mirrorbuild serve [--port <port>]
//! ```
//!
//! Every command reads `mirrorbuild.yaml` from the current directory unless
//! `--config` points elsewhere.

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    diff::DiffArgs, init::InitArgs, mirror::MirrorArgs, run::RunArgs, serve::ServeArgs,
    status::StatusArgs,
};
use mirrorbuild_core::config::DEFAULT_CONFIG_FILE;

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "mirrorbuild",
    version,
    about = "Mirror an app into a patched variant and rebuild it only when something changed",
    long_about = None,
)]
struct Cli {
    /// Pipeline config file.
    #[arg(long, short = 'c', global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a starter config.
    Init(InitArgs),

    /// Mirror, clone, patch, and build if anything drifted.
    Run(RunArgs),

    /// Converge the base mirror only; never builds.
    Mirror(MirrorArgs),

    /// Report drift and the rebuild decision without touching disk.
    Status(StatusArgs),

    /// Show unified diffs between the app source and the base mirror.
    Diff(DiffArgs),

    /// Serve the build artifact on a local port until ctrl-c.
    Serve(ServeArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.command {
        Commands::Init(args) => args.run(&cli.config),
        Commands::Run(args) => args.run(&cli.config),
        Commands::Mirror(args) => args.run(&cli.config),
        Commands::Status(args) => args.run(&cli.config),
        Commands::Diff(args) => args.run(&cli.config),
        Commands::Serve(args) => args.run(&cli.config),
    }
}

/// Logs go to stderr so `--json` output on stdout stays parseable.
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
