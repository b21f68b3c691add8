//! # mirrorbuild-build
//!
//! Build orchestration on top of the mirror:
//!
//! - [`Orchestrator`] gates, runs, and times the external compile step.
//! - [`relocate`] swaps the compiled output into the artifact cache.
//! - [`stamp`] records what the cached artifact was built from.
//! - [`Pipeline`] composes mirror, clone, patch, and build into one run.

pub mod error;
pub mod orchestrator;
pub mod pipeline;
pub mod relocate;
pub mod stamp;

pub use error::{BuildError, PipelineError};
pub use orchestrator::{BuildOutcome, BuildSummary, Orchestrator};
pub use pipeline::{Pipeline, PipelineReport, RebuildReason};
pub use stamp::BuildStamp;
