//! Mirrorbuild core library — domain types, workspace layout, configuration.
//!
//! Public API surface:
//! - [`types`] — manifest, exclusion set, change records, patch rules
//! - [`layout`] — the pipeline-owned workspace directories
//! - [`config`] — YAML load / save / validation
//! - [`error`] — [`ConfigError`]

pub mod config;
pub mod error;
pub mod layout;
pub mod types;

pub use config::PipelineConfig;
pub use error::ConfigError;
pub use layout::WorkspaceLayout;
pub use types::{
    BuildConfig, ChangeReason, ChangeRecord, ExclusionSet, Manifest, PatchAction, PatchRule,
    ReplaceSpec, ServeConfig,
};
