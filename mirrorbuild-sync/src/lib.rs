//! # mirrorbuild-sync
//!
//! Incremental tree mirroring and variant patching.
//!
//! - [`enumerate::leaf_paths`] expands manifest roots into leaf files.
//! - [`Detector`] compares one source path with its destination counterpart.
//! - [`TreeMirror`] converges a destination tree onto a manifest.
//! - [`Patcher`] applies ordered text substitutions to a mirrored tree.
//! - [`diff::diff_tree`] previews drift as unified diffs without touching disk.

pub mod detect;
pub mod diff;
pub mod enumerate;
pub mod error;
pub mod mirror;
mod ops;
pub mod patch;
pub mod writer;

pub use detect::{DetectMode, Detector};
pub use error::SyncError;
pub use mirror::{MirrorReport, TreeMirror};
pub use ops::{remove_path, replace_tree};
pub use patch::{PatchOutcome, PatchTarget, Patcher, Pattern};
