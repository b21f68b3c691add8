//! Pipeline-owned workspace layout.
//!
//! ```text
//! <workspace>/
//!   base/              mirror of the application source
//!   variant/           mocked clone of base, patched, compiled in place
//!   artifact/          relocated compile output (what the test server serves)
//!   build-stamp.json   record of the last successful build
//! ```

use std::path::{Path, PathBuf};

pub const BASE_DIR: &str = "base";
pub const VARIANT_DIR: &str = "variant";
pub const ARTIFACT_DIR: &str = "artifact";
pub const BUILD_STAMP: &str = "build-stamp.json";

/// The three sibling trees plus the build stamp, under one workspace root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceLayout {
    root: PathBuf,
}

impl WorkspaceLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn base(&self) -> PathBuf {
        self.root.join(BASE_DIR)
    }

    pub fn variant(&self) -> PathBuf {
        self.root.join(VARIANT_DIR)
    }

    pub fn artifact(&self) -> PathBuf {
        self.root.join(ARTIFACT_DIR)
    }

    pub fn build_stamp(&self) -> PathBuf {
        self.root.join(BUILD_STAMP)
    }
}
