//! Pipeline configuration file.
//!
//! # File format
//!
//! ```yaml
//! app_root: .
//! workspace: .e2e
//! manifest: [package.json, next.config.mjs, public, src]
//! exclude: []
//! patches:
//!   - file: src/components/PaymentProvider.tsx
//!     replace: { pattern: 'import\("\./Braintree"\)', regex: true, with: 'import("./MockedBraintree")' }
//!   - file: src/lib/clientToken.ts
//!     overwrite: "export const getClientToken = async () => \"fake-token\"\n"
//! build:
//!   command: [npm, run, build]
//!   output_dir: .next
//! serve:
//!   port: 0
//! ```
//!
//! Relative `app_root` resolves against the directory holding the config
//! file; relative `workspace` resolves against `app_root`.

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{io_err, ConfigError};
use crate::layout::WorkspaceLayout;
use crate::types::{BuildConfig, ExclusionSet, Manifest, PatchAction, PatchRule, ServeConfig};

/// Default config file name, looked up in the current directory.
pub const DEFAULT_CONFIG_FILE: &str = "mirrorbuild.yaml";

/// Everything the pipeline needs, fixed for the duration of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_app_root")]
    pub app_root: PathBuf,
    #[serde(default = "default_workspace")]
    pub workspace: PathBuf,
    pub manifest: Manifest,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<PathBuf>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub patches: Vec<PatchRule>,
    #[serde(default)]
    pub build: BuildConfig,
    #[serde(default)]
    pub serve: ServeConfig,
}

fn default_app_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_workspace() -> PathBuf {
    PathBuf::from(".e2e")
}

impl PipelineConfig {
    /// Minimal config for `manifest`, with default workspace and build settings.
    pub fn new(app_root: impl Into<PathBuf>, manifest: Manifest) -> Self {
        Self {
            app_root: app_root.into(),
            workspace: default_workspace(),
            manifest,
            exclude: Vec::new(),
            patches: Vec::new(),
            build: BuildConfig::default(),
            serve: ServeConfig::default(),
        }
    }

    /// Starter config written by `mirrorbuild init`: a Next.js app whose
    /// payment provider is swapped for a mock.
    pub fn starter() -> Self {
        let mut config = Self::new(
            default_app_root(),
            Manifest::new([
                "package.json",
                "next.config.mjs",
                "public",
                ".env.local",
                "src",
                "tsconfig.json",
                "tailwind.config.ts",
                "postcss.config.mjs",
            ]),
        );
        config.patches = vec![
            PatchRule::replace_regex(
                "src/components/PaymentProvider.tsx",
                r#"import\("\./Braintree"\)"#,
                r#"import("./MockedBraintree")"#,
            ),
            PatchRule::overwrite(
                "src/lib/clientToken.ts",
                "export const getClientToken = async () => \"fake-token\"\n",
            ),
        ];
        config
    }

    pub fn layout(&self) -> WorkspaceLayout {
        WorkspaceLayout::new(self.app_root.join(&self.workspace))
    }

    /// Exclusions for a mirror pass from `app_root` into `destination_root`.
    pub fn exclusions(&self, destination_root: &Path) -> ExclusionSet {
        ExclusionSet::from_relative(&self.exclude, &[self.app_root.as_path(), destination_root])
    }

    /// Anchor a relative `app_root` at `base_dir`.
    pub fn resolve_against(mut self, base_dir: &Path) -> Self {
        if self.app_root.is_relative() {
            self.app_root = base_dir.join(&self.app_root).components().collect();
        }
        self
    }

    /// Semantic checks that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.manifest.is_empty() {
            return Err(ConfigError::Invalid("manifest must list at least one path".into()));
        }
        for entry in self.manifest.entries() {
            check_relative("manifest entry", entry)?;
        }
        check_disjoint(&self.manifest)?;
        for entry in &self.exclude {
            check_relative("exclude entry", entry)?;
        }
        for rule in &self.patches {
            check_relative("patch file", &rule.file)?;
            if let PatchAction::Replace(spec) = &rule.action {
                if spec.pattern.is_empty() {
                    return Err(ConfigError::Invalid(format!(
                        "empty replace pattern for {}",
                        rule.file.display()
                    )));
                }
                if spec.regex {
                    regex::Regex::new(&spec.pattern).map_err(|e| {
                        ConfigError::Invalid(format!(
                            "bad pattern for {}: {e}",
                            rule.file.display()
                        ))
                    })?;
                }
            }
        }
        match self.build.command.first() {
            Some(program) if !program.trim().is_empty() => {}
            _ => return Err(ConfigError::Invalid("build.command must name a program".into())),
        }
        check_relative("build.output_dir", &self.build.output_dir)?;

        let workspace = self
            .workspace
            .strip_prefix(&self.app_root)
            .unwrap_or(self.workspace.as_path());
        if workspace.is_relative() && self.manifest.covers(workspace) {
            return Err(ConfigError::Invalid(format!(
                "workspace {} lies inside a manifest entry and would mirror into itself",
                self.workspace.display()
            )));
        }
        Ok(())
    }
}

/// Two entries where one contains the other would be copied twice, concurrently.
fn check_disjoint(manifest: &Manifest) -> Result<(), ConfigError> {
    let entries = manifest.entries();
    for (i, outer) in entries.iter().enumerate() {
        for inner in &entries[i + 1..] {
            let outer: PathBuf = outer.components().collect();
            let inner: PathBuf = inner.components().collect();
            if inner.starts_with(&outer) || outer.starts_with(&inner) {
                return Err(ConfigError::Invalid(format!(
                    "manifest entries {} and {} overlap",
                    outer.display(),
                    inner.display()
                )));
            }
        }
    }
    Ok(())
}

fn check_relative(kind: &str, path: &Path) -> Result<(), ConfigError> {
    let mut normal = 0usize;
    for component in path.components() {
        match component {
            Component::Normal(_) => normal += 1,
            Component::CurDir => {}
            _ => {
                return Err(ConfigError::Invalid(format!(
                    "{kind} {} must be a relative path without `..`",
                    path.display()
                )))
            }
        }
    }
    if normal == 0 {
        return Err(ConfigError::Invalid(format!(
            "{kind} {:?} must name a path below the root",
            path.display().to_string()
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Load / save
// ---------------------------------------------------------------------------

/// Load, resolve, and validate the config at `path`.
///
/// Returns `ConfigError::NotFound` if absent, `ConfigError::Parse` (with path
/// and line context) if malformed YAML, `ConfigError::Invalid` if unusable.
pub fn load(path: &Path) -> Result<PipelineConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    let config: PipelineConfig = serde_yaml::from_str(&contents).map_err(|e| {
        ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        }
    })?;
    let base_dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let config = config.resolve_against(&base_dir);
    config.validate()?;
    Ok(config)
}

/// Atomically save `config` to `path`.
///
/// Write flow: serialize → `.tmp` sibling → `rename`.
pub fn save(path: &Path, config: &PipelineConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let yaml = serde_yaml::to_string(config)?;
    std::fs::write(&tmp, yaml).map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(path, e));
    }
    Ok(())
}

/// Write the starter config to `path`, refusing to clobber unless `force`.
pub fn init(path: &Path, force: bool) -> Result<PipelineConfig, ConfigError> {
    if path.exists() && !force {
        return Err(ConfigError::AlreadyExists {
            path: path.to_path_buf(),
        });
    }
    let config = PipelineConfig::starter();
    save(path, &config)?;
    Ok(config)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
