//! Build stamp: what the cached artifact was built from.
//!
//! Persists a [`BuildStamp`] JSON document at `<workspace>/build-stamp.json`
//! after each successful build. The stamp is removed whenever the base mirror
//! moves or a build starts, so its presence means the artifact matches the
//! mirrored sources. The fingerprint is a SHA-256 over the ordered
//! patch rules and build settings, so a changed patch list invalidates the
//! artifact even when no source file moved. Writes use the `.tmp` + rename
//! pattern.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;

use mirrorbuild_core::{BuildConfig, PatchRule};

use crate::error::{io_err, BuildError};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuildStamp {
    pub built_at: DateTime<Utc>,
    /// Hex SHA-256 of the patch rules and build settings.
    pub fingerprint: String,
    pub duration_ms: u64,
}

#[derive(Serialize)]
struct VariantIdentity<'a> {
    patches: &'a [PatchRule],
    build: &'a BuildConfig,
}

/// Fingerprint of everything besides source content that shapes the artifact.
pub fn fingerprint(patches: &[PatchRule], build: &BuildConfig) -> Result<String, BuildError> {
    let canonical = serde_json::to_vec(&VariantIdentity { patches, build })?;
    Ok(hex::encode(Sha256::digest(&canonical)))
}

/// Load the stamp at `path`.
///
/// A missing or unreadable stamp yields `None`, which the pipeline treats as
/// "rebuild".
pub async fn load(path: &Path) -> Option<BuildStamp> {
    let contents = match fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => return None,
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "cannot read build stamp");
            return None;
        }
    };
    match serde_json::from_str(&contents) {
        Ok(stamp) => Some(stamp),
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "ignoring corrupt build stamp");
            None
        }
    }
}

/// Save `stamp` to `path` atomically.
pub async fn save(path: &Path, stamp: &BuildStamp) -> Result<(), BuildError> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).await.map_err(|e| io_err(dir, e))?;
    }
    let json = serde_json::to_string_pretty(stamp)?;
    let tmp: PathBuf = path.with_extension("json.tmp");
    fs::write(&tmp, &json).await.map_err(|e| io_err(&tmp, e))?;
    fs::rename(&tmp, path).await.map_err(|e| io_err(path, e))?;
    Ok(())
}

/// Remove the stamp at `path`; a missing stamp is not an error.
pub async fn invalidate(path: &Path) -> Result<(), BuildError> {
    match fs::remove_file(path).await {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "build stamp invalidated");
            Ok(())
        }
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_err(path, err)),
    }
}

/// Milliseconds in `duration`, saturating.
pub(crate) fn millis(duration: std::time::Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn stamp(fingerprint: &str) -> BuildStamp {
        BuildStamp {
            built_at: Utc::now(),
            fingerprint: fingerprint.to_owned(),
            duration_ms: 1200,
        }
    }

    #[tokio::test]
    async fn missing_stamp_loads_as_none() {
        let tmp = TempDir::new().unwrap();
        assert!(load(&tmp.path().join("build-stamp.json")).await.is_none());
    }

    #[tokio::test]
    async fn roundtrip_save_load() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(".e2e/build-stamp.json");
        let original = stamp("cafebabe");

        save(&path, &original).await.unwrap();
        assert_eq!(load(&path).await, Some(original));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn invalidate_removes_stamp_and_tolerates_absence() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("build-stamp.json");
        save(&path, &stamp("cafebabe")).await.unwrap();

        invalidate(&path).await.unwrap();
        assert!(load(&path).await.is_none());
        invalidate(&path).await.expect("second invalidate is a no-op");
    }

    #[test]
    fn millis_saturates() {
        use std::time::Duration;
        assert_eq!(millis(Duration::from_millis(1200)), 1200);
        assert_eq!(millis(Duration::MAX), u64::MAX);
    }

    #[tokio::test]
    async fn corrupt_stamp_loads_as_none() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("build-stamp.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(load(&path).await.is_none());
    }

    #[test]
    fn fingerprint_tracks_patch_order_and_build_settings() {
        let a = PatchRule::replace("a.ts", "x", "y");
        let b = PatchRule::overwrite("b.ts", "z");
        let build = BuildConfig::default();

        let forward = fingerprint(&[a.clone(), b.clone()], &build).unwrap();
        assert_eq!(forward, fingerprint(&[a.clone(), b.clone()], &build).unwrap());
        assert_ne!(forward, fingerprint(&[b.clone(), a.clone()], &build).unwrap());

        let mut other = build.clone();
        other.output_dir = PathBuf::from("dist");
        assert_ne!(forward, fingerprint(&[a, b], &other).unwrap());
        assert_eq!(forward.len(), 64);
    }
}
