//! Artifact relocation: move a fresh compile output into the cache path.
//!
//! ## Swap protocol
//!
//! 1. Move `output` to `.<name>.incoming` next to the cache (copy + delete if
//!    a rename is not possible, e.g. across filesystems).
//! 2. Rename the current cache, if any, to `.<name>.retired`.
//! 3. Rename `.<name>.incoming` to the cache path.
//! 4. Remove `.<name>.retired`.
//!
//! Readers of the cache path see the old tree, nothing, or the new tree;
//! never a partial copy. If step 3 fails the retired tree is put back.

use std::path::{Path, PathBuf};

use tokio::fs;

use mirrorbuild_core::ExclusionSet;
use mirrorbuild_sync::{remove_path, replace_tree};

use crate::error::{io_err, BuildError};

/// Replace `cache` with the directory at `output`. `output` is consumed.
pub async fn relocate(output: &Path, cache: &Path) -> Result<(), BuildError> {
    match fs::metadata(output).await {
        Ok(meta) if meta.is_dir() => {}
        _ => {
            return Err(BuildError::MissingOutput {
                path: output.to_path_buf(),
            })
        }
    }

    let incoming = sibling(cache, "incoming");
    let retired = sibling(cache, "retired");
    if let Some(parent) = cache.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| io_err(parent, e))?;
    }
    for leftover in [&incoming, &retired] {
        remove_path(leftover)
            .await
            .map_err(|e| io_err(leftover, e))?;
    }

    stage(output, &incoming).await?;

    let had_previous = fs::metadata(cache).await.is_ok();
    if had_previous {
        fs::rename(cache, &retired)
            .await
            .map_err(|source| BuildError::Relocate {
                from: cache.to_path_buf(),
                to: retired.clone(),
                source,
            })?;
    }

    if let Err(source) = fs::rename(&incoming, cache).await {
        if had_previous {
            if let Err(err) = fs::rename(&retired, cache).await {
                tracing::error!(
                    path = %cache.display(),
                    error = %err,
                    "could not restore previous artifact"
                );
            }
        }
        return Err(BuildError::Relocate {
            from: incoming,
            to: cache.to_path_buf(),
            source,
        });
    }

    if let Err(err) = remove_path(&retired).await {
        tracing::warn!(path = %retired.display(), error = %err, "failed to remove retired artifact");
    }
    tracing::info!(
        event = "artifact-relocated",
        from = %output.display(),
        to = %cache.display(),
        "artifact relocated"
    );
    Ok(())
}

/// Move `output` to `incoming`, falling back to copy + delete.
async fn stage(output: &Path, incoming: &Path) -> Result<(), BuildError> {
    let Err(err) = fs::rename(output, incoming).await else {
        return Ok(());
    };
    tracing::debug!(
        from = %output.display(),
        error = %err,
        "rename failed, copying artifact instead"
    );
    let none = ExclusionSet::default();
    replace_tree(output.to_path_buf(), incoming.to_path_buf(), &none).await?;
    remove_path(output).await.map_err(|e| io_err(output, e))
}

/// `<parent>/.<name>.<tag>`
fn sibling(cache: &Path, tag: &str) -> PathBuf {
    let name = cache
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "artifact".to_owned());
    cache.with_file_name(format!(".{name}.{tag}"))
}
