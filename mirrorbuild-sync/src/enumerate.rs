//! Path enumeration: expand manifest roots into the flat set of leaf files.

use std::collections::BTreeSet;
use std::path::PathBuf;

use futures::future::{try_join_all, BoxFuture, FutureExt};
use tokio::fs;

use crate::error::{io_err, SyncError};
use crate::ops::entry_names;

/// Every non-directory path reachable under `roots`.
///
/// Directories never appear in the result. Exact duplicates reachable from
/// more than one root collapse into one entry. A root (or any descendant)
/// whose metadata cannot be read fails the whole call: a missing manifest
/// entry must surface, not vanish.
pub async fn leaf_paths<I, P>(roots: I) -> Result<BTreeSet<PathBuf>, SyncError>
where
    I: IntoIterator<Item = P>,
    P: Into<PathBuf>,
{
    let nested = try_join_all(roots.into_iter().map(|root| expand(root.into()))).await?;
    Ok(nested.into_iter().flatten().collect())
}

fn expand(path: PathBuf) -> BoxFuture<'static, Result<Vec<PathBuf>, SyncError>> {
    async move {
        let meta = fs::metadata(&path).await.map_err(|e| io_err(&path, e))?;
        if !meta.is_dir() {
            return Ok(vec![path]);
        }
        let names = entry_names(&path).await.map_err(|e| io_err(&path, e))?;
        let children = try_join_all(names.into_iter().map(|name| expand(path.join(name)))).await?;
        Ok(children.into_iter().flatten().collect())
    }
    .boxed()
}
