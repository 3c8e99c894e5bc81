//! Compute-once, persist-forever JSON artifacts.
//!
//! Every expensive or rate-limited lookup in this program goes through
//! [`obtain`]: if the artifact already exists on disk it is returned as-is,
//! otherwise the computation runs once and its result is written before being
//! handed back. The file's existence is the cache key; there is no TTL and no
//! invalidation.
//!
//! Not safe for concurrent use: two simultaneous `obtain` calls for the same
//! path may both run the computation and race on the write. The CLI drives a
//! single flow, so this is accepted rather than guarded.

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::path::Path;

/// Return the artifact at `path`, computing and persisting it on a miss.
///
/// `compute` runs at most once. If it fails, nothing is written and the error
/// propagates, so the next call retries from scratch.
pub async fn obtain<T, F, Fut>(path: &Path, compute: F) -> Result<T>
where
  T: Serialize + DeserializeOwned,
  F: FnOnce() -> Fut,
  Fut: Future<Output = Result<T>>,
{
  if let Some(value) = load(path).await? {
    return Ok(value);
  }
  let value = compute().await?;
  save(path, &value).await?;
  Ok(value)
}

/// Load the artifact at `path`, or `None` if it has not been computed yet.
pub async fn load<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
  match tokio::fs::read(path).await {
    Ok(bytes) => {
      let value = serde_json::from_slice(&bytes)
        .with_context(|| format!("Malformed artifact at {}", path.display()))?;
      Ok(Some(value))
    }
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
    Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
  }
}

/// Write `value` to `path` as pretty-printed JSON, creating parent directories.
pub async fn save<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
  if let Some(parent) = path.parent() {
    tokio::fs::create_dir_all(parent)
      .await
      .with_context(|| format!("Failed to create {}", parent.display()))?;
  }
  let json = serde_json::to_vec_pretty(value).context("Failed to serialize artifact")?;
  tokio::fs::write(path, json).await.with_context(|| format!("Failed to write {}", path.display()))
}
