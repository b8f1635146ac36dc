//! Durable outbox for notification-creation requests that failed to send.
//!
//! A JSON array of [`FailedDelivery`] entries at a fixed path, surviving
//! process restarts. Writes go through a temp file followed by a rename, so
//! a crash mid-write leaves the previous queue intact. One process owns the
//! file; the read-modify-write discipline here is not safe across
//! processes, which is acceptable for best-effort redelivery bookkeeping.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::warn;

use crate::errors::AppError;
use crate::models::notification::FailedDelivery;

#[derive(Debug, Clone)]
pub struct Outbox {
    path: PathBuf,
}

impl Outbox {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the queued entries. An absent file is an empty queue; a
    /// corrupted file is logged and also treated as empty; losing queued
    /// retries beats wedging every future append on unparseable state.
    pub async fn load(&self) -> Result<Vec<FailedDelivery>, AppError> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_slice(&bytes) {
            Ok(entries) => Ok(entries),
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "outbox file is malformed, starting from an empty queue"
                );
                Ok(Vec::new())
            }
        }
    }

    /// Append one entry (read-modify-write).
    pub async fn append(&self, entry: FailedDelivery) -> Result<(), AppError> {
        let mut entries = self.load().await?;
        entries.push(entry);
        self.persist(&entries).await
    }

    /// Replace the whole queue. Used by the retry pass to write back the
    /// still-failed set.
    pub async fn replace(&self, entries: &[FailedDelivery]) -> Result<(), AppError> {
        self.persist(entries).await
    }

    async fn persist(&self, entries: &[FailedDelivery]) -> Result<(), AppError> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir).await?;
            }
        }
        let tmp = self.path.with_extension("tmp");
        let bytes = serde_json::to_vec_pretty(entries)?;
        fs::write(&tmp, &bytes).await?;
        // rename within the same directory: atomic on every platform we run on
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}
