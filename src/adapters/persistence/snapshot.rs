//! Snapshot File - Atomic JSON Document Persistence
//!
//! Saves whole JSON documents using atomic writes (write to a tmp file,
//! then rename). The file is always either the old or the new version,
//! never a partial write.

use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::fs;
use tracing::{debug, instrument};

/// One JSON document on disk.
pub struct SnapshotFile<T> {
    /// Path to the document.
    path: PathBuf,
    /// Temporary path for atomic writes.
    tmp_path: PathBuf,
    _doc: PhantomData<fn() -> T>,
}

impl<T> SnapshotFile<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Document at `path`; nothing is touched until the first save.
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");
        Self {
            path,
            tmp_path: PathBuf::from(tmp),
            _doc: PhantomData,
        }
    }

    /// Save the document atomically (tmp → rename).
    #[instrument(skip(self, doc), fields(path = %self.path.display()))]
    pub async fn save(&self, doc: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(doc).context("Failed to serialize snapshot")?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create snapshot directory")?;
        }

        // Write to tmp file
        fs::write(&self.tmp_path, &json)
            .await
            .context("Failed to write tmp snapshot file")?;

        // Atomic rename
        fs::rename(&self.tmp_path, &self.path)
            .await
            .context("Failed to rename snapshot file")?;

        debug!("Snapshot saved");
        Ok(())
    }

    /// Load the document; `None` if it was never written.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub async fn load(&self) -> Result<Option<T>> {
        if !fs::try_exists(&self.path).await.unwrap_or(false) {
            return Ok(None);
        }

        let json = fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read {}", self.path.display()))?;

        let doc = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse {}", self.path.display()))?;

        Ok(Some(doc))
    }

    /// Load the document or its default.
    pub async fn load_or_default(&self) -> Result<T>
    where
        T: Default,
    {
        Ok(self.load().await?.unwrap_or_default())
    }
}
