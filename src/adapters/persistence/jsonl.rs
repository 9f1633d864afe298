//! JSONL Log - Append-only JSON Lines Records
//!
//! Each line is a self-contained JSON record. Used for the price history
//! (append-only by contract) and for roster snapshots. Optimized for:
//! - Append-only writes (no read-modify-write)
//! - Line-by-line streaming for analysis
//! - Survival of partial writes (a torn last line is skipped on load and
//!   closed off before the next append)

use std::io::SeekFrom;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::{instrument, warn};

/// Append-only JSONL file of `T` records.
pub struct JsonlLog<T> {
    path: PathBuf,
    _record: PhantomData<fn() -> T>,
}

impl<T> JsonlLog<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            _record: PhantomData,
        }
    }

    /// Append records, one per line, in a single write.
    #[instrument(skip(self, records), fields(path = %self.path.display(), count = records.len()))]
    pub async fn append(&self, records: &[T]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut buf = String::new();
        for record in records {
            buf.push_str(&serde_json::to_string(record).context("Failed to serialize record")?);
            buf.push('\n');
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create log directory")?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("Failed to open {}", self.path.display()))?;

        // A torn last line must not swallow the first new record.
        let len = file
            .metadata()
            .await
            .context("Failed to stat log")?
            .len();
        if len > 0 {
            file.seek(SeekFrom::End(-1))
                .await
                .context("Failed to seek log")?;
            let mut last = [0u8; 1];
            file.read_exact(&mut last)
                .await
                .context("Failed to read log tail")?;
            if last[0] != b'\n' {
                warn!(file = %self.path.display(), "Closing torn last line");
                buf.insert(0, '\n');
            }
        }

        file.write_all(buf.as_bytes())
            .await
            .context("Failed to write records")?;

        file.flush().await.context("Failed to flush log")?;

        Ok(())
    }

    /// Load every record; a missing file is an empty log.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub async fn load_all(&self) -> Result<Vec<T>> {
        if !fs::try_exists(&self.path).await.unwrap_or(false) {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read {}", self.path.display()))?;

        let mut records = Vec::new();
        for (line_no, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<T>(line) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(
                        file = %self.path.display(),
                        line = line_no + 1,
                        error = %e,
                        "Skipping malformed record"
                    );
                }
            }
        }

        Ok(records)
    }
}
