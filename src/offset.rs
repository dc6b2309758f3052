use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::debug;

const OFFSET_FILE_SUFFIX: &str = ".offset.json";

/// Durable offset state for one segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OffsetRecord {
    /// Segment filename, not a path.
    pub segment: String,
    /// Committed byte offset from the start of the segment file.
    pub offset: u64,
    /// Lines handled since this segment was last claimed.
    pub lines_processed: u64,
    pub last_updated: DateTime<Utc>,
}

/// Crash-consistent store of per-segment offsets.
///
/// Each segment gets one JSON file in the offsets directory, written via
/// temp-file-plus-rename so a reader only ever sees a complete file. A hot
/// in-memory cache fronts the files; cache and disk advance together under
/// the write lock.
pub struct OffsetStore {
    offsets_dir: PathBuf,
    offsets: RwLock<HashMap<String, OffsetRecord>>,
}

impl OffsetStore {
    /// Opens the store, creating the directory if needed and loading every
    /// readable offset file found there.
    ///
    /// Unreadable or corrupt files are skipped: a half-written record from a
    /// prior crash must read as "never committed", not as a startup failure.
    pub async fn open(offsets_dir: impl AsRef<Path>) -> Result<Self> {
        let offsets_dir = offsets_dir.as_ref().to_path_buf();
        fs::create_dir_all(&offsets_dir).await.with_context(|| {
            format!(
                "failed to create offsets directory {}",
                offsets_dir.display()
            )
        })?;

        let store = Self {
            offsets_dir,
            offsets: RwLock::new(HashMap::new()),
        };
        store.load_all().await?;
        Ok(store)
    }

    async fn load_all(&self) -> Result<()> {
        let mut entries = fs::read_dir(&self.offsets_dir).await.with_context(|| {
            format!(
                "failed to read offsets directory {}",
                self.offsets_dir.display()
            )
        })?;

        let mut offsets = self.offsets.write().await;
        while let Some(entry) = entries
            .next_entry()
            .await
            .context("failed to enumerate offsets directory")?
        {
            let file_name = entry.file_name();
            let name = match file_name.to_str() {
                Some(name) => name,
                None => continue,
            };
            if !name.ends_with(OFFSET_FILE_SUFFIX) {
                continue;
            }

            let data = match fs::read(entry.path()).await {
                Ok(data) => data,
                Err(err) => {
                    debug!(file = name, error = %err, "skipping unreadable offset file");
                    continue;
                }
            };

            let record: OffsetRecord = match serde_json::from_slice(&data) {
                Ok(record) => record,
                Err(err) => {
                    debug!(file = name, error = %err, "skipping corrupt offset file");
                    continue;
                }
            };

            offsets.insert(record.segment.clone(), record);
        }

        Ok(())
    }

    /// Last committed `(offset, lines_processed)` for a segment, or zeroes
    /// when nothing has been committed yet.
    pub async fn get(&self, segment: &str) -> (u64, u64) {
        let offsets = self.offsets.read().await;
        match offsets.get(segment) {
            Some(record) => (record.offset, record.lines_processed),
            None => (0, 0),
        }
    }

    /// Commits the offset for a segment: cache first, then disk.
    ///
    /// Callers must keep offsets non-decreasing per segment; the engine's
    /// single-owner claim discipline guarantees that.
    pub async fn commit(&self, segment: &str, offset: u64, lines_processed: u64) -> Result<()> {
        let record = OffsetRecord {
            segment: segment.to_string(),
            offset,
            lines_processed,
            last_updated: Utc::now(),
        };

        let mut offsets = self.offsets.write().await;
        offsets.insert(segment.to_string(), record.clone());
        self.persist(&record).await
    }

    async fn persist(&self, record: &OffsetRecord) -> Result<()> {
        let final_path = self.offset_path(&record.segment);
        let temp_path = self
            .offsets_dir
            .join(format!("{}{}.tmp", record.segment, OFFSET_FILE_SUFFIX));

        let data =
            serde_json::to_vec_pretty(record).context("failed to encode offset record")?;

        fs::write(&temp_path, &data)
            .await
            .with_context(|| format!("failed to write {}", temp_path.display()))?;

        // Same-filesystem rename, atomic on POSIX.
        fs::rename(&temp_path, &final_path).await.with_context(|| {
            format!(
                "failed to rename {} to {}",
                temp_path.display(),
                final_path.display()
            )
        })?;

        Ok(())
    }

    /// True when the committed offset covers the whole file.
    pub async fn is_complete(&self, segment: &str, file_size: u64) -> bool {
        let offsets = self.offsets.read().await;
        offsets
            .get(segment)
            .map(|record| record.offset >= file_size)
            .unwrap_or(false)
    }

    /// Defensive copy of every tracked record.
    pub async fn snapshot(&self) -> HashMap<String, OffsetRecord> {
        self.offsets.read().await.clone()
    }

    fn offset_path(&self, segment: &str) -> PathBuf {
        self.offsets_dir
            .join(format!("{segment}{OFFSET_FILE_SUFFIX}"))
    }
}
