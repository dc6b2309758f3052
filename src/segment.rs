use crate::offset::OffsetStore;
use anyhow::{Context, Result};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tracing::debug;

/// Processing state of a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentState {
    /// Ready for processing.
    Pending,
    /// Claimed by a worker.
    Processing,
    /// Fully processed; terminal.
    Complete,
}

/// Snapshot of one rotated log segment.
#[derive(Debug, Clone)]
pub struct Segment {
    /// Segment filename (e.g. `app.log.20260101-231106`).
    pub name: String,
    /// Full path to the segment file.
    pub path: PathBuf,
    /// Size in bytes captured at discovery. Rotated segments are immutable,
    /// so this never changes.
    pub size: u64,
    pub state: SegmentState,
    /// Owning worker while `Processing`.
    pub worker_id: Option<usize>,
}

/// Segment counts by state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SegmentStats {
    pub total: usize,
    pub pending: usize,
    pub processing: usize,
    pub complete: usize,
}

/// Catalogue of known segments: discovery, state transitions, worker claims.
///
/// The map only ever grows; segments are never forgotten while the engine
/// lives. All transitions happen under one write lock, and the lock never
/// covers filesystem work.
pub struct SegmentRegistry {
    logs_dir: PathBuf,
    pattern: String,
    offset_store: Arc<OffsetStore>,
    segments: RwLock<HashMap<String, Segment>>,
}

impl SegmentRegistry {
    pub fn new(
        logs_dir: impl Into<PathBuf>,
        pattern: impl Into<String>,
        offset_store: Arc<OffsetStore>,
    ) -> Self {
        Self {
            logs_dir: logs_dir.into(),
            pattern: pattern.into(),
            offset_store,
            segments: RwLock::new(HashMap::new()),
        }
    }

    /// Discovers rotated segments in the logs directory.
    ///
    /// New files enter as `Pending`, or as `Complete` when the offset store
    /// already covers their full size. Known segments are left untouched and
    /// are not re-stat'ed.
    pub async fn scan(&self) -> Result<()> {
        let candidates = self.collect_candidates().await?;
        if candidates.is_empty() {
            return Ok(());
        }

        // Resolve initial states before taking the map lock.
        let mut discovered = Vec::with_capacity(candidates.len());
        for (name, path, size) in candidates {
            let state = if self.offset_store.is_complete(&name, size).await {
                SegmentState::Complete
            } else {
                SegmentState::Pending
            };
            discovered.push(Segment {
                name,
                path,
                size,
                state,
                worker_id: None,
            });
        }

        let mut segments = self.segments.write();
        for segment in discovered {
            // A concurrent scan may have inserted this name already.
            if !segments.contains_key(&segment.name) {
                debug!(
                    name = %segment.name,
                    size = segment.size,
                    state = ?segment.state,
                    "discovered segment"
                );
                segments.insert(segment.name.clone(), segment);
            }
        }

        Ok(())
    }

    async fn collect_candidates(&self) -> Result<Vec<(String, PathBuf, u64)>> {
        let known: HashSet<String> = self.segments.read().keys().cloned().collect();

        let mut dir = match fs::read_dir(&self.logs_dir).await {
            Ok(dir) => dir,
            // A logs directory that does not exist yet scans as empty.
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("failed to read logs directory {}", self.logs_dir.display())
                })
            }
        };

        let prefix = format!("{}.", self.pattern);
        let mut candidates = Vec::new();

        while let Some(entry) = dir
            .next_entry()
            .await
            .context("failed to enumerate logs directory")?
        {
            let file_name = entry.file_name();
            let name = match file_name.to_str() {
                Some(name) => name,
                None => continue,
            };
            if !name.starts_with(&prefix) {
                continue;
            }
            // Offset and temp files do not belong in the logs directory;
            // tolerate a shared-directory misconfiguration anyway.
            if name.ends_with(".offset.json") || name.ends_with(".tmp") {
                continue;
            }
            if known.contains(name) {
                continue;
            }

            let metadata = match entry.metadata().await {
                Ok(metadata) => metadata,
                Err(_) => continue,
            };
            if !metadata.is_file() {
                continue;
            }

            candidates.push((name.to_string(), entry.path(), metadata.len()));
        }

        Ok(candidates)
    }

    /// Segments ready for processing, oldest first. Rotation suffixes sort
    /// lexicographically in chronological order.
    pub fn pending_segments(&self) -> Vec<Segment> {
        let segments = self.segments.read();
        let mut pending: Vec<Segment> = segments
            .values()
            .filter(|segment| segment.state == SegmentState::Pending)
            .cloned()
            .collect();
        pending.sort_by(|a, b| a.name.cmp(&b.name));
        pending
    }

    /// Atomically claims a pending segment for a worker.
    ///
    /// Returns `false` when the segment is unknown or no longer pending, so
    /// racing workers resolve to exactly one owner.
    pub fn claim(&self, name: &str, worker_id: usize) -> bool {
        let mut segments = self.segments.write();
        match segments.get_mut(name) {
            Some(segment) if segment.state == SegmentState::Pending => {
                segment.state = SegmentState::Processing;
                segment.worker_id = Some(worker_id);
                true
            }
            _ => false,
        }
    }

    /// Marks a segment fully processed and clears its owner.
    pub fn mark_complete(&self, name: &str) {
        let mut segments = self.segments.write();
        if let Some(segment) = segments.get_mut(name) {
            segment.state = SegmentState::Complete;
            segment.worker_id = None;
        }
    }

    /// Hands a `Processing` segment back to `Pending`, e.g. after a worker
    /// failure or an interrupted run. Completed segments stay completed.
    pub fn release(&self, name: &str) {
        let mut segments = self.segments.write();
        if let Some(segment) = segments.get_mut(name) {
            if segment.state == SegmentState::Processing {
                segment.state = SegmentState::Pending;
                segment.worker_id = None;
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<Segment> {
        self.segments.read().get(name).cloned()
    }

    pub fn stats(&self) -> SegmentStats {
        let segments = self.segments.read();
        let mut stats = SegmentStats {
            total: segments.len(),
            ..Default::default()
        };
        for segment in segments.values() {
            match segment.state {
                SegmentState::Pending => stats.pending += 1,
                SegmentState::Processing => stats.processing += 1,
                SegmentState::Complete => stats.complete += 1,
            }
        }
        stats
    }
}
