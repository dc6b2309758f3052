//! Engine orchestration: the scan loop, the worker pool, and shutdown.
//!
//! Workers claim one segment at a time straight off the pending list; the
//! registry's atomic claim is the only arbitration. There is no dispatch
//! queue to keep consistent across tasks.

use crate::config::Config;
use crate::offset::OffsetStore;
use crate::reader::{LogRecord, LogReader};
use crate::segment::{Segment, SegmentRegistry, SegmentStats};
use anyhow::Result;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How long a worker sleeps when no segment is pending.
const IDLE_SLEEP: Duration = Duration::from_millis(100);
/// Offset checkpoint cadence, in successfully handled records.
const COMMIT_EVERY_RECORDS: u64 = 100;

/// Consumer of replayed records.
///
/// Called synchronously on a worker task, one record at a time per worker.
/// Workers run in parallel, so implementations must tolerate concurrent
/// calls. A returned error is counted and processing moves on; delivery is
/// at-least-once, so handlers are expected to be idempotent per record.
pub trait RecordHandler: Send + Sync {
    fn handle(&self, record: &LogRecord) -> Result<()>;
}

impl<F> RecordHandler for F
where
    F: Fn(&LogRecord) -> Result<()> + Send + Sync,
{
    fn handle(&self, record: &LogRecord) -> Result<()> {
        self(record)
    }
}

/// Point-in-time processing statistics.
#[derive(Debug, Clone, Copy)]
pub struct EngineStats {
    /// Records delivered to the handler that returned `Ok`.
    pub processed: u64,
    /// Handler failures plus segment-open failures.
    pub errors: u64,
    pub segments: SegmentStats,
}

/// State shared between the engine handle and its worker tasks.
struct Shared {
    handler: Arc<dyn RecordHandler>,
    offset_store: Arc<OffsetStore>,
    registry: Arc<SegmentRegistry>,
    processed: AtomicU64,
    errors: AtomicU64,
}

/// Orchestrates segment discovery and a fixed pool of segment workers.
pub struct Engine {
    cfg: Config,
    shared: Arc<Shared>,
    running: AtomicBool,
    cancel: Mutex<Option<CancellationToken>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Engine {
    /// Creates an engine over the given configuration and record handler.
    ///
    /// Fails when the configuration is invalid or the offsets directory
    /// cannot be created.
    pub async fn new(cfg: Config, handler: Arc<dyn RecordHandler>) -> Result<Self> {
        cfg.validate()?;

        let offset_store = Arc::new(OffsetStore::open(cfg.offsets_dir_path()).await?);
        let registry = Arc::new(SegmentRegistry::new(
            cfg.logs_dir_path(),
            cfg.log_pattern.clone(),
            offset_store.clone(),
        ));

        Ok(Self {
            cfg,
            shared: Arc::new(Shared {
                handler,
                offset_store,
                registry,
                processed: AtomicU64::new(0),
                errors: AtomicU64::new(0),
            }),
            running: AtomicBool::new(false),
            cancel: Mutex::new(None),
            workers: Mutex::new(Vec::new()),
        })
    }

    /// Starts the scanner task and the worker pool. Idempotent; a second
    /// call returns without effect.
    ///
    /// One scan runs before anything spawns, so a caller observing `stats()`
    /// right after `start` already sees the segments on disk. Errors from
    /// that scan are propagated and leave the engine stopped.
    pub async fn start(&self, token: CancellationToken) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let cancel = token.child_token();

        if let Err(err) = self.shared.registry.scan().await {
            self.running.store(false, Ordering::SeqCst);
            return Err(err);
        }

        let mut workers = self.workers.lock().await;
        for worker_id in 0..self.cfg.worker_count {
            let worker = Worker {
                id: worker_id,
                shared: self.shared.clone(),
                cancel: cancel.clone(),
            };
            workers.push(tokio::spawn(worker.run()));
        }

        // The scanner is not joined on shutdown; it holds no unflushed state
        // and exits on its first tick after cancellation.
        tokio::spawn(scan_loop(
            self.shared.registry.clone(),
            self.cfg.scan_interval(),
            cancel.clone(),
        ));

        *self.cancel.lock().await = Some(cancel);

        info!(
            workers = self.cfg.worker_count,
            logs_dir = %self.cfg.logs_dir_path().display(),
            pattern = %self.cfg.log_pattern,
            "engine started"
        );

        Ok(())
    }

    /// Stops processing: cancels all tasks and waits for every worker to
    /// commit its progress and exit. Idempotent.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }

        if let Some(cancel) = self.cancel.lock().await.take() {
            cancel.cancel();
        }

        let mut workers = self.workers.lock().await;
        for handle in workers.drain(..) {
            if let Err(err) = handle.await {
                warn!(error = %err, "worker task failed during shutdown");
            }
        }

        info!("engine stopped");
    }

    /// Processing counters plus a snapshot of segment states.
    pub fn stats(&self) -> EngineStats {
        EngineStats {
            processed: self.shared.processed.load(Ordering::Relaxed),
            errors: self.shared.errors.load(Ordering::Relaxed),
            segments: self.shared.registry.stats(),
        }
    }

    /// The engine's offset store, for observability.
    pub fn offset_store(&self) -> Arc<OffsetStore> {
        self.shared.offset_store.clone()
    }
}

async fn scan_loop(registry: Arc<SegmentRegistry>, interval: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    // The engine already scanned synchronously; skip the immediate tick.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {
                if let Err(err) = registry.scan().await {
                    warn!(error = %err, "segment scan failed");
                }
            }
        }
    }
}

/// One member of the worker pool.
struct Worker {
    id: usize,
    shared: Arc<Shared>,
    cancel: CancellationToken,
}

impl Worker {
    async fn run(self) {
        debug!(worker = self.id, "worker started");

        loop {
            if self.cancel.is_cancelled() {
                debug!(worker = self.id, "worker exiting");
                return;
            }

            let pending = self.shared.registry.pending_segments();
            if pending.is_empty() {
                tokio::select! {
                    _ = self.cancel.cancelled() => return,
                    _ = tokio::time::sleep(IDLE_SLEEP) => {}
                }
                continue;
            }

            for segment in pending {
                if self.shared.registry.claim(&segment.name, self.id) {
                    self.process_segment(&segment).await;
                    break;
                }
            }
        }
    }

    async fn process_segment(&self, segment: &Segment) {
        let (start_offset, _) = self.shared.offset_store.get(&segment.name).await;

        let mut reader = match LogReader::open(&segment.path, start_offset).await {
            Ok(reader) => reader,
            Err(err) => {
                warn!(
                    worker = self.id,
                    segment = %segment.name,
                    error = %err,
                    "failed to open segment; releasing"
                );
                self.shared.errors.fetch_add(1, Ordering::Relaxed);
                self.shared.registry.release(&segment.name);
                return;
            }
        };

        debug!(
            worker = self.id,
            segment = %segment.name,
            offset = start_offset,
            "processing segment"
        );

        let mut lines_processed: u64 = 0;

        loop {
            if self.cancel.is_cancelled() {
                // Save progress before handing the segment back.
                self.commit(&segment.name, reader.offset(), lines_processed)
                    .await;
                self.shared.registry.release(&segment.name);
                return;
            }

            let record = match reader.read().await {
                Ok(Some(record)) => record,
                Ok(None) => break,
                Err(err) => {
                    // A mid-segment read error ends useful work for this
                    // file; everything reached so far still commits.
                    warn!(
                        worker = self.id,
                        segment = %segment.name,
                        error = %err,
                        "read error; finishing segment at current offset"
                    );
                    break;
                }
            };

            match self.shared.handler.handle(&record) {
                Ok(()) => {
                    self.shared.processed.fetch_add(1, Ordering::Relaxed);
                    lines_processed += 1;
                }
                Err(err) => {
                    debug!(
                        worker = self.id,
                        segment = %segment.name,
                        line = record.line_number,
                        error = %err,
                        "record handler failed"
                    );
                    self.shared.errors.fetch_add(1, Ordering::Relaxed);
                }
            }

            if lines_processed % COMMIT_EVERY_RECORDS == 0 {
                self.commit(&segment.name, reader.offset(), lines_processed)
                    .await;
            }
        }

        // Final commit lands before the completion mark.
        self.commit(&segment.name, reader.offset(), lines_processed)
            .await;
        self.shared.registry.mark_complete(&segment.name);

        debug!(
            worker = self.id,
            segment = %segment.name,
            lines = lines_processed,
            offset = reader.offset(),
            "segment complete"
        );
    }

    /// Checkpoint commit; failures are logged and retried at the next cycle.
    async fn commit(&self, segment: &str, offset: u64, lines_processed: u64) {
        if let Err(err) = self
            .shared
            .offset_store
            .commit(segment, offset, lines_processed)
            .await
        {
            warn!(segment = %segment, offset, error = %err, "offset commit failed");
        }
    }
}
