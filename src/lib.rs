//! Resumable, parallel replay of rotated line-delimited JSON log files.
//!
//! A producer appends to a live file and periodically renames it to a
//! timestamp-suffixed segment. This crate discovers those segments, fans
//! them out over a worker pool, parses each line, and hands every record to
//! a caller-supplied handler, persisting the byte offset reached in each
//! segment so a restart resumes exactly where the last run committed.
//! Delivery is at-least-once: a record can repeat after a crash, never
//! silently vanish.
//!
//! ```ignore
//! use segtail::{CancellationToken, Config, Engine, LogRecord};
//! use std::sync::Arc;
//!
//! let config = Config::load("config.toml")?;
//! let handler = Arc::new(|record: &LogRecord| -> anyhow::Result<()> {
//!     if let Some(entry) = &record.entry {
//!         println!("{} {}", entry.service, entry.message);
//!     }
//!     Ok(())
//! });
//!
//! let engine = Engine::new(config, handler).await?;
//! engine.start(CancellationToken::new()).await?;
//! // ... run until shutdown ...
//! engine.stop().await;
//! ```

pub mod config;
pub mod engine;
pub mod entry;
pub mod offset;
pub mod reader;
pub mod segment;

pub use config::Config;
pub use engine::{Engine, EngineStats, RecordHandler};
pub use entry::{LogEntry, LogLevel};
pub use offset::{OffsetRecord, OffsetStore};
pub use reader::{LogReader, LogRecord};
pub use segment::{Segment, SegmentRegistry, SegmentState, SegmentStats};

pub use tokio_util::sync::CancellationToken;
