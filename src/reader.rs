use crate::entry::LogEntry;
use anyhow::{Context, Result};
use std::io::SeekFrom;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};

/// One line of a segment, as handed to the record handler.
#[derive(Debug, Clone)]
pub struct LogRecord {
    /// Parsed entry, or `None` when the line was not valid JSON.
    pub entry: Option<LogEntry>,
    /// Byte offset immediately after this line.
    pub offset: u64,
    /// 1-based line number within this reader's lifetime.
    pub line_number: u64,
    /// Raw line bytes, terminating newline included when present.
    pub raw: Vec<u8>,
}

/// Reads log records from a segment file with byte-offset tracking.
pub struct LogReader {
    reader: BufReader<File>,
    offset: u64,
    line_number: u64,
}

impl LogReader {
    /// Opens a segment for reading, positioned at `start_offset`.
    pub async fn open(path: impl AsRef<Path>, start_offset: u64) -> Result<Self> {
        let path = path.as_ref();
        let mut file = File::open(path)
            .await
            .with_context(|| format!("failed to open segment {}", path.display()))?;
        if start_offset > 0 {
            file.seek(SeekFrom::Start(start_offset))
                .await
                .with_context(|| {
                    format!(
                        "failed to seek {} to offset {}",
                        path.display(),
                        start_offset
                    )
                })?;
        }

        Ok(Self {
            reader: BufReader::new(file),
            offset: start_offset,
            line_number: 0,
        })
    }

    /// Reads the next record, or `None` at end of segment.
    ///
    /// A trailing line without a newline is still delivered; rotated
    /// segments are immutable, so a missing final newline is a writer
    /// artifact rather than a partially appended line. Lines that fail to
    /// parse come back with `entry: None` and the raw bytes intact.
    pub async fn read(&mut self) -> Result<Option<LogRecord>> {
        let mut line = Vec::new();
        let bytes_read = self
            .reader
            .read_until(b'\n', &mut line)
            .await
            .context("failed to read next line from segment")?;
        if bytes_read == 0 {
            return Ok(None);
        }

        self.offset += line.len() as u64;
        self.line_number += 1;

        // serde_json treats the trailing newline as whitespace.
        let entry = serde_json::from_slice::<LogEntry>(&line).ok();

        Ok(Some(LogRecord {
            entry,
            offset: self.offset,
            line_number: self.line_number,
            raw: line,
        }))
    }

    /// Byte offset reached so far; the resume point for a future `open`.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn line_number(&self) -> u64 {
        self.line_number
    }
}
