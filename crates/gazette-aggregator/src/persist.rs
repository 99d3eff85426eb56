//! Atomic file replacement and write throttling
//!
//! The data directory lives on an SD card, so writes are both rate limited
//! and crash safe: readers only ever see a complete old or new file.

use chrono::Duration;
use gazette_core::Timestamp;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

use crate::{interval, AggregatorError, AggregatorResult};

/// Serialize `value` as pretty JSON and atomically replace `path` with it.
///
/// Temp file in the same directory, flush, fsync, rename. On any failure the
/// temp file is removed and `path` keeps its previous contents.
pub fn atomic_write_json<T: Serialize>(path: &Path, value: &T) -> AggregatorResult<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut tmp, value)?;
    tmp.write_all(b"\n")?;
    tmp.flush()?;
    tmp.as_file().sync_all()?;

    tmp.persist(path).map_err(|e| AggregatorError::Persist {
        path: path.display().to_string(),
        source: e.error,
    })?;
    Ok(())
}

/// Time gate: due when `interval` has elapsed since the last mark
#[derive(Debug, Clone)]
pub struct Throttle {
    interval: Duration,
    last: Option<Timestamp>,
}

impl Throttle {
    /// New throttle that is due immediately. Oversized intervals saturate.
    pub fn new(interval_secs: u64) -> Self {
        Self {
            interval: interval(interval_secs),
            last: None,
        }
    }

    pub fn is_due(&self, now: Timestamp) -> bool {
        match self.last {
            Some(last) => now.signed_duration_since(last) >= self.interval,
            None => true,
        }
    }

    pub fn mark(&mut self, now: Timestamp) {
        self.last = Some(now);
    }

    /// Mark and return true if due, otherwise leave untouched
    pub fn try_acquire(&mut self, now: Timestamp) -> bool {
        if self.is_due(now) {
            self.mark(now);
            true
        } else {
            false
        }
    }

    pub fn last(&self) -> Option<Timestamp> {
        self.last
    }
}
