//! Batched long-term log: `{dir}/YYYY-MM.jsonl`, one snapshot per line

use gazette_core::{LogEntry, Timestamp};
use std::collections::VecDeque;
use std::fs::{create_dir_all, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::{AggregatorResult, Throttle};

/// In-memory queue of snapshots waiting to be appended to the monthly file
pub struct LongTermLog {
    dir: PathBuf,
    buffer: VecDeque<LogEntry>,
    capacity: usize,
    flush_throttle: Throttle,
    evicted: u64,
}

impl LongTermLog {
    pub fn new<P: Into<PathBuf>>(dir: P, capacity: usize, flush_interval: u64) -> Self {
        let capacity = capacity.max(1);
        Self {
            dir: dir.into(),
            buffer: VecDeque::with_capacity(capacity),
            capacity,
            flush_throttle: Throttle::new(flush_interval),
            evicted: 0,
        }
    }

    /// Monthly file an entry belongs to
    pub fn file_for(&self, ts: Timestamp) -> PathBuf {
        self.dir.join(format!("{}.jsonl", ts.format("%Y-%m")))
    }

    /// Queue an entry, dropping the oldest one when full
    pub fn push(&mut self, entry: LogEntry) {
        if self.buffer.len() >= self.capacity {
            if let Some(dropped) = self.buffer.pop_front() {
                self.evicted += 1;
                warn!(
                    dropped_ts = %dropped.ts,
                    capacity = self.capacity,
                    total_evicted = self.evicted,
                    "long-term log buffer full, dropping oldest entry"
                );
            }
        }
        self.buffer.push_back(entry);
    }

    /// Flush if the flush interval has elapsed. Returns entries written.
    pub fn flush_if_due(&mut self, now: Timestamp) -> AggregatorResult<usize> {
        if !self.flush_throttle.try_acquire(now) {
            return Ok(0);
        }
        self.flush()
    }

    /// Append every buffered entry to its monthly file.
    ///
    /// Entries are removed only once written; on error the rest stay queued.
    pub fn flush(&mut self) -> AggregatorResult<usize> {
        if self.buffer.is_empty() {
            return Ok(0);
        }
        create_dir_all(&self.dir)?;

        let mut written = 0;
        while let Some(first) = self.buffer.front() {
            let path = self.file_for(first.ts);
            let batch = self
                .buffer
                .iter()
                .take_while(|e| self.file_for(e.ts) == path)
                .count();

            append_lines(&path, self.buffer.iter().take(batch))?;
            self.buffer.drain(..batch);
            written += batch;
            debug!(path = %path.display(), entries = batch, "appended long-term log batch");
        }

        Ok(written)
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Entries dropped because the buffer was full
    pub fn evicted(&self) -> u64 {
        self.evicted
    }
}

/// Append one JSON line per entry. The batch lands whole or not at all.
fn append_lines<'a, I>(path: &Path, entries: I) -> AggregatorResult<()>
where
    I: IntoIterator<Item = &'a LogEntry>,
{
    let mut buf = Vec::new();
    for entry in entries {
        serde_json::to_writer(&mut buf, entry)?;
        buf.push(b'\n');
    }

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    append_or_rewind(&mut file, &buf)?;
    Ok(())
}

/// Append-only sink that can be cut back to an earlier length
trait AppendTarget: Write {
    fn current_len(&self) -> io::Result<u64>;
    fn truncate_to(&mut self, len: u64) -> io::Result<()>;
    fn sync(&self) -> io::Result<()>;
}

impl AppendTarget for File {
    fn current_len(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn truncate_to(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }

    fn sync(&self) -> io::Result<()> {
        self.sync_data()
    }
}

/// Write `buf` in full, or cut the target back to where it started
fn append_or_rewind<T: AppendTarget>(target: &mut T, buf: &[u8]) -> io::Result<()> {
    let start = target.current_len()?;
    let result = target
        .write_all(buf)
        .and_then(|()| target.flush())
        .and_then(|()| target.sync());

    if let Err(e) = result {
        if let Err(rewind) = target.truncate_to(start) {
            warn!(error = %rewind, len = start, "could not cut back partial long-term log append");
        }
        return Err(e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use gazette_core::SensorValue;
    use std::collections::BTreeMap;

    fn entry(month: u32, day: u32, temp: f64) -> LogEntry {
        let mut sensors = BTreeMap::new();
        sensors.insert("interior_temp".to_string(), SensorValue::Number(temp));
        LogEntry {
            sensors,
            ts: Utc.with_ymd_and_hms(2024, month, day, 12, 0, 0).unwrap(),
        }
    }

    fn read_lines(path: &Path) -> Vec<LogEntry> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn test_writes_jsonl_per_month() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = LongTermLog::new(dir.path().join("sensor_log"), 10, 300);
        log.push(entry(5, 31, 70.0));
        log.push(entry(6, 1, 71.0));
        log.push(entry(6, 2, 72.0));

        assert_eq!(log.flush().unwrap(), 3);
        assert!(log.is_empty());

        let may = read_lines(&dir.path().join("sensor_log/2024-05.jsonl"));
        let june = read_lines(&dir.path().join("sensor_log/2024-06.jsonl"));
        assert_eq!(may.len(), 1);
        assert_eq!(june.len(), 2);
        assert_eq!(june[1].sensors["interior_temp"], SensorValue::Number(72.0));
    }

    #[test]
    fn test_appends_across_flushes() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = LongTermLog::new(dir.path(), 10, 300);
        log.push(entry(6, 1, 70.0));
        log.flush().unwrap();
        log.push(entry(6, 2, 71.0));
        log.flush().unwrap();

        assert_eq!(read_lines(&dir.path().join("2024-06.jsonl")).len(), 2);
    }

    #[test]
    fn test_evicts_oldest_when_full() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = LongTermLog::new(dir.path(), 2, 300);
        log.push(entry(6, 1, 70.0));
        log.push(entry(6, 2, 71.0));
        log.push(entry(6, 3, 72.0));

        assert_eq!(log.len(), 2);
        assert_eq!(log.evicted(), 1);
        log.flush().unwrap();
        let lines = read_lines(&dir.path().join("2024-06.jsonl"));
        assert_eq!(lines[0].sensors["interior_temp"], SensorValue::Number(71.0));
    }

    #[test]
    fn test_failed_flush_keeps_entries() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the log directory should be
        let blocker = dir.path().join("sensor_log");
        std::fs::write(&blocker, "").unwrap();

        let mut log = LongTermLog::new(&blocker, 5, 300);
        log.push(entry(6, 1, 70.0));
        assert!(log.flush().is_err());
        assert_eq!(log.len(), 1);
    }

    /// Accepts `room` more bytes, then fails like a full disk
    struct ShortDisk {
        data: Vec<u8>,
        room: usize,
    }

    impl Write for ShortDisk {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.room == 0 {
                return Err(io::Error::new(io::ErrorKind::Other, "no space left on device"));
            }
            let n = buf.len().min(self.room);
            self.data.extend_from_slice(&buf[..n]);
            self.room -= n;
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl AppendTarget for ShortDisk {
        fn current_len(&self) -> io::Result<u64> {
            Ok(self.data.len() as u64)
        }

        fn truncate_to(&mut self, len: u64) -> io::Result<()> {
            self.data.truncate(len as usize);
            Ok(())
        }

        fn sync(&self) -> io::Result<()> {
            Ok(())
        }
    }

    fn encoded(entries: &[LogEntry]) -> Vec<u8> {
        let mut buf = Vec::new();
        for e in entries {
            serde_json::to_writer(&mut buf, e).unwrap();
            buf.push(b'\n');
        }
        buf
    }

    #[test]
    fn test_partial_append_is_rewound() {
        let existing = encoded(&[entry(6, 1, 70.0)]);
        let batch: Vec<LogEntry> = (0..100).map(|i| entry(6, 2, 60.0 + i as f64)).collect();
        let batch = encoded(&batch);

        // Room for a few lines and part of the next one
        let mut disk = ShortDisk {
            data: existing.clone(),
            room: batch.len() / 3 + 7,
        };
        assert!(append_or_rewind(&mut disk, &batch).is_err());
        assert_eq!(disk.data, existing);

        // Space frees up: the retry lands exactly once
        disk.room = usize::MAX;
        append_or_rewind(&mut disk, &batch).unwrap();
        let lines: Vec<LogEntry> = std::str::from_utf8(&disk.data)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 101);
        assert_eq!(lines[100].sensors["interior_temp"], SensorValue::Number(159.0));
    }

    #[test]
    fn test_flush_is_throttled() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = LongTermLog::new(dir.path(), 10, 300);
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();

        log.push(entry(6, 1, 70.0));
        assert_eq!(log.flush_if_due(start).unwrap(), 1);

        log.push(entry(6, 1, 71.0));
        assert_eq!(
            log.flush_if_due(start + chrono::Duration::seconds(120)).unwrap(),
            0
        );
        assert_eq!(log.len(), 1);
        assert_eq!(
            log.flush_if_due(start + chrono::Duration::seconds(300)).unwrap(),
            1
        );
    }
}
