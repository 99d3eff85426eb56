//! Records persisted by the status daemon and read by everything else
//!
//! Field order is alphabetical so the serialized JSON has sorted keys.

use chrono::Duration;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::warn;

use crate::{SensorKey, SensorValue, Timestamp};

/// How far past "now" a stats window may end before it looks wrong
const WINDOW_CLOCK_SKEW_MINUTES: i64 = 5;

/// Default age after which a reading is considered stale
pub const DEFAULT_STALE_AFTER_SECONDS: i64 = 2 * 60 * 60;

/// `status.json`: latest value and last-seen time per key
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusSnapshot {
    #[serde(default)]
    pub last_seen: BTreeMap<SensorKey, Timestamp>,
    pub sensors: BTreeMap<SensorKey, SensorValue>,
    pub updated_at: Timestamp,
}

impl StatusSnapshot {
    /// A key is stale when it has never been seen or was last seen more than
    /// `threshold` before `now`.
    pub fn is_stale(&self, key: &str, now: Timestamp, threshold: Duration) -> bool {
        match self.last_seen.get(key) {
            Some(seen) => now.signed_duration_since(*seen) > threshold,
            None => true,
        }
    }

    /// Keys with a value whose reading is stale, in key order
    pub fn stale_keys(&self, now: Timestamp, threshold: Duration) -> Vec<&str> {
        self.sensors
            .keys()
            .filter(|k| self.is_stale(k, now, threshold))
            .map(String::as_str)
            .collect()
    }
}

/// `stats_24h.json`: min/max over the trailing window
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatsFile {
    pub metrics: BTreeMap<String, f64>,
    pub window_end: Timestamp,
    pub window_start: Timestamp,
}

impl StatsFile {
    /// Non-strict sanity check used by readers before trusting the metrics
    pub fn window_is_consistent(&self, now: Timestamp) -> bool {
        self.window_end >= self.window_start
            && self.window_end <= now + Duration::minutes(WINDOW_CLOCK_SKEW_MINUTES)
    }
}

/// One line of the monthly long-term log
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogEntry {
    pub sensors: BTreeMap<SensorKey, SensorValue>,
    pub ts: Timestamp,
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Option<T> {
    if !path.exists() {
        return None;
    }
    let parsed = fs::read_to_string(path)
        .map_err(|e| e.to_string())
        .and_then(|s| serde_json::from_str(&s).map_err(|e| e.to_string()));
    match parsed {
        Ok(v) => Some(v),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read JSON file");
            None
        }
    }
}

/// Read `status.json`; `None` if missing or malformed
pub fn read_status<P: AsRef<Path>>(path: P) -> Option<StatusSnapshot> {
    read_json(path.as_ref())
}

/// Read `stats_24h.json`; `None` if missing or malformed
pub fn read_stats<P: AsRef<Path>>(path: P) -> Option<StatsFile> {
    read_json(path.as_ref())
}
