//! Crash-recovery cache
//!
//! Internal format, not read by anything but this daemon on restart.

use gazette_core::{Sample, SensorKey, SensorValue, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::{atomic_write_json, AggregatorResult};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HistoryCache {
    #[serde(default)]
    pub history: BTreeMap<SensorKey, Vec<Sample>>,
    #[serde(default)]
    pub last_seen: BTreeMap<SensorKey, Timestamp>,
    #[serde(default)]
    pub latest_values: BTreeMap<SensorKey, SensorValue>,
    pub saved_at: Option<Timestamp>,
}

impl HistoryCache {
    pub fn save(&self, path: &Path) -> AggregatorResult<()> {
        atomic_write_json(path, self)
    }

    /// Load the cache; `Ok(None)` when no cache has been written yet
    pub fn load(path: &Path) -> AggregatorResult<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&text)?))
    }

    pub fn sample_count(&self) -> usize {
        self.history.values().map(Vec::len).sum()
    }
}
