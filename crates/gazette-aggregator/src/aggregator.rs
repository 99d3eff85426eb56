//! The sensor aggregator: one owned value holding all daemon state

use chrono::{Duration, Utc};
use gazette_core::{
    get_unit_group, min_max_metrics, LogEntry, Reading, SensorKey, SensorTopic, SensorValue,
    StatsFile, StatusSnapshot, Timestamp,
};
use std::collections::BTreeMap;
use tracing::{debug, error, info, instrument, warn};

use crate::{
    atomic_write_json, AggregatorResult, AggregatorSettings, HistoryBuffer, HistoryCache,
    LongTermLog, Rejection, Throttle, Validator, WINDOW_HOURS,
};

/// Result of handling one message
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Accepted { key: SensorKey, reading: Reading },
    Rejected(Rejection),
}

impl Outcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Outcome::Accepted { .. })
    }
}

/// Latest values, last-seen times, and 24h history for every sensor key
pub struct SensorAggregator {
    settings: AggregatorSettings,
    validator: Validator,
    latest: BTreeMap<SensorKey, SensorValue>,
    last_seen: BTreeMap<SensorKey, Timestamp>,
    history: BTreeMap<SensorKey, HistoryBuffer>,
    write_throttle: Throttle,
    cache_throttle: Throttle,
    log: LongTermLog,
    /// Accepted readings not yet in the crash cache
    dirty: bool,
}

impl SensorAggregator {
    pub fn new(settings: AggregatorSettings) -> Self {
        let validator = Validator::new(settings.validation.clone());
        let log = LongTermLog::new(
            settings.sensor_log_dir.clone(),
            settings.log_buffer_capacity,
            settings.log_flush_interval,
        );
        Self {
            write_throttle: Throttle::new(settings.write_interval),
            cache_throttle: Throttle::new(settings.cache_interval),
            validator,
            log,
            latest: BTreeMap::new(),
            last_seen: BTreeMap::new(),
            history: BTreeMap::new(),
            settings,
            dirty: false,
        }
    }

    fn window_start(now: Timestamp) -> Timestamp {
        now - Duration::hours(WINDOW_HOURS)
    }

    /// Repopulate state from the crash-recovery cache.
    ///
    /// Returns the number of keys restored. A missing cache is a cold start;
    /// an unreadable one is logged and also treated as a cold start.
    #[instrument(skip(self))]
    pub fn restore(&mut self, now: Timestamp) -> usize {
        let path = self.settings.cache_path.clone();
        let cache = match HistoryCache::load(&path) {
            Ok(Some(cache)) => cache,
            Ok(None) => {
                info!(path = %path.display(), "No history cache found, starting cold");
                return 0;
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Unreadable history cache, starting cold");
                return 0;
            }
        };

        let cutoff = Self::window_start(now);
        let max = self.settings.max_samples_per_key;
        self.history = cache
            .history
            .into_iter()
            .map(|(key, samples)| (key, HistoryBuffer::restore(samples, cutoff, max)))
            .filter(|(_, buffer)| !buffer.is_empty())
            .collect();
        self.latest = cache.latest_values;
        self.last_seen = cache.last_seen;

        let samples: usize = self.history.values().map(HistoryBuffer::len).sum();
        info!(
            keys = self.latest.len(),
            samples,
            saved_at = ?cache.saved_at,
            "Restored state from history cache"
        );
        self.latest.len()
    }

    /// Handle one message stamped with the current time
    pub fn handle_message(&mut self, topic: &str, payload: &[u8]) -> Outcome {
        self.handle_message_at(topic, payload, Utc::now())
    }

    /// Validate and fold one message into state, then run any due writes.
    ///
    /// Never fails: rejections are logged and returned, write errors are
    /// logged and retried on a later pass.
    pub fn handle_message_at(&mut self, topic: &str, payload: &[u8], now: Timestamp) -> Outcome {
        let outcome = match self.ingest(topic, payload, now) {
            Ok((key, value)) => {
                debug!(%topic, %key, %value, "Updated sensor");
                self.dirty = true;
                Outcome::Accepted {
                    key,
                    reading: Reading::new(now, value),
                }
            }
            Err(rejection) => {
                match &rejection {
                    Rejection::MalformedTopic(_) => info!(%topic, "Ignoring message on unexpected topic"),
                    other => warn!(%topic, reason = %other, "Rejected reading"),
                }
                return Outcome::Rejected(rejection);
            }
        };

        self.write_if_due(now);
        self.save_cache_if_due(now);
        if let Err(e) = self.log.flush_if_due(now) {
            error!(error = %e, pending = self.log.len(), "Failed to flush long-term log");
        }

        outcome
    }

    fn ingest(
        &mut self,
        topic: &str,
        payload: &[u8],
        now: Timestamp,
    ) -> Result<(SensorKey, SensorValue), Rejection> {
        let parsed =
            SensorTopic::parse(topic).ok_or_else(|| Rejection::MalformedTopic(topic.to_string()))?;
        let raw_key = parsed.key();
        let value = SensorValue::parse(payload)
            .map_err(|_| Rejection::InvalidPayload(topic.to_string()))?;
        let key = self.resolve_alias(&raw_key);

        let value = match value {
            SensorValue::Number(v) => {
                let v = self.validator.normalize(parsed.device, &raw_key, v);
                let previous = self.history.get(&key).and_then(HistoryBuffer::last);
                // The logical key decides the unit group when the raw one is opaque
                let group_key = if get_unit_group(&raw_key).is_some() {
                    raw_key.as_str()
                } else {
                    key.as_str()
                };
                self.validator.check(group_key, &key, v, previous, now)?;

                let max = self.settings.max_samples_per_key;
                let evicted = self
                    .history
                    .entry(key.clone())
                    .or_insert_with(|| HistoryBuffer::new(max))
                    .push(now, v);
                if evicted > 0 {
                    debug!(%key, evicted, "History cap reached");
                }
                SensorValue::Number(v)
            }
            other => other,
        };

        self.latest.insert(key.clone(), value.clone());
        self.last_seen.insert(key.clone(), now);
        Ok((key, value))
    }

    fn resolve_alias(&self, raw_key: &str) -> SensorKey {
        self.settings
            .key_aliases
            .get(raw_key)
            .cloned()
            .unwrap_or_else(|| raw_key.to_string())
    }

    /// Drop samples older than the window and compute min/max per key
    pub fn prune_and_compute_stats(&mut self, now: Timestamp) -> BTreeMap<String, f64> {
        let cutoff = Self::window_start(now);
        let mut dropped = 0;
        for buffer in self.history.values_mut() {
            dropped += buffer.prune_before(cutoff);
        }
        self.history.retain(|_, buffer| !buffer.is_empty());
        if dropped > 0 {
            debug!(dropped, "Pruned samples outside the window");
        }

        min_max_metrics(
            self.history
                .iter()
                .map(|(key, buffer)| (key.as_str(), buffer.values())),
        )
    }

    /// Run the status/stats pass if the write interval has elapsed.
    ///
    /// Returns true when a pass ran (whether or not every file was written).
    #[instrument(skip(self))]
    pub fn write_if_due(&mut self, now: Timestamp) -> bool {
        if !self.write_throttle.try_acquire(now) {
            return false;
        }

        let status = self.status_snapshot(now);
        match atomic_write_json(&self.settings.status_path, &status) {
            Ok(()) => debug!(
                path = %self.settings.status_path.display(),
                sensors = status.sensors.len(),
                "Wrote status snapshot"
            ),
            Err(e) => error!(path = %self.settings.status_path.display(), error = %e, "Failed to write status snapshot"),
        }

        let stats = StatsFile {
            metrics: self.prune_and_compute_stats(now),
            window_end: now,
            window_start: Self::window_start(now),
        };
        match atomic_write_json(&self.settings.stats_path, &stats) {
            Ok(()) => debug!(
                path = %self.settings.stats_path.display(),
                metrics = stats.metrics.len(),
                "Wrote 24h stats"
            ),
            Err(e) => error!(path = %self.settings.stats_path.display(), error = %e, "Failed to write 24h stats"),
        }

        self.log.push(LogEntry {
            sensors: self.latest.clone(),
            ts: now,
        });
        true
    }

    fn save_cache_if_due(&mut self, now: Timestamp) {
        if !self.cache_throttle.try_acquire(now) {
            return;
        }
        if let Err(e) = self.save_cache(now) {
            error!(path = %self.settings.cache_path.display(), error = %e, "Failed to save history cache");
        }
    }

    /// Write the crash-recovery cache unconditionally
    pub fn save_cache(&mut self, now: Timestamp) -> AggregatorResult<()> {
        let cache = self.to_cache(now);
        cache.save(&self.settings.cache_path)?;
        self.dirty = false;
        debug!(
            path = %self.settings.cache_path.display(),
            keys = cache.latest_values.len(),
            samples = cache.sample_count(),
            "Saved history cache"
        );
        Ok(())
    }

    fn to_cache(&self, now: Timestamp) -> HistoryCache {
        HistoryCache {
            history: self
                .history
                .iter()
                .map(|(key, buffer)| (key.clone(), buffer.to_vec()))
                .collect(),
            last_seen: self.last_seen.clone(),
            latest_values: self.latest.clone(),
            saved_at: Some(now),
        }
    }

    /// Save the cache and flush the long-term log regardless of throttles.
    ///
    /// Used on disconnect and shutdown.
    pub fn persist(&mut self, now: Timestamp) {
        if let Err(e) = self.save_cache(now) {
            error!(error = %e, "Failed to save history cache during shutdown");
        }
        match self.log.flush() {
            Ok(n) if n > 0 => info!(entries = n, "Flushed long-term log"),
            Ok(_) => {}
            Err(e) => error!(error = %e, pending = self.log.len(), "Failed to flush long-term log"),
        }
    }

    pub fn status_snapshot(&self, now: Timestamp) -> StatusSnapshot {
        StatusSnapshot {
            last_seen: self.last_seen.clone(),
            sensors: self.latest.clone(),
            updated_at: now,
        }
    }

    pub fn latest(&self, key: &str) -> Option<&SensorValue> {
        self.latest.get(key)
    }

    pub fn last_seen(&self, key: &str) -> Option<Timestamp> {
        self.last_seen.get(key).copied()
    }

    pub fn history(&self, key: &str) -> Option<&HistoryBuffer> {
        self.history.get(key)
    }

    /// Whether anything was accepted since the last successful cache save
    pub fn has_unsaved_changes(&self) -> bool {
        self.dirty
    }

    pub fn pending_log_entries(&self) -> usize {
        self.log.len()
    }

    pub fn settings(&self) -> &AggregatorSettings {
        &self.settings
    }
}
