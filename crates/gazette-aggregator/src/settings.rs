//! Tunables for the aggregator. Defaults match the deployed daemon.

use gazette_core::TemperatureUnit;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

/// Length of the rolling statistics window
pub const WINDOW_HOURS: i64 = 24;

/// Upper bound for any interval setting, in seconds (100 years)
pub const MAX_INTERVAL_SECS: u64 = 100 * 365 * 24 * 3600;

/// Seconds as a chrono duration, saturating at [`MAX_INTERVAL_SECS`]
pub fn interval(secs: u64) -> chrono::Duration {
    chrono::Duration::seconds(secs.min(MAX_INTERVAL_SECS) as i64)
}

#[derive(Debug, Clone)]
pub struct ValidationSettings {
    /// Inclusive temperature bounds, after conversion to Fahrenheit
    pub temp_min_f: f64,
    pub temp_max_f: f64,

    /// Inclusive relative humidity bounds (%)
    pub humidity_min: f64,
    pub humidity_max: f64,

    /// Readings closer than this (seconds) to the previous one are spike-checked
    pub spike_window: u64,
    pub spike_temp_threshold: f64,
    pub spike_humidity_threshold: f64,

    /// Devices whose name starts with this prefix report Celsius
    pub celsius_device_prefix: Option<String>,

    /// Explicit per-device temperature unit; wins over the prefix rule
    pub device_units: HashMap<String, TemperatureUnit>,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            temp_min_f: -10.0,
            temp_max_f: 130.0,
            humidity_min: 0.0,
            humidity_max: 100.0,
            spike_window: 600,
            spike_temp_threshold: 20.0,
            spike_humidity_threshold: 30.0,
            celsius_device_prefix: Some("satellite".to_string()),
            device_units: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AggregatorSettings {
    pub status_path: PathBuf,
    pub stats_path: PathBuf,
    pub cache_path: PathBuf,
    pub sensor_log_dir: PathBuf,

    /// Minimum seconds between status/stats write passes
    pub write_interval: u64,
    /// Minimum seconds between crash-cache writes
    pub cache_interval: u64,
    /// Minimum seconds between long-term log flushes
    pub log_flush_interval: u64,
    /// Long-term log entries held in memory before the oldest is dropped
    pub log_buffer_capacity: usize,

    pub max_samples_per_key: usize,

    /// Raw `{device}_{metric}` key -> logical key stored in the files
    pub key_aliases: BTreeMap<String, String>,

    pub validation: ValidationSettings,
}

impl Default for AggregatorSettings {
    fn default() -> Self {
        Self {
            status_path: PathBuf::from("/app/data/status.json"),
            stats_path: PathBuf::from("/app/data/stats_24h.json"),
            cache_path: PathBuf::from("/app/data/history_cache.json"),
            sensor_log_dir: PathBuf::from("/app/data/sensor_log"),
            write_interval: 60,
            cache_interval: 300,
            log_flush_interval: 300,
            log_buffer_capacity: 100,
            max_samples_per_key: 2000,
            key_aliases: BTreeMap::new(),
            validation: ValidationSettings::default(),
        }
    }
}

impl AggregatorSettings {
    /// Defaults with every file placed under `dir`
    pub fn in_dir<P: Into<PathBuf>>(dir: P) -> Self {
        let dir = dir.into();
        Self {
            status_path: dir.join("status.json"),
            stats_path: dir.join("stats_24h.json"),
            cache_path: dir.join("history_cache.json"),
            sensor_log_dir: dir.join("sensor_log"),
            ..Self::default()
        }
    }
}
