use gazette_aggregator::{AggregatorSettings, MAX_INTERVAL_SECS};
use gazette_core::TemperatureUnit;
use gazette_ingest::MqttSettings;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Optional TOML overlay for things that don't fit in an env var
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    /// Device name -> temperature unit ("c", "celsius", "f", "fahrenheit")
    #[serde(default)]
    pub devices: BTreeMap<String, String>,
    /// Raw `{device}_{metric}` key -> logical key
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub mqtt: MqttSettings,
    pub aggregator: AggregatorSettings,
    /// Seconds between reconnect attempts
    pub reconnect_delay: u64,
    /// Overlay file that was applied, if any
    pub config_file: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid value for {var}: '{value}'")]
    InvalidValue { var: String, value: String },
    #[error("Unknown temperature unit '{unit}' for device '{device}'")]
    InvalidUnit { device: String, unit: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

fn parse_var<T: FromStr>(var: &str, value: Option<String>, default: T) -> ConfigResult<T> {
    match value {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
            var: var.to_string(),
            value: raw,
        }),
    }
}

/// Interval in seconds, bounded by [`MAX_INTERVAL_SECS`]
fn parse_secs(var: &str, value: Option<String>, default: u64) -> ConfigResult<u64> {
    let raw = value.clone();
    let secs = parse_var(var, value, default)?;
    if secs > MAX_INTERVAL_SECS {
        return Err(ConfigError::InvalidValue {
            var: var.to_string(),
            value: raw.unwrap_or_else(|| secs.to_string()),
        });
    }
    Ok(secs)
}

impl AppConfig {
    /// Load from the process environment, then apply GAZETTE_CONFIG if it exists
    pub fn load() -> ConfigResult<Self> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable source. Unset variables take their defaults.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = AppConfig {
            reconnect_delay: 5,
            ..Default::default()
        };

        let mqtt = &mut cfg.mqtt;
        if let Some(host) = lookup("MQTT_HOST") {
            mqtt.host = host;
        }
        mqtt.port = parse_var("MQTT_PORT", lookup("MQTT_PORT"), mqtt.port)?;
        mqtt.username = lookup("MQTT_USERNAME").filter(|s| !s.is_empty());
        mqtt.password = lookup("MQTT_PASSWORD").filter(|s| !s.is_empty());
        if let Some(id) = lookup("MQTT_CLIENT_ID") {
            mqtt.client_id = id;
        }

        let agg = &mut cfg.aggregator;
        if let Some(p) = lookup("STATUS_PATH") {
            agg.status_path = p.into();
        }
        if let Some(p) = lookup("STATS_24H_PATH") {
            agg.stats_path = p.into();
        }
        if let Some(p) = lookup("HISTORY_CACHE_PATH") {
            agg.cache_path = p.into();
        }
        if let Some(p) = lookup("SENSOR_LOG_DIR") {
            agg.sensor_log_dir = p.into();
        }
        agg.write_interval = parse_secs(
            "STATUS_WRITE_INTERVAL",
            lookup("STATUS_WRITE_INTERVAL"),
            agg.write_interval,
        )?;
        agg.cache_interval = parse_secs(
            "CACHE_WRITE_INTERVAL",
            lookup("CACHE_WRITE_INTERVAL"),
            agg.cache_interval,
        )?;
        agg.log_flush_interval = parse_secs(
            "LOG_FLUSH_INTERVAL",
            lookup("LOG_FLUSH_INTERVAL"),
            agg.log_flush_interval,
        )?;
        agg.log_buffer_capacity = parse_var(
            "LOG_BUFFER_CAPACITY",
            lookup("LOG_BUFFER_CAPACITY"),
            agg.log_buffer_capacity,
        )?;
        agg.max_samples_per_key = parse_var(
            "MAX_SAMPLES_PER_KEY",
            lookup("MAX_SAMPLES_PER_KEY"),
            agg.max_samples_per_key,
        )?;

        let v = &mut agg.validation;
        v.temp_min_f = parse_var("TEMP_MIN_F", lookup("TEMP_MIN_F"), v.temp_min_f)?;
        v.temp_max_f = parse_var("TEMP_MAX_F", lookup("TEMP_MAX_F"), v.temp_max_f)?;
        v.humidity_min = parse_var("HUMIDITY_MIN", lookup("HUMIDITY_MIN"), v.humidity_min)?;
        v.humidity_max = parse_var("HUMIDITY_MAX", lookup("HUMIDITY_MAX"), v.humidity_max)?;
        v.spike_window = parse_secs(
            "SPIKE_WINDOW_SECONDS",
            lookup("SPIKE_WINDOW_SECONDS"),
            v.spike_window,
        )?;
        v.spike_temp_threshold = parse_var(
            "SPIKE_TEMP_THRESHOLD",
            lookup("SPIKE_TEMP_THRESHOLD"),
            v.spike_temp_threshold,
        )?;
        v.spike_humidity_threshold = parse_var(
            "SPIKE_HUMIDITY_THRESHOLD",
            lookup("SPIKE_HUMIDITY_THRESHOLD"),
            v.spike_humidity_threshold,
        )?;
        // An empty prefix turns the prefix rule off
        if let Some(prefix) = lookup("CELSIUS_DEVICE_PREFIX") {
            v.celsius_device_prefix = Some(prefix).filter(|p| !p.is_empty());
        }

        cfg.reconnect_delay = parse_secs(
            "RECONNECT_DELAY_SECONDS",
            lookup("RECONNECT_DELAY_SECONDS"),
            cfg.reconnect_delay,
        )?;

        let path = lookup("GAZETTE_CONFIG").unwrap_or_else(|| "gazette.toml".to_string());
        if Path::new(&path).exists() {
            let file = FileConfig::read(&path)?;
            cfg.apply_file(file)?;
            cfg.config_file = Some(PathBuf::from(path));
        }

        Ok(cfg)
    }

    /// Merge the device table and aliases from a config file
    pub fn apply_file(&mut self, file: FileConfig) -> ConfigResult<()> {
        for (device, unit) in file.devices {
            let parsed =
                TemperatureUnit::from_str(&unit).map_err(|_| ConfigError::InvalidUnit {
                    device: device.clone(),
                    unit: unit.clone(),
                })?;
            self.aggregator
                .validation
                .device_units
                .insert(device, parsed);
        }
        self.aggregator.key_aliases.extend(file.aliases);
        Ok(())
    }
}

impl FileConfig {
    pub fn read<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let s = fs::read_to_string(path)?;
        Ok(toml::from_str(&s)?)
    }
}
