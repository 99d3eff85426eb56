//! Reading validation: unit normalisation, range checks, spike rejection

use gazette_core::{get_unit_group, Sample, TemperatureUnit, Timestamp, UnitGroup};
use thiserror::Error;

use crate::{interval, ValidationSettings};

/// Why a message was dropped without touching state
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Rejection {
    #[error("unexpected topic '{0}'")]
    MalformedTopic(String),

    #[error("payload on '{0}' is not valid UTF-8")]
    InvalidPayload(String),

    #[error("{key}: non-finite value")]
    NonFinite { key: String },

    #[error("{key}: {value} outside [{min}, {max}]")]
    OutOfRange {
        key: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("{key}: spike {previous} -> {value} (delta {delta:.1} > {threshold})")]
    Spike {
        key: String,
        value: f64,
        previous: f64,
        delta: f64,
        threshold: f64,
    },
}

/// Stateless checks applied to every numeric reading
#[derive(Debug, Clone)]
pub struct Validator {
    settings: ValidationSettings,
}

impl Validator {
    pub fn new(settings: ValidationSettings) -> Self {
        Self { settings }
    }

    /// Temperature scale a device reports in
    pub fn unit_for(&self, device: &str) -> TemperatureUnit {
        if let Some(unit) = self.settings.device_units.get(device) {
            return *unit;
        }
        match &self.settings.celsius_device_prefix {
            Some(prefix) if !prefix.is_empty() && device.starts_with(prefix.as_str()) => {
                TemperatureUnit::Celsius
            }
            _ => TemperatureUnit::Fahrenheit,
        }
    }

    /// Convert temperature-like readings to Fahrenheit; everything else as-is
    pub fn normalize(&self, device: &str, key: &str, value: f64) -> f64 {
        match get_unit_group(key) {
            Some(UnitGroup::Temperature) => gazette_core::convert(
                value,
                self.unit_for(device),
                TemperatureUnit::Fahrenheit,
            ),
            _ => value,
        }
    }

    fn bounds(&self, group: UnitGroup) -> (f64, f64) {
        match group {
            UnitGroup::Temperature => (self.settings.temp_min_f, self.settings.temp_max_f),
            UnitGroup::Humidity => (self.settings.humidity_min, self.settings.humidity_max),
        }
    }

    fn spike_threshold(&self, group: UnitGroup) -> f64 {
        match group {
            UnitGroup::Temperature => self.settings.spike_temp_threshold,
            UnitGroup::Humidity => self.settings.spike_humidity_threshold,
        }
    }

    /// Check an already-normalised value.
    ///
    /// `group_key` picks the unit group, `key` names the reading in
    /// rejections, `previous` is the last accepted sample for `key`.
    pub fn check(
        &self,
        group_key: &str,
        key: &str,
        value: f64,
        previous: Option<&Sample>,
        now: Timestamp,
    ) -> Result<(), Rejection> {
        if !value.is_finite() {
            return Err(Rejection::NonFinite {
                key: key.to_string(),
            });
        }

        let Some(group) = get_unit_group(group_key) else {
            return Ok(());
        };

        let (min, max) = self.bounds(group);
        if value < min || value > max {
            return Err(Rejection::OutOfRange {
                key: key.to_string(),
                value,
                min,
                max,
            });
        }

        if let Some((prev_ts, prev_value)) = previous {
            let window = interval(self.settings.spike_window);
            let threshold = self.spike_threshold(group);
            let delta = (value - prev_value).abs();
            if now.signed_duration_since(*prev_ts) < window && delta > threshold {
                return Err(Rejection::Spike {
                    key: key.to_string(),
                    value,
                    previous: *prev_value,
                    delta,
                    threshold,
                });
            }
        }

        Ok(())
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(ValidationSettings::default())
    }
}
