//! Unit groups and temperature normalisation
//!
//! Everything is stored in Fahrenheit / percent. Devices that report Celsius
//! are converted on the way in.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Unit conversion error
#[derive(Debug, thiserror::Error)]
pub enum UnitError {
    #[error("Unknown temperature unit: {0}")]
    UnknownUnit(String),
}

/// Unit group for a sensor key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitGroup {
    Temperature,
    Humidity,
}

/// Get the unit group for a sensor key by name
pub fn get_unit_group(key: &str) -> Option<UnitGroup> {
    if key.contains("temp") {
        Some(UnitGroup::Temperature)
    } else if key.contains("humidity") {
        Some(UnitGroup::Humidity)
    } else {
        None
    }
}

/// Temperature scale a device reports in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    Celsius,
    Fahrenheit,
}

impl FromStr for TemperatureUnit {
    type Err = UnitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "c" | "celsius" => Ok(TemperatureUnit::Celsius),
            "f" | "fahrenheit" => Ok(TemperatureUnit::Fahrenheit),
            other => Err(UnitError::UnknownUnit(other.to_string())),
        }
    }
}

pub fn celsius_to_fahrenheit(value: f64) -> f64 {
    value * 9.0 / 5.0 + 32.0
}

pub fn fahrenheit_to_celsius(value: f64) -> f64 {
    (value - 32.0) * 5.0 / 9.0
}

/// Convert a temperature between scales
pub fn convert(value: f64, from: TemperatureUnit, to: TemperatureUnit) -> f64 {
    match (from, to) {
        (TemperatureUnit::Celsius, TemperatureUnit::Fahrenheit) => celsius_to_fahrenheit(value),
        (TemperatureUnit::Fahrenheit, TemperatureUnit::Celsius) => fahrenheit_to_celsius(value),
        _ => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temperature_conversion() {
        assert!((celsius_to_fahrenheit(0.0) - 32.0).abs() < 0.001);
        assert!((celsius_to_fahrenheit(100.0) - 212.0).abs() < 0.001);
        assert!((celsius_to_fahrenheit(21.0) - 69.8).abs() < 0.001);
        assert!((fahrenheit_to_celsius(212.0) - 100.0).abs() < 0.001);
    }

    #[test]
    fn test_same_unit_conversion() {
        let result = convert(25.0, TemperatureUnit::Fahrenheit, TemperatureUnit::Fahrenheit);
        assert_eq!(result, 25.0);
    }

    #[test]
    fn test_unit_group_detection() {
        assert_eq!(get_unit_group("interior_temp"), Some(UnitGroup::Temperature));
        assert_eq!(
            get_unit_group("satellite-2_temperature"),
            Some(UnitGroup::Temperature)
        );
        assert_eq!(get_unit_group("exterior_humidity"), Some(UnitGroup::Humidity));
        assert_eq!(get_unit_group("satellite-2_battery"), None);
        // Case-sensitive, like the keys themselves
        assert_eq!(get_unit_group("interior_TEMP"), None);
    }

    #[test]
    fn test_unit_from_str() {
        assert_eq!("C".parse::<TemperatureUnit>().unwrap(), TemperatureUnit::Celsius);
        assert_eq!(
            "fahrenheit".parse::<TemperatureUnit>().unwrap(),
            TemperatureUnit::Fahrenheit
        );
        assert!("kelvin".parse::<TemperatureUnit>().is_err());
    }
}
