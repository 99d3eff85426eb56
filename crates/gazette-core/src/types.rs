//! Core data types for sensor readings

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::CoreResult;

/// Flat, case-sensitive `{device}_{metric}` identifier
pub type SensorKey = String;

/// Wall-clock receipt time of a reading
pub type Timestamp = DateTime<Utc>;

/// One numeric history entry. Serialized as `[ts, value]`.
pub type Sample = (Timestamp, f64);

/// A sensor value as published on the feed
///
/// Numeric payloads become `Number`; anything else (weather condition text,
/// `unavailable`, ...) is kept verbatim as `Text`. `Null` only appears when
/// reading files written by other tools.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum SensorValue {
    Number(f64),
    Text(String),
    Null,
}

impl SensorValue {
    /// Parse a raw payload: trimmed UTF-8, float if possible, string otherwise
    pub fn parse(payload: &[u8]) -> CoreResult<Self> {
        let text = std::str::from_utf8(payload)?.trim();
        Ok(match text.parse::<f64>() {
            Ok(v) => SensorValue::Number(v),
            Err(_) => SensorValue::Text(text.to_string()),
        })
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SensorValue::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, SensorValue::Number(_))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SensorValue::Null)
    }
}

impl From<f64> for SensorValue {
    fn from(v: f64) -> Self {
        SensorValue::Number(v)
    }
}

impl From<&str> for SensorValue {
    fn from(v: &str) -> Self {
        SensorValue::Text(v.to_string())
    }
}

impl fmt::Display for SensorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorValue::Number(v) => write!(f, "{}", v),
            SensorValue::Text(s) => f.write_str(s),
            SensorValue::Null => f.write_str("null"),
        }
    }
}

/// A single accepted observation
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub timestamp: Timestamp,
    pub value: SensorValue,
}

impl Reading {
    pub fn new(timestamp: Timestamp, value: SensorValue) -> Self {
        Self { timestamp, value }
    }
}
