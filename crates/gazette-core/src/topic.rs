//! MQTT topic layout: `greenhouse/{device}/sensor/{metric}/state`

use crate::SensorKey;

/// Subscription filter for every sensor state topic
pub const TOPIC_FILTER: &str = "greenhouse/+/sensor/+/state";

const NAMESPACE: &str = "greenhouse";
const KIND: &str = "sensor";
const TERMINAL: &str = "state";

/// Borrowed view of a well-formed sensor topic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorTopic<'a> {
    pub device: &'a str,
    pub metric: &'a str,
}

impl<'a> SensorTopic<'a> {
    /// Split a topic into device and metric. Anything other than exactly five
    /// segments with the fixed namespace, kind and terminal is rejected.
    pub fn parse(topic: &'a str) -> Option<Self> {
        let mut parts = topic.split('/');
        let (Some(ns), Some(device), Some(kind), Some(metric), Some(terminal), None) = (
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
        ) else {
            return None;
        };

        if ns != NAMESPACE || kind != KIND || terminal != TERMINAL {
            return None;
        }
        if device.is_empty() || metric.is_empty() {
            return None;
        }

        Some(Self { device, metric })
    }

    pub fn key(&self) -> SensorKey {
        format!("{}_{}", self.device, self.metric)
    }
}

/// Derive the flat sensor key for a topic, if it is well formed
pub fn derive_key(topic: &str) -> Option<SensorKey> {
    SensorTopic::parse(topic).map(|t| t.key())
}
