use crate::error::{AppError, Result};
use crate::models::OutletState;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The part of a usage message the multi-device graph needs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UsageReading {
    pub wattage: f64,
}

impl UsageReading {
    pub fn parse(topic: &str, payload: &[u8]) -> Result<Self> {
        let reading: UsageReading = serde_json::from_slice(payload)
            .map_err(|e| AppError::invalid_payload(topic, e.to_string()))?;
        ensure_finite(topic, "wattage", reading.wattage)?;
        Ok(reading)
    }
}

/// Full usage message as published by a monitor device every poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageReport {
    pub wattage: f64,
    /// Current wattage minus the average for this hour
    pub difference: f64,
    /// Hue, saturation, value in 0..=1; the device derives it from `difference`
    pub diff_color: [f64; 3],
    #[serde(default)]
    pub outlets: BTreeMap<String, OutletState>,
}

impl UsageReport {
    pub fn parse(topic: &str, payload: &[u8]) -> Result<Self> {
        let report: UsageReport = serde_json::from_slice(payload)
            .map_err(|e| AppError::invalid_payload(topic, e.to_string()))?;
        report.validate(topic)?;
        Ok(report)
    }

    fn validate(&self, topic: &str) -> Result<()> {
        ensure_finite(topic, "wattage", self.wattage)?;
        ensure_finite(topic, "difference", self.difference)?;
        for component in self.diff_color {
            if !(0.0..=1.0).contains(&component) {
                return Err(AppError::invalid_payload(
                    topic,
                    format!("diff_color component {} outside 0..=1", component),
                ));
            }
        }
        for (name, outlet) in &self.outlets {
            ensure_finite(topic, &format!("outlets.{}.wattage", name), outlet.wattage)?;
        }
        Ok(())
    }
}

/// Broker bridge state for a device: `"1"` means the bridge is up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    Disconnected,
}

impl ConnectionState {
    pub fn from_payload(payload: &[u8]) -> Self {
        if payload == b"1" {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }
}

fn ensure_finite(topic: &str, field: &str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(AppError::invalid_payload(
            topic,
            format!("{} is not a finite number", field),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOPIC: &str = "devices/abc/monitor/usage";

    #[test]
    fn test_reading_ignores_extra_fields() {
        let payload = br#"{"wattage": 42.5, "difference": 1.0, "outlets": {}}"#;

        let reading = UsageReading::parse(TOPIC, payload).unwrap();
        assert_eq!(reading.wattage, 42.5);
    }

    #[test]
    fn test_reading_without_wattage_is_rejected() {
        let err = UsageReading::parse(TOPIC, br#"{"difference": 1.0}"#).unwrap_err();

        assert!(matches!(err, AppError::InvalidPayload { .. }));
    }

    #[test]
    fn test_report_parses_device_payload() {
        let payload = br#"{
            "wattage": 120.0,
            "difference": -3.25,
            "diff_color": [0.25, 1.0, 0.6],
            "outlets": {"lamp": {"enabled": true, "wattage": 120.0}}
        }"#;

        let report = UsageReport::parse(TOPIC, payload).unwrap();
        assert_eq!(report.difference, -3.25);
        assert_eq!(report.outlets["lamp"].enabled, true);
    }

    #[test]
    fn test_report_rejects_out_of_range_color() {
        let payload = br#"{"wattage": 1.0, "difference": 0.0, "diff_color": [2.0, 1.0, 0.5]}"#;

        let err = UsageReport::parse(TOPIC, payload).unwrap_err();
        assert!(err.to_string().contains("diff_color"));
    }

    #[test]
    fn test_report_rejects_string_wattage() {
        let payload = br#"{"wattage": "abc", "difference": 0.0, "diff_color": [0.2, 1.0, 0.5]}"#;

        assert!(UsageReport::parse(TOPIC, payload).is_err());
    }

    #[test]
    fn test_connection_state_payloads() {
        assert_eq!(ConnectionState::from_payload(b"1"), ConnectionState::Connected);
        assert_eq!(ConnectionState::from_payload(b"0"), ConnectionState::Disconnected);
        assert_eq!(ConnectionState::from_payload(b""), ConnectionState::Disconnected);
        assert_eq!(ConnectionState::from_payload(b"11"), ConnectionState::Disconnected);
    }
}
