//! # Sensor Module
//!
//! Maps configured field definitions over decoded VBus packets.
//!
//! This module handles:
//! - Field definitions (name, offset, size, format, scale factor)
//! - Typed extraction dispatch per field format
//! - Attribute key normalization
//! - Per-field failure isolation: one bad field never blocks the rest

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::VBusError;
use crate::vbus::protocol::DEFAULT_TEMPERATURE_FACTOR;
use crate::vbus::Packet;

/// How a field's payload bytes are interpreted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldFormat {
    /// Unsigned little-endian integer
    #[default]
    Raw,

    /// Scaled signed temperature
    Temperature,

    /// Minutes since midnight, rendered as "HH:MM"
    Time,
}

/// One extracted field value
///
/// Serializes untagged, so attribute maps log as bare numbers and strings.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Raw(u64),
    Temperature(f64),
    Time(String),
}

/// Definition of one field to extract from matching packets
///
/// Owned by the configuration, not by the decoder: the decoder only sees
/// the offset, size, and factor of each extraction call.
#[derive(Debug, Clone, Deserialize)]
pub struct FieldSpec {
    /// Human-readable field name; also the source of the attribute key
    pub name: String,

    /// Byte offset into the assembled payload
    #[serde(default)]
    pub offset: usize,

    /// Field width in bytes
    #[serde(default = "default_field_size")]
    pub size: usize,

    /// Interpretation of the field's bytes
    #[serde(default)]
    pub format: FieldFormat,

    /// Scale factor for temperature fields; 0.1 when absent
    #[serde(default)]
    pub factor: Option<f64>,
}

fn default_field_size() -> usize {
    2
}

impl FieldSpec {
    /// Attribute key for this field: lowercased, spaces become underscores
    pub fn key(&self) -> String {
        self.name.to_lowercase().replace(' ', "_")
    }

    /// Extract this field's value from a decoded packet
    ///
    /// # Errors
    ///
    /// Returns [`VBusError::OffsetOutOfRange`] if the field reaches past
    /// the end of the packet's payload.
    pub fn extract(&self, packet: &Packet) -> Result<FieldValue, VBusError> {
        match self.format {
            FieldFormat::Raw => packet
                .raw_value(self.offset, self.size)
                .map(FieldValue::Raw),
            FieldFormat::Temperature => {
                let factor = self.factor.unwrap_or(DEFAULT_TEMPERATURE_FACTOR);
                packet
                    .temperature_value(self.offset, self.size, factor)
                    .map(FieldValue::Temperature)
            }
            FieldFormat::Time => packet
                .time_value(self.offset, self.size)
                .map(FieldValue::Time),
        }
    }
}

/// A named sensor that extracts its configured fields from packets
#[derive(Debug, Clone)]
pub struct VbusSensor {
    name: String,
    fields: Vec<FieldSpec>,
}

impl VbusSensor {
    /// Create a sensor from a name and its field definitions
    pub fn new(name: impl Into<String>, fields: Vec<FieldSpec>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    /// Name of the sensor
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configured field definitions
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Extract every configured field from a decoded packet
    ///
    /// A field whose extraction fails is logged at warn level and skipped;
    /// the remaining fields are still extracted, so one misconfigured
    /// offset never hides the other readings.
    pub fn process_packet(&self, packet: &Packet) -> BTreeMap<String, FieldValue> {
        let mut values = BTreeMap::new();

        for field in &self.fields {
            match field.extract(packet) {
                Ok(value) => {
                    values.insert(field.key(), value);
                }
                Err(e) => {
                    warn!("Field {} failed: {}", field.name, e);
                }
            }
        }

        values
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vbus::decode;

    /// Single-frame reference telegram: payload [0x9C, 0xFF, 0x00, 0x00]
    const REFERENCE_TELEGRAM: [u8; 16] = [
        0xAA, 0x10, 0x00, 0x21, 0x73, 0x10, 0x00, 0x01, 0x01, 0x49, 0x1C, 0x7F, 0x00, 0x00, 0x03,
        0x61,
    ];

    fn field(name: &str, offset: usize, size: usize, format: FieldFormat) -> FieldSpec {
        FieldSpec {
            name: name.to_string(),
            offset,
            size,
            format,
            factor: None,
        }
    }

    #[test]
    fn test_key_normalization() {
        let spec = field("Temperature S1", 0, 2, FieldFormat::Temperature);
        assert_eq!(spec.key(), "temperature_s1");

        let spec = field("pump", 0, 1, FieldFormat::Raw);
        assert_eq!(spec.key(), "pump");
    }

    #[test]
    fn test_extract_dispatches_on_format() {
        let packet = decode(&REFERENCE_TELEGRAM).unwrap();

        let temperature = field("t", 0, 2, FieldFormat::Temperature);
        assert_eq!(
            temperature.extract(&packet).unwrap(),
            FieldValue::Temperature(-10.0)
        );

        let raw = field("r", 2, 2, FieldFormat::Raw);
        assert_eq!(raw.extract(&packet).unwrap(), FieldValue::Raw(0));

        let time = field("clock", 2, 2, FieldFormat::Time);
        assert_eq!(
            time.extract(&packet).unwrap(),
            FieldValue::Time("00:00".to_string())
        );
    }

    #[test]
    fn test_temperature_factor_defaults_to_tenths() {
        let packet = decode(&REFERENCE_TELEGRAM).unwrap();

        let spec = field("t", 0, 2, FieldFormat::Temperature);
        assert_eq!(spec.extract(&packet).unwrap(), FieldValue::Temperature(-10.0));

        let spec = FieldSpec {
            factor: Some(1.0),
            ..field("t", 0, 2, FieldFormat::Temperature)
        };
        assert_eq!(
            spec.extract(&packet).unwrap(),
            FieldValue::Temperature(-100.0)
        );
    }

    #[test]
    fn test_process_packet_collects_all_fields() {
        let packet = decode(&REFERENCE_TELEGRAM).unwrap();
        let sensor = VbusSensor::new(
            "Solar Controller",
            vec![
                field("Temperature S1", 0, 2, FieldFormat::Temperature),
                field("Pump Speed", 2, 1, FieldFormat::Raw),
            ],
        );

        let values = sensor.process_packet(&packet);
        assert_eq!(values.len(), 2);
        assert_eq!(
            values.get("temperature_s1"),
            Some(&FieldValue::Temperature(-10.0))
        );
        assert_eq!(values.get("pump_speed"), Some(&FieldValue::Raw(0)));
    }

    #[test]
    fn test_process_packet_isolates_field_failures() {
        let packet = decode(&REFERENCE_TELEGRAM).unwrap();
        let sensor = VbusSensor::new(
            "Solar Controller",
            vec![
                field("Broken", 100, 2, FieldFormat::Raw),
                field("Temperature S1", 0, 2, FieldFormat::Temperature),
            ],
        );

        // The out-of-range field is skipped, the valid one still extracts
        let values = sensor.process_packet(&packet);
        assert_eq!(values.len(), 1);
        assert_eq!(
            values.get("temperature_s1"),
            Some(&FieldValue::Temperature(-10.0))
        );
        assert!(values.get("broken").is_none());
    }

    #[test]
    fn test_field_values_serialize_untagged() {
        let mut values = BTreeMap::new();
        values.insert("temperature_s1".to_string(), FieldValue::Temperature(-10.0));
        values.insert("pump".to_string(), FieldValue::Raw(0));
        values.insert("timer".to_string(), FieldValue::Time("01:30".to_string()));

        let json = serde_json::to_string(&values).unwrap();
        assert_eq!(
            json,
            r#"{"pump":0,"temperature_s1":-10.0,"timer":"01:30"}"#
        );
    }
}
