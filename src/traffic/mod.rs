//! Traffic records and the numeric features the detector works on.

pub mod generate;
pub mod ingest;

use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// One observed connection / flow summary.
///
/// Numeric attributes that are absent, `null` or not numbers in JSON become
/// NaN, so the scorer reports them as validation issues with their row and
/// field instead of the whole body failing to parse. Numeric strings parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficRecord {
    #[serde(default = "missing_value", deserialize_with = "lenient_f64")]
    pub bytes_transferred: f64,
    #[serde(default = "missing_value", deserialize_with = "lenient_f64")]
    pub packet_count: f64,
    #[serde(default = "missing_value", deserialize_with = "lenient_f64")]
    pub connection_duration: f64,
    #[serde(default = "missing_value", deserialize_with = "lenient_f64")]
    pub retransmission_rate: f64,
    #[serde(default = "missing_value", deserialize_with = "lenient_f64")]
    pub bytes_per_packet: f64,
    #[serde(default = "missing_value", deserialize_with = "lenient_f64")]
    pub packets_per_second: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
}

fn missing_value() -> f64 {
    f64::NAN
}

/// Anything a JSON client might put in a numeric slot.
#[derive(Deserialize)]
#[serde(untagged)]
enum NumericCell {
    Number(f64),
    Text(String),
    Other(IgnoredAny),
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = match Option::<NumericCell>::deserialize(deserializer)? {
        Some(NumericCell::Number(v)) => v,
        Some(NumericCell::Text(text)) => text.trim().parse().unwrap_or(f64::NAN),
        Some(NumericCell::Other(IgnoredAny)) | None => f64::NAN,
    };
    Ok(value)
}

impl TrafficRecord {
    /// Build a record from the six numeric attributes, with no metadata.
    pub fn from_values(values: [f64; 6]) -> Self {
        let [bytes_transferred, packet_count, connection_duration, retransmission_rate, bytes_per_packet, packets_per_second] =
            values;
        Self {
            bytes_transferred,
            packet_count,
            connection_duration,
            retransmission_rate,
            bytes_per_packet,
            packets_per_second,
            timestamp: None,
            source: None,
            destination: None,
            protocol: None,
        }
    }

    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = Some(protocol.into());
        self
    }

    pub fn with_destination(mut self, destination: impl Into<String>) -> Self {
        self.destination = Some(destination.into());
        self
    }
}

/// Numeric attribute of a [`TrafficRecord`] usable as a model feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    BytesTransferred,
    PacketCount,
    ConnectionDuration,
    RetransmissionRate,
    BytesPerPacket,
    PacketsPerSecond,
}

impl Feature {
    pub const ALL: [Feature; 6] = [
        Feature::BytesTransferred,
        Feature::PacketCount,
        Feature::ConnectionDuration,
        Feature::RetransmissionRate,
        Feature::BytesPerPacket,
        Feature::PacketsPerSecond,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Feature::BytesTransferred => "bytes_transferred",
            Feature::PacketCount => "packet_count",
            Feature::ConnectionDuration => "connection_duration",
            Feature::RetransmissionRate => "retransmission_rate",
            Feature::BytesPerPacket => "bytes_per_packet",
            Feature::PacketsPerSecond => "packets_per_second",
        }
    }

    /// Read this feature's value from a record.
    pub fn value(&self, record: &TrafficRecord) -> f64 {
        match self {
            Feature::BytesTransferred => record.bytes_transferred,
            Feature::PacketCount => record.packet_count,
            Feature::ConnectionDuration => record.connection_duration,
            Feature::RetransmissionRate => record.retransmission_rate,
            Feature::BytesPerPacket => record.bytes_per_packet,
            Feature::PacketsPerSecond => record.packets_per_second,
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Feature {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Feature::ALL
            .iter()
            .copied()
            .find(|f| f.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| format!("unknown feature '{}'", s))
    }
}

/// An ordered batch of records restricted to a resolved feature set.
#[derive(Debug, Clone)]
pub struct FeatureBatch<'a> {
    pub features: Vec<Feature>,
    pub records: &'a [TrafficRecord],
}

impl<'a> FeatureBatch<'a> {
    pub fn new(features: Vec<Feature>, records: &'a [TrafficRecord]) -> Self {
        Self { features, records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Row `i` projected onto the feature set, in feature order.
    pub fn row(&self, i: usize) -> Vec<f64> {
        self.features
            .iter()
            .map(|f| f.value(&self.records[i]))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_names_round_trip() {
        for feature in Feature::ALL {
            assert_eq!(feature.name().parse::<Feature>().unwrap(), feature);
        }
        assert_eq!(
            " Packets_Per_Second ".parse::<Feature>().unwrap(),
            Feature::PacketsPerSecond
        );
        assert!("feature1".parse::<Feature>().is_err());
    }

    #[test]
    fn test_batch_row_follows_feature_order() {
        let records = vec![TrafficRecord::from_values([1.0, 2.0, 3.0, 4.0, 5.0, 6.0])];
        let batch = FeatureBatch::new(
            vec![Feature::PacketsPerSecond, Feature::BytesTransferred],
            &records,
        );
        assert_eq!(batch.row(0), vec![6.0, 1.0]);
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn test_metadata_is_omitted_when_absent() {
        let record = TrafficRecord::from_values([1.0; 6]).with_protocol("TCP");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["protocol"], "TCP");
        assert!(json.get("destination").is_none());
    }

    #[test]
    fn test_non_numeric_json_becomes_nan() {
        let record: TrafficRecord = serde_json::from_str(
            r#"{"bytes_transferred": "abc", "packet_count": " 42 ", "connection_duration": true,
                "retransmission_rate": [1], "bytes_per_packet": {"v": 1}, "packets_per_second": 2}"#,
        )
        .unwrap();
        assert!(record.bytes_transferred.is_nan());
        assert_eq!(record.packet_count, 42.0);
        assert!(record.connection_duration.is_nan());
        assert!(record.retransmission_rate.is_nan());
        assert!(record.bytes_per_packet.is_nan());
        assert_eq!(record.packets_per_second, 2.0);
    }

    #[test]
    fn test_null_or_absent_numbers_become_nan() {
        let record: TrafficRecord = serde_json::from_str(
            r#"{"bytes_transferred": null, "packet_count": 3, "connection_duration": 1.5,
                "retransmission_rate": 0.01, "bytes_per_packet": 20}"#,
        )
        .unwrap();
        assert!(record.bytes_transferred.is_nan());
        assert!(record.packets_per_second.is_nan());
        assert_eq!(record.packet_count, 3.0);
    }
}
