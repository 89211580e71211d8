//! Anomaly-category classification.
//!
//! Categories overlap in feature space, so the rules are an ordered list and
//! the first match wins. Anything flagged that no rule claims is a
//! `PatternAnomaly`.

use std::collections::HashSet;

use super::destination::DestinationPolicy;
use super::AnomalyCategory;
use crate::config::ThresholdConfig;
use crate::detect::stats::percentile;
use crate::detect::ScoredRecord;
use crate::traffic::TrafficRecord;

type Rule = fn(&Classifier, &TrafficRecord) -> bool;

/// Evaluated top-down.
const RULES: &[(AnomalyCategory, Rule)] = &[
    (AnomalyCategory::TrafficSpike, Classifier::is_traffic_spike),
    (AnomalyCategory::DataExfiltration, Classifier::is_exfiltration),
    (AnomalyCategory::ProtocolAnomaly, Classifier::is_protocol_anomaly),
];

/// Rule thresholds resolved against one batch.
#[derive(Debug, Clone)]
pub struct Classifier {
    pub spike_bytes: f64,
    pub spike_pps: f64,
    pub exfil_bytes: f64,
    pub exfil_duration: f64,
    pub retransmission_rate: f64,
    expected_protocols: HashSet<String>,
    destinations: DestinationPolicy,
}

impl Classifier {
    /// Percentile thresholds come from the unflagged records (the batch's
    /// normal traffic), or from every record if all of them are flagged.
    pub fn from_batch(records: &[ScoredRecord], thresholds: &ThresholdConfig) -> Self {
        let normal: Vec<&TrafficRecord> = records
            .iter()
            .filter(|r| !r.is_anomaly)
            .map(|r| &r.record)
            .collect();
        let reference: Vec<&TrafficRecord> = if normal.is_empty() {
            records.iter().map(|r| &r.record).collect()
        } else {
            normal
        };

        let column = |get: fn(&TrafficRecord) -> f64| -> Vec<f64> { reference.iter().map(|&r| get(r)).collect() };
        let bytes = column(|r| r.bytes_transferred);
        let pps = column(|r| r.packets_per_second);
        let duration = column(|r| r.connection_duration);

        // With no usable reference values a rule can never fire.
        Self {
            spike_bytes: percentile(&bytes, thresholds.spike_percentile).unwrap_or(f64::INFINITY),
            spike_pps: percentile(&pps, thresholds.spike_percentile).unwrap_or(f64::INFINITY),
            exfil_bytes: percentile(&bytes, thresholds.exfil_bytes_percentile).unwrap_or(f64::INFINITY),
            exfil_duration: percentile(&duration, thresholds.exfil_duration_percentile)
                .unwrap_or(f64::NEG_INFINITY),
            retransmission_rate: thresholds.retransmission_rate,
            expected_protocols: thresholds
                .expected_protocols
                .iter()
                .map(|p| p.trim().to_ascii_uppercase())
                .collect(),
            destinations: DestinationPolicy::new(
                &thresholds.expected_destinations,
                thresholds.flag_external_destinations,
            ),
        }
    }

    pub fn classify(&self, scored: &ScoredRecord) -> AnomalyCategory {
        if !scored.is_anomaly {
            return AnomalyCategory::Unclassified;
        }
        RULES
            .iter()
            .find(|(_, matches)| matches(self, &scored.record))
            .map(|(category, _)| *category)
            .unwrap_or(AnomalyCategory::PatternAnomaly)
    }

    fn is_traffic_spike(&self, r: &TrafficRecord) -> bool {
        r.bytes_transferred > self.spike_bytes || r.packets_per_second > self.spike_pps
    }

    fn is_exfiltration(&self, r: &TrafficRecord) -> bool {
        let bulk_and_brief = r.bytes_transferred > self.exfil_bytes && r.connection_duration < self.exfil_duration;
        bulk_and_brief || self.destinations.is_suspicious(r.destination.as_deref())
    }

    fn is_protocol_anomaly(&self, r: &TrafficRecord) -> bool {
        if r.retransmission_rate > self.retransmission_rate {
            return true;
        }
        match r.protocol.as_deref().map(str::trim) {
            Some(p) if !p.is_empty() => !self.expected_protocols.contains(&p.to_ascii_uppercase()),
            _ => false,
        }
    }
}
