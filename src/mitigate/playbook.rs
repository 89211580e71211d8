//! Static mitigation playbook, keyed by anomaly category.

use super::{AnomalyCategory, Severity};

pub struct PlaybookEntry {
    pub severity: Severity,
    pub description: &'static str,
    pub actions: &'static [&'static str],
}

static TRAFFIC_SPIKE: PlaybookEntry = PlaybookEntry {
    severity: Severity::High,
    description: "Traffic volume far above the batch baseline, consistent with flooding or DDoS",
    actions: &[
        "Enable rate limiting on the affected ingress interfaces",
        "Engage upstream DDoS scrubbing or blackhole routing for targeted prefixes",
        "Identify top talkers during the spike window and block abusive sources",
        "Scale out front-end capacity behind the load balancer",
    ],
};

static DATA_EXFILTRATION: PlaybookEntry = PlaybookEntry {
    severity: Severity::High,
    description: "Large or unexpected outbound transfers, consistent with data exfiltration",
    actions: &[
        "Block outbound connections to the offending destinations",
        "Isolate the source hosts for forensic review",
        "Rotate credentials and access tokens used by the source hosts",
        "Enable DLP inspection on egress traffic",
    ],
};

static PROTOCOL_ANOMALY: PlaybookEntry = PlaybookEntry {
    severity: Severity::Medium,
    description: "Elevated retransmissions or unexpected protocols on the wire",
    actions: &[
        "Inspect packet captures for malformed or non-compliant traffic",
        "Check link health, duplex and MTU settings on the affected paths",
        "Restrict unexpected protocols at the perimeter firewall",
        "Update IDS signatures for protocol misuse",
    ],
};

static PATTERN_ANOMALY: PlaybookEntry = PlaybookEntry {
    severity: Severity::Medium,
    description: "Unusual combination of traffic characteristics without a single dominant signal",
    actions: &[
        "Correlate flagged flows with host and authentication logs",
        "Look for scanning or beaconing behaviour from the sources",
        "Tighten segmentation rules for the affected subnets",
        "Increase monitoring granularity for the affected hosts",
    ],
};

static UNCLASSIFIED: PlaybookEntry = PlaybookEntry {
    severity: Severity::Low,
    description: "No anomaly detected",
    actions: &["Continue routine monitoring"],
};

pub fn lookup(category: AnomalyCategory) -> &'static PlaybookEntry {
    match category {
        AnomalyCategory::TrafficSpike => &TRAFFIC_SPIKE,
        AnomalyCategory::DataExfiltration => &DATA_EXFILTRATION,
        AnomalyCategory::ProtocolAnomaly => &PROTOCOL_ANOMALY,
        AnomalyCategory::PatternAnomaly => &PATTERN_ANOMALY,
        AnomalyCategory::Unclassified => &UNCLASSIFIED,
    }
}
