//! CSV ingestion for traffic logs.
//!
//! Columns are matched by header name (case-insensitive). Empty numeric cells
//! load as missing (NaN) and are left for the scorer's missing-value policy;
//! unparseable cells and absent columns are rejected here.

use std::io::Read;
use std::path::Path;

use tracing::info;

use super::{Feature, TrafficRecord};
use crate::detect::{DetectError, ValidationIssue};

const TIMESTAMP_COLUMNS: &[&str] = &["timestamp", "time"];
const SOURCE_COLUMNS: &[&str] = &["source", "source_ip", "source_port"];
const DESTINATION_COLUMNS: &[&str] = &["destination", "destination_ip", "destination_port"];
const PROTOCOL_COLUMNS: &[&str] = &["protocol"];

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("failed to read CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Invalid(#[from] DetectError),
}

/// Load a CSV traffic log from disk; every feature in `required` must have a column.
pub fn load_csv(path: &Path, required: &[Feature]) -> Result<Vec<TrafficRecord>, IngestError> {
    let file = std::fs::File::open(path).map_err(csv::Error::from)?;
    let records = read_csv(std::io::BufReader::new(file), required)?;
    info!(path = %path.display(), records = records.len(), "loaded traffic log");
    Ok(records)
}

/// Parse CSV rows into records. Every feature in `required` must have a column.
/// Absent optional features load as missing.
pub fn read_csv<R: Read>(reader: R, required: &[Feature]) -> Result<Vec<TrafficRecord>, IngestError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);
    let headers = reader.headers()?.clone();

    let find = |names: &[&str]| -> Option<usize> {
        names
            .iter()
            .find_map(|name| headers.iter().position(|h| h.eq_ignore_ascii_case(name)))
    };

    let mut issues = Vec::new();
    let mut feature_cols: Vec<(Feature, Option<usize>)> = Vec::with_capacity(Feature::ALL.len());
    for feature in Feature::ALL {
        let col = find(&[feature.name()]);
        if col.is_none() && required.contains(&feature) {
            issues.push(ValidationIssue::column(feature.name(), "missing required column"));
        }
        feature_cols.push((feature, col));
    }
    if !issues.is_empty() {
        return Err(DetectError::validation(issues).into());
    }

    let timestamp_col = find(TIMESTAMP_COLUMNS);
    let source_col = find(SOURCE_COLUMNS);
    let destination_col = find(DESTINATION_COLUMNS);
    let protocol_col = find(PROTOCOL_COLUMNS);

    let mut records = Vec::new();
    for (row, result) in reader.records().enumerate() {
        let line = result?;
        let text = |col: Option<usize>| {
            col.and_then(|c| line.get(c))
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let mut values = [f64::NAN; 6];
        for (slot, (feature, col)) in values.iter_mut().zip(&feature_cols) {
            let Some(raw) = col.and_then(|c| line.get(c)) else {
                continue;
            };
            if raw.is_empty() {
                continue;
            }
            match raw.parse::<f64>() {
                Ok(v) => *slot = v,
                Err(_) => issues.push(ValidationIssue::cell(
                    row,
                    feature.name(),
                    format!("not a number: '{}'", raw),
                )),
            }
        }

        let mut record = TrafficRecord::from_values(values);
        record.timestamp = text(timestamp_col);
        record.source = text(source_col);
        record.destination = text(destination_col);
        record.protocol = text(protocol_col);
        records.push(record);
    }

    if !issues.is_empty() {
        return Err(DetectError::validation(issues).into());
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
timestamp,bytes_transferred,packet_count,connection_duration,source_port,destination_port,retransmission_rate,protocol,bytes_per_packet,packets_per_second
2024-01-01 00:00:00,512000,1000,30.5,50123,443,0.03,HTTPS,512,32.7
2024-01-01 00:01:00,480000,,28.0,50124,22,0.05,SSH,480,35.0
";

    #[test]
    fn test_read_sample() {
        let records = read_csv(SAMPLE.as_bytes(), &Feature::ALL).unwrap();
        assert_eq!(records.len(), 2);
        let first = &records[0];
        assert_eq!(first.bytes_transferred, 512_000.0);
        assert_eq!(first.timestamp.as_deref(), Some("2024-01-01 00:00:00"));
        assert_eq!(first.source.as_deref(), Some("50123"));
        assert_eq!(first.destination.as_deref(), Some("443"));
        assert_eq!(first.protocol.as_deref(), Some("HTTPS"));
        // Empty cell loads as missing.
        assert!(records[1].packet_count.is_nan());
    }

    #[test]
    fn test_missing_required_column() {
        let csv = "bytes_transferred,packet_count\n1,2\n";
        let err = read_csv(csv.as_bytes(), &Feature::ALL).unwrap_err();
        match err {
            IngestError::Invalid(DetectError::DataValidation { issues }) => {
                assert_eq!(issues.len(), 4);
                assert!(issues.iter().all(|i| i.row.is_none()));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_optional_columns_load_as_missing() {
        let csv = "bytes_transferred,packet_count\n1,2\n";
        let records = read_csv(csv.as_bytes(), &[Feature::BytesTransferred, Feature::PacketCount]).unwrap();
        assert_eq!(records[0].packet_count, 2.0);
        assert!(records[0].packets_per_second.is_nan());
    }

    #[test]
    fn test_non_numeric_cells_listed() {
        let csv = "bytes_transferred,packet_count,connection_duration,retransmission_rate,bytes_per_packet,packets_per_second
1,2,3,0.1,4,5
abc,2,3,0.1,4,five
";
        let err = read_csv(csv.as_bytes(), &Feature::ALL).unwrap_err();
        match err {
            IngestError::Invalid(DetectError::DataValidation { issues }) => {
                assert_eq!(issues.len(), 2);
                assert_eq!(issues[0].row, Some(1));
                assert_eq!(issues[0].field, "bytes_transferred");
                assert_eq!(issues[1].field, "packets_per_second");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_load_csv_honours_required_subset() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("partial.csv");
        std::fs::write(&path, "bytes_transferred,packet_count\n1,2\n").unwrap();

        let records = load_csv(&path, &[Feature::BytesTransferred, Feature::PacketCount]).unwrap();
        assert_eq!(records.len(), 1);
        assert!(matches!(load_csv(&path, &Feature::ALL), Err(IngestError::Invalid(_))));
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            load_csv(Path::new("/nonexistent/traffic.csv"), &Feature::ALL),
            Err(IngestError::Csv(_))
        ));
    }
}
