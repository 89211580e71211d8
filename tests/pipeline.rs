//! End-to-end pipeline behaviour: scoring, classification, summary.

use netsentinel::config::DetectorConfig;
use netsentinel::detect::{AnomalyScorer, DetectError, ScoredRecord};
use netsentinel::mitigate::{AnomalyCategory, Recommender, Severity};
use netsentinel::traffic::TrafficRecord;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Bounded, well-behaved traffic with no natural outliers.
fn normal_traffic(rng: &mut ChaCha8Rng, n: usize) -> Vec<TrafficRecord> {
    (0..n)
        .map(|_| {
            TrafficRecord::from_values([
                rng.gen_range(400.0..600.0),
                rng.gen_range(80.0..120.0),
                rng.gen_range(10.0..50.0),
                rng.gen_range(0.01..0.05),
                rng.gen_range(4.0..6.0),
                rng.gen_range(2.0..8.0),
            ])
            .with_protocol("TCP")
        })
        .collect()
}

fn spike(rng: &mut ChaCha8Rng) -> TrafficRecord {
    // ~100x the median byte count, packet rate well above every normal record.
    TrafficRecord::from_values([
        rng.gen_range(45_000.0..55_000.0),
        rng.gen_range(80.0..120.0),
        rng.gen_range(10.0..50.0),
        rng.gen_range(0.01..0.05),
        rng.gen_range(4.0..6.0),
        rng.gen_range(20.0..30.0),
    ])
    .with_protocol("TCP")
}

#[test]
fn test_traffic_spikes_are_flagged_and_recommended() {
    let mut rng = ChaCha8Rng::seed_from_u64(2024);
    let mut records = normal_traffic(&mut rng, 950);
    // Interleave spikes through the batch.
    for i in 0..50 {
        let at = i * 20 + 7;
        let s = spike(&mut rng);
        records.insert(at, s);
    }
    assert_eq!(records.len(), 1000);

    let config = DetectorConfig {
        contamination: 0.05,
        ..DetectorConfig::default()
    };
    let report = netsentinel::analyze(&records, &config).unwrap();

    let flagged = report.statistics.anomaly_count;
    assert!((35..=65).contains(&flagged), "flagged {flagged}");
    assert_eq!(report.records.len(), 1000);
    for (input, scored) in records.iter().zip(&report.records) {
        assert_eq!(input, &scored.record);
    }

    assert_eq!(report.recommendations.len(), 1, "{:?}", report.recommendations);
    let rec = &report.recommendations[0];
    assert_eq!(rec.category, AnomalyCategory::TrafficSpike);
    assert_eq!(rec.severity, Severity::High);
    assert_eq!(rec.affected_records, flagged);
}

#[test]
fn test_retransmission_outliers_become_protocol_anomaly() {
    let mut rng = ChaCha8Rng::seed_from_u64(5);
    let mut records: Vec<ScoredRecord> = normal_traffic(&mut rng, 190)
        .into_iter()
        .map(|record| ScoredRecord {
            record,
            is_anomaly: false,
            anomaly_score: -0.45,
        })
        .collect();
    for _ in 0..10 {
        let mut record = normal_traffic(&mut rng, 1).remove(0);
        record.bytes_transferred = 500.0;
        record.packets_per_second = 5.0;
        record.connection_duration = 30.0;
        record.retransmission_rate = 0.4;
        records.push(ScoredRecord {
            record,
            is_anomaly: true,
            anomaly_score: -0.7,
        });
    }

    let recs = Recommender::new(&DetectorConfig::default().thresholds).recommend(&records);
    assert_eq!(recs.len(), 1);
    assert_eq!(recs[0].category, AnomalyCategory::ProtocolAnomaly);
    assert_eq!(recs[0].severity, Severity::Medium);
    assert_eq!(recs[0].affected_records, 10);
}

#[test]
fn test_empty_batch() {
    let report = netsentinel::analyze(&[], &DetectorConfig::default()).unwrap();
    assert_eq!(report.statistics.total_records, 0);
    assert_eq!(report.statistics.anomaly_count, 0);
    assert_eq!(report.statistics.anomaly_percentage, 0.0);
    assert!(report.records.is_empty());
    assert!(report.recommendations.is_empty());
}

#[test]
fn test_flagged_fraction_tracks_contamination() {
    let config = DetectorConfig::default();
    let scorer = AnomalyScorer::new(&config).unwrap();
    for (seed, n) in [(1, 20), (2, 57), (3, 100), (4, 500)] {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let outcome = scorer.score(&normal_traffic(&mut rng, n)).unwrap();
        let fraction = outcome.anomaly_count() as f64 / n as f64;
        assert!(
            (fraction - config.contamination).abs() <= 0.10,
            "n={n}: flagged fraction {fraction}"
        );
    }
}

#[test]
fn test_flags_agree_with_score_order() {
    let mut rng = ChaCha8Rng::seed_from_u64(77);
    let mut records = normal_traffic(&mut rng, 300);
    records.extend((0..10).map(|_| spike(&mut rng)));
    let outcome = AnomalyScorer::new(&DetectorConfig::default())
        .unwrap()
        .score(&records)
        .unwrap();

    let worst_flagged = outcome
        .records
        .iter()
        .filter(|r| r.is_anomaly)
        .map(|r| r.anomaly_score)
        .fold(f64::NEG_INFINITY, f64::max);
    let best_unflagged = outcome
        .records
        .iter()
        .filter(|r| !r.is_anomaly)
        .map(|r| r.anomaly_score)
        .fold(f64::INFINITY, f64::min);
    assert!(worst_flagged < best_unflagged);
    assert!(worst_flagged < outcome.threshold && outcome.threshold <= best_unflagged);
}

#[test]
fn test_identical_runs_are_identical() {
    let mut rng = ChaCha8Rng::seed_from_u64(8);
    let records = normal_traffic(&mut rng, 400);
    let config = DetectorConfig::default();

    let a = netsentinel::analyze(&records, &config).unwrap();
    let b = netsentinel::analyze(&records, &config).unwrap();
    assert_eq!(a.records, b.records);
    assert_eq!(a.recommendations, b.recommendations);
    assert_eq!(a.statistics, b.statistics);
}

#[test]
fn test_bad_contamination_fails_before_scoring() {
    let config = DetectorConfig {
        contamination: 1.0,
        ..DetectorConfig::default()
    };
    let err = netsentinel::analyze(&[], &config).unwrap_err();
    assert!(matches!(err, DetectError::Configuration { ref option, .. } if option == "contamination"));
}

#[test]
fn test_missing_value_rejects_whole_batch() {
    let mut rng = ChaCha8Rng::seed_from_u64(9);
    let mut records = normal_traffic(&mut rng, 30);
    records[4].packet_count = f64::NAN;
    let err = netsentinel::analyze(&records, &DetectorConfig::default()).unwrap_err();
    match err {
        DetectError::DataValidation { issues } => {
            assert_eq!(issues.len(), 1);
            assert_eq!(issues[0].row, Some(4));
            assert_eq!(issues[0].field, "packet_count");
        }
        other => panic!("unexpected error {other}"),
    }
}
