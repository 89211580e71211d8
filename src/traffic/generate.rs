//! Synthetic traffic generator for demos and tests.
//!
//! One record per minute; 85% normal traffic and 15% split evenly between
//! DDoS-like floods, exfiltration-like transfers and scan-like probes.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDateTime, Timelike, Utc};
use rand::distributions::WeightedIndex;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Beta, Distribution, Gamma, Normal};
use tracing::info;

use super::TrafficRecord;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const NORMAL_SHARE: f64 = 0.85;
const COMMON_PORTS: [u16; 10] = [80, 443, 22, 21, 3306, 5432, 8080, 8443, 25, 53];
const COMMON_PORT_WEIGHTS: [f64; 10] = [0.3, 0.25, 0.1, 0.05, 0.05, 0.05, 0.05, 0.05, 0.05, 0.05];
const PROTOCOLS: [&str; 6] = ["TCP", "UDP", "HTTP", "HTTPS", "SSH", "FTP"];
const PROTOCOL_WEIGHTS: [f64; 6] = [0.3, 0.2, 0.2, 0.15, 0.1, 0.05];

#[derive(Debug, Clone)]
pub struct GeneratorOptions {
    pub start: NaiveDateTime,
    pub duration_hours: u32,
    /// Fixed seed for reproducible output; `None` seeds from the clock.
    pub seed: Option<u64>,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            start: Utc::now().naive_utc(),
            duration_hours: 24,
            seed: None,
        }
    }
}

/// Per-run randomized baseline, so every generated log looks different.
struct BasePattern {
    traffic_mean: f64,
    traffic_std: f64,
    packet_mean: f64,
    packet_std: f64,
    anomaly_multiplier: f64,
}

#[derive(Debug, Clone, Copy)]
enum Kind {
    Normal,
    Flood,
    Exfiltration,
    Scan,
}

/// Raw draw before timestamps and derived features are attached.
struct Draw {
    bytes: f64,
    packets: f64,
    duration: f64,
    source_port: u16,
    destination_port: u16,
    retransmission: f64,
}

pub fn generate(opts: &GeneratorOptions) -> Result<Vec<TrafficRecord>> {
    let seed = opts
        .seed
        .unwrap_or_else(|| (Utc::now().timestamp_millis() as u64) % (1 << 32));
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    let total = opts.duration_hours as usize * 60;
    let n_normal = (total as f64 * NORMAL_SHARE) as usize;
    let n_anomalous = total - n_normal;
    let mut sizes = [n_anomalous / 3; 3];
    for size in sizes.iter_mut().take(n_anomalous % 3) {
        *size += 1;
    }
    info!(seed, total, n_normal, n_anomalous, "generating synthetic traffic");

    let base = BasePattern {
        traffic_mean: rng.gen_range(400_000.0..600_000.0),
        traffic_std: rng.gen_range(100_000.0..200_000.0),
        packet_mean: rng.gen_range(800.0..1200.0),
        packet_std: rng.gen_range(200.0..400.0),
        anomaly_multiplier: rng.gen_range(3.0..5.0),
    };

    let mut kinds: Vec<Kind> = std::iter::repeat(Kind::Normal)
        .take(n_normal)
        .chain(std::iter::repeat(Kind::Flood).take(sizes[0]))
        .chain(std::iter::repeat(Kind::Exfiltration).take(sizes[1]))
        .chain(std::iter::repeat(Kind::Scan).take(sizes[2]))
        .collect();
    // Anomalies land at random minutes.
    kinds.shuffle(&mut rng);

    let port_dist = WeightedIndex::new(COMMON_PORT_WEIGHTS)?;
    let protocol_dist = WeightedIndex::new(PROTOCOL_WEIGHTS)?;
    let noise = Normal::new(1.0, 0.1)?;

    let mut records = Vec::with_capacity(total);
    for (minute, kind) in kinds.into_iter().enumerate() {
        let draw = draw(kind, &base, &port_dist, &mut rng)?;
        let when = opts.start + Duration::minutes(minute as i64);

        let protocol = match draw.destination_port {
            80 => ["HTTP", "TCP"][rng.gen_range(0..2)],
            443 => ["HTTPS", "TCP"][rng.gen_range(0..2)],
            22 => "SSH",
            21 => "FTP",
            _ => PROTOCOLS[protocol_dist.sample(&mut rng)],
        };

        let bytes_per_packet = draw.bytes / draw.packets * noise.sample(&mut rng);
        let packets_per_second = draw.packets / draw.duration * noise.sample(&mut rng);

        // Quiet overnight, busier during office hours.
        let hour = when.hour();
        let bytes = match hour {
            1..=5 => draw.bytes * rng.gen_range(0.5..0.8),
            9..=17 => draw.bytes * rng.gen_range(1.2..1.5),
            _ => draw.bytes,
        };

        let mut record = TrafficRecord::from_values([
            bytes.abs(),
            draw.packets.abs(),
            draw.duration.abs(),
            draw.retransmission.abs(),
            bytes_per_packet.abs(),
            packets_per_second.abs(),
        ]);
        record.timestamp = Some(when.format(TIMESTAMP_FORMAT).to_string());
        record.source = Some(draw.source_port.to_string());
        record.destination = Some(draw.destination_port.to_string());
        record.protocol = Some(protocol.to_string());
        records.push(record);
    }

    Ok(records)
}

fn draw(kind: Kind, base: &BasePattern, ports: &WeightedIndex<f64>, rng: &mut ChaCha8Rng) -> Result<Draw> {
    let source_port = rng.gen_range(1024..65535);
    let draw = match kind {
        Kind::Normal => Draw {
            bytes: Normal::new(base.traffic_mean, base.traffic_std)?.sample(rng),
            packets: Normal::new(base.packet_mean, base.packet_std)?.sample(rng),
            duration: Gamma::new(3.0, 10.0)?.sample(rng),
            source_port,
            destination_port: COMMON_PORTS[ports.sample(rng)],
            retransmission: Beta::new(2.0, 50.0)?.sample(rng),
        },
        Kind::Flood => Draw {
            bytes: Normal::new(base.traffic_mean * base.anomaly_multiplier, base.traffic_std * 2.0)?.sample(rng),
            packets: Normal::new(base.packet_mean * base.anomaly_multiplier, base.packet_std * 2.0)?.sample(rng),
            duration: rng.gen_range(0.1..1.0),
            source_port,
            destination_port: [80, 443][rng.gen_range(0..2)],
            retransmission: Beta::new(5.0, 2.0)?.sample(rng),
        },
        Kind::Exfiltration => Draw {
            bytes: Normal::new(100.0, 50.0)?.sample(rng),
            packets: Normal::new(50.0, 20.0)?.sample(rng),
            duration: rng.gen_range(300.0..600.0),
            source_port,
            destination_port: [21, 22, 3306][rng.gen_range(0..3)],
            retransmission: Beta::new(1.0, 50.0)?.sample(rng),
        },
        Kind::Scan => Draw {
            bytes: Normal::new(base.traffic_mean * 0.1, base.traffic_std * 0.1)?.sample(rng),
            packets: Normal::new(base.packet_mean * 2.0, base.packet_std)?.sample(rng),
            duration: rng.gen_range(0.1..0.5),
            source_port,
            destination_port: rng.gen_range(1..65535),
            retransmission: Beta::new(2.0, 20.0)?.sample(rng),
        },
    };
    Ok(draw)
}

/// Write records in the column layout [`super::ingest::read_csv`] expects.
pub fn write_csv(records: &[TrafficRecord], path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    writer.write_record([
        "timestamp",
        "bytes_transferred",
        "packet_count",
        "connection_duration",
        "source_port",
        "destination_port",
        "retransmission_rate",
        "protocol",
        "bytes_per_packet",
        "packets_per_second",
    ])?;
    for r in records {
        writer.write_record([
            r.timestamp.clone().unwrap_or_default(),
            r.bytes_transferred.to_string(),
            r.packet_count.to_string(),
            r.connection_duration.to_string(),
            r.source.clone().unwrap_or_default(),
            r.destination.clone().unwrap_or_default(),
            r.retransmission_rate.to_string(),
            r.protocol.clone().unwrap_or_default(),
            r.bytes_per_packet.to_string(),
            r.packets_per_second.to_string(),
        ])?;
    }
    writer.flush()?;
    info!(path = %path.display(), records = records.len(), "wrote synthetic traffic log");
    Ok(())
}
