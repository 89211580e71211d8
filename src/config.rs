//! Detector configuration.
//!
//! Every key is optional: missing keys fall back to the defaults below and
//! unknown keys are ignored. Files are TOML unless they end in `.json`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::detect::DetectError;
use crate::traffic::Feature;

/// Environment variable naming a config file to load.
pub const CONFIG_ENV: &str = "NETSENTINEL_CONFIG";
const LOCAL_CONFIG: &str = "netsentinel.toml";

/// A config file location and where it was named.
struct Candidate {
    path: PathBuf,
    origin: &'static str,
}

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Ordered feature names fed to the model.
    pub features: Vec<String>,
    /// Expected share of anomalous records, strictly between 0 and 1.
    pub contamination: f64,
    /// Number of isolation trees.
    pub n_estimators: usize,
    /// Seed for subsampling and split selection.
    pub random_state: u64,
    /// Subsample size per tree (capped at the batch size).
    pub max_samples: usize,
    pub missing_values: MissingValues,
    pub thresholds: ThresholdConfig,
    pub logging: LoggingConfig,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            features: Feature::ALL.iter().map(|f| f.name().to_string()).collect(),
            contamination: 0.15,
            n_estimators: 100,
            random_state: 42,
            max_samples: 256,
            missing_values: MissingValues::Reject,
            thresholds: ThresholdConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl DetectorConfig {
    /// Load configuration from a TOML (or `.json`) file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let config: Self = if is_json {
            serde_json::from_str(&content)
                .with_context(|| format!("failed to parse config file: {}", path.display()))?
        } else {
            toml::from_str(&content)
                .with_context(|| format!("failed to parse config file: {}", path.display()))?
        };
        info!(path = %path.display(), "loaded detector configuration");
        Ok(config)
    }

    /// Try to load configuration from, in order:
    /// 1. The path in `NETSENTINEL_CONFIG`.
    /// 2. `./netsentinel.toml`.
    /// 3. Compiled-in defaults.
    ///
    /// Every candidate that is skipped is logged with the reason.
    pub fn load_or_default() -> Self {
        let mut candidates = Vec::with_capacity(2);
        if let Some(path) = std::env::var_os(CONFIG_ENV).filter(|p| !p.is_empty()) {
            candidates.push(Candidate {
                path: PathBuf::from(path),
                origin: CONFIG_ENV,
            });
        }
        candidates.push(Candidate {
            path: PathBuf::from(LOCAL_CONFIG),
            origin: "working directory",
        });
        Self::load_first(&candidates)
    }

    fn load_first(candidates: &[Candidate]) -> Self {
        for candidate in candidates {
            let path = candidate.path.as_path();
            // An implicit local file that isn't there is the normal case.
            if !path.exists() && candidate.origin != CONFIG_ENV {
                continue;
            }
            match Self::load(path) {
                Ok(cfg) => return cfg,
                Err(e) => warn!(
                    path = %path.display(),
                    origin = candidate.origin,
                    error = %format_args!("{:#}", e),
                    "config file could not be loaded, falling back"
                ),
            }
        }
        debug!("no usable config file, using compiled-in defaults");
        Self::default()
    }

    /// Check numeric ranges. Feature names are resolved later against the data.
    pub fn validate(&self) -> Result<(), DetectError> {
        if !(self.contamination > 0.0 && self.contamination < 1.0) {
            return Err(DetectError::config(
                "contamination",
                format!("must be in (0, 1), got {}", self.contamination),
            ));
        }
        if self.n_estimators == 0 {
            return Err(DetectError::config("n_estimators", "must be at least 1"));
        }
        if self.max_samples == 0 {
            return Err(DetectError::config("max_samples", "must be at least 1"));
        }
        if self.features.is_empty() {
            return Err(DetectError::config("features", "at least one feature is required"));
        }
        self.thresholds.validate()
    }
}

/// What to do with missing / non-finite feature values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingValues {
    /// Reject the whole batch, listing every offending cell.
    #[default]
    Reject,
    /// Fill with the column mean of the finite values.
    ImputeMean,
}

// ---------------------------------------------------------------------------
// Category thresholds
// ---------------------------------------------------------------------------

/// Overrides for the anomaly-category rules. Percentiles are fractions in
/// (0, 1) taken over the batch's unflagged records.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    pub spike_percentile: f64,
    pub exfil_bytes_percentile: f64,
    pub exfil_duration_percentile: f64,
    /// Absolute retransmission rate above which traffic is a protocol anomaly.
    pub retransmission_rate: f64,
    pub expected_protocols: Vec<String>,
    /// Allowed destinations: exact identifiers, IP addresses or CIDR blocks.
    /// Empty disables the check.
    pub expected_destinations: Vec<String>,
    /// Treat destinations with public IP addresses as exfiltration targets.
    pub flag_external_destinations: bool,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            spike_percentile: 0.99,
            exfil_bytes_percentile: 0.90,
            exfil_duration_percentile: 0.10,
            retransmission_rate: 0.10,
            expected_protocols: ["TCP", "UDP", "HTTP", "HTTPS", "SSH", "FTP"]
                .iter()
                .map(|p| p.to_string())
                .collect(),
            expected_destinations: Vec::new(),
            flag_external_destinations: false,
        }
    }
}

impl ThresholdConfig {
    pub fn validate(&self) -> Result<(), DetectError> {
        let percentiles = [
            ("thresholds.spike_percentile", self.spike_percentile),
            ("thresholds.exfil_bytes_percentile", self.exfil_bytes_percentile),
            ("thresholds.exfil_duration_percentile", self.exfil_duration_percentile),
        ];
        for (option, value) in percentiles {
            if !(value > 0.0 && value < 1.0) {
                return Err(DetectError::config(option, format!("must be in (0, 1), got {}", value)));
            }
        }
        if !(self.retransmission_rate >= 0.0) {
            return Err(DetectError::config(
                "thresholds.retransmission_rate",
                format!("must be non-negative, got {}", self.retransmission_rate),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Minimum tracing level (`trace`, `debug`, `info`, `warn`, `error`),
    /// used when `RUST_LOG` is unset.
    pub level: String,
    /// Emit newline-delimited JSON instead of human-readable lines.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
