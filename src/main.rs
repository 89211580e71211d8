use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use clap::{Parser, Subcommand};

use netsentinel::config::DetectorConfig;
use netsentinel::traffic::generate::{self, GeneratorOptions, TIMESTAMP_FORMAT};
use netsentinel::traffic::{ingest, Feature};

#[derive(Parser)]
#[command(
    name = "netsentinel",
    about = "Batch network-traffic anomaly scoring with mitigation recommendations",
    version,
    long_about = None
)]
struct Cli {
    /// Config file, TOML or .json (falls back to $NETSENTINEL_CONFIG, then ./netsentinel.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score a CSV traffic log and recommend mitigations
    Analyze {
        /// Traffic log to analyze
        #[arg(long, short)]
        input: PathBuf,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,

        /// Directory to write the flagged records CSV into
        #[arg(long)]
        export_dir: Option<PathBuf>,
    },

    /// Write a synthetic traffic log (one record per minute)
    Generate {
        /// Output file path
        #[arg(long, short, default_value = "network_traffic.csv")]
        output: PathBuf,

        /// Hours of traffic to generate
        #[arg(long, default_value = "24")]
        hours: u32,

        /// First timestamp, "YYYY-mm-dd HH:MM:SS" (defaults to now)
        #[arg(long)]
        start: Option<String>,

        /// Seed for reproducible output
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Start the HTTP API
    Serve {
        /// Bind address
        #[arg(long, default_value = "0.0.0.0:8080")]
        bind: String,
    },
}

fn load_config(path: Option<&Path>) -> Result<DetectorConfig> {
    let config = match path {
        Some(path) => DetectorConfig::load(path)?,
        None => DetectorConfig::load_or_default(),
    };
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    // The configured log level isn't known yet, so config loading reports
    // its fallbacks through a warn-only stderr subscriber.
    let bootstrap = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(tracing::Level::WARN)
        .finish();
    let config = tracing::subscriber::with_default(bootstrap, || load_config(cli.config.as_deref()))?;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if config.logging.json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    match cli.command {
        Commands::Analyze {
            input,
            json,
            export_dir,
        } => {
            let required: Vec<Feature> = config.features.iter().filter_map(|name| name.parse().ok()).collect();
            let records = ingest::load_csv(&input, &required)
                .with_context(|| format!("failed to load {}", input.display()))?;

            let report = netsentinel::analyze(&records, &config)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", netsentinel::report::format_summary(&report));
                if report.statistics.anomaly_count > 0 {
                    println!(
                        "\nALERT: Detected {} anomalous activities in network traffic!",
                        report.statistics.anomaly_count
                    );
                }
            }

            if let Some(dir) = export_dir {
                std::fs::create_dir_all(&dir)
                    .with_context(|| format!("failed to create {}", dir.display()))?;
                let path = netsentinel::report::export_path(&dir, &report);
                let written = netsentinel::report::write_anomalies_csv(&report.records, &path)?;
                tracing::info!(path = %path.display(), rows = written, "exported anomalies");
                if !json {
                    println!("\nExported {} anomalies to {}", written, path.display());
                }
            }
        }
        Commands::Generate {
            output,
            hours,
            start,
            seed,
        } => {
            let mut opts = GeneratorOptions {
                duration_hours: hours,
                seed,
                ..GeneratorOptions::default()
            };
            if let Some(start) = start {
                opts.start = NaiveDateTime::parse_from_str(&start, TIMESTAMP_FORMAT)
                    .with_context(|| format!("invalid --start '{}', expected {}", start, TIMESTAMP_FORMAT))?;
            }
            let records = generate::generate(&opts)?;
            generate::write_csv(&records, &output)?;
            println!("Generated {} records in {}", records.len(), output.display());
        }
        Commands::Serve { bind } => {
            tracing::info!(%bind, "Starting netsentinel API");
            netsentinel::serve(&bind, config).await?;
        }
    }

    Ok(())
}
