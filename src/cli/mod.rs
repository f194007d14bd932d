use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use mzsparse::binning::BinningConfig;
use mzsparse::client::{HttpIndexingService, DEFAULT_COLLECTION, DEFAULT_TIMEOUT_SECS};
use mzsparse::pipeline::{PipelineConfig, RetryPolicy, DEFAULT_BATCH_SIZE};

mod config;
mod health;
mod ingest;
mod search;

/// mzSparse - Sparse-Vector Similarity Search for Mass Spectra
#[derive(Parser)]
#[command(name = "mzsparse")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Verbosity level (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Indexing-service connection flags shared by every subcommand.
#[derive(Args)]
struct ServiceArgs {
    /// Base URL of the indexing service
    #[arg(long, value_name = "URL")]
    url: Option<String>,

    /// Target collection name
    #[arg(long)]
    collection: Option<String>,

    /// Per-call timeout in seconds
    #[arg(long, value_name = "SECS")]
    timeout_secs: Option<u64>,

    /// Load settings from a TOML config file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

impl ServiceArgs {
    fn load_config(&self) -> Result<config::Config> {
        match &self.config {
            Some(path) => config::Config::from_file(path),
            None => Ok(config::Config::default()),
        }
    }

    fn connect(&self, file: &config::Config) -> Result<HttpIndexingService> {
        let url = self
            .url
            .clone()
            .or_else(|| file.service.url.clone())
            .unwrap_or_else(|| "http://localhost:8000".to_string());
        let collection = self
            .collection
            .clone()
            .or_else(|| file.service.collection.clone())
            .unwrap_or_else(|| DEFAULT_COLLECTION.to_string());
        let timeout_secs = self
            .timeout_secs
            .or(file.service.timeout_secs)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let client =
            HttpIndexingService::new(url, collection, Duration::from_secs(timeout_secs))?;
        Ok(client)
    }
}

/// Pipeline tuning flags shared by the ingestion subcommands.
#[derive(Args)]
struct IngestArgs {
    /// m/z bin width (e.g., 0.1)
    #[arg(short = 'w', long, value_name = "WIDTH")]
    bin_width: Option<f64>,

    /// Spectra per upsert batch
    #[arg(short = 'b', long)]
    batch_size: Option<usize>,

    // === Advanced tuning flags (hidden from --help) ===
    /// Submission attempts per batch, including the first
    #[arg(long, hide = true)]
    max_attempts: Option<u32>,

    /// Retry backoff base in milliseconds
    #[arg(long, hide = true)]
    retry_base_ms: Option<u64>,
}

impl IngestArgs {
    fn pipeline_config(&self, file: &config::Config) -> Result<PipelineConfig> {
        let bin_width = self
            .bin_width
            .or(file.ingest.bin_width)
            .unwrap_or(BinningConfig::DEFAULT_BIN_WIDTH);
        let batch_size = self
            .batch_size
            .or(file.ingest.batch_size)
            .unwrap_or(DEFAULT_BATCH_SIZE);

        let defaults = RetryPolicy::default();
        let retry = RetryPolicy {
            max_attempts: self
                .max_attempts
                .or(file.ingest.max_attempts)
                .unwrap_or(defaults.max_attempts),
            base_delay: self
                .retry_base_ms
                .or(file.ingest.retry_base_ms)
                .map(Duration::from_millis)
                .unwrap_or(defaults.base_delay),
        };

        let binning = BinningConfig::new(bin_width)?;
        let config = PipelineConfig::new(binning, batch_size)?.with_retry(retry);
        Ok(config)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest an MSP peak-list library into the index
    IngestMsp {
        /// Input .msp file path
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Metadata key whose value is preserved in the payload as original_id
        #[arg(long, value_name = "KEY")]
        id_key: Option<String>,

        #[command(flatten)]
        ingest: IngestArgs,

        #[command(flatten)]
        service: ServiceArgs,
    },

    /// Ingest a tabular CSV with (id, mass_list_json, intensity_list_json) rows
    IngestTable {
        /// Input CSV file path
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Limit rows ingested (for trial runs)
        #[arg(long, value_name = "N")]
        limit: Option<usize>,

        #[command(flatten)]
        ingest: IngestArgs,

        #[command(flatten)]
        service: ServiceArgs,
    },

    /// Search the index with a query spectrum from a two-column CSV
    Search {
        /// Query CSV with mass,intensity rows
        #[arg(value_name = "QUERY")]
        input: PathBuf,

        /// m/z bin width used at ingestion time
        #[arg(short = 'w', long, value_name = "WIDTH")]
        bin_width: Option<f64>,

        /// Top-k hits to return
        #[arg(short = 'l', long, default_value = "10")]
        limit: usize,

        /// Skip payload retrieval
        #[arg(long)]
        no_payload: bool,

        #[command(flatten)]
        service: ServiceArgs,
    },

    /// Probe the indexing service's liveness endpoint
    Health {
        #[command(flatten)]
        service: ServiceArgs,
    },
}

impl Cli {
    pub fn verbosity(&self) -> u8 {
        self.verbose
    }
}

pub fn init_logging(verbosity: u8) {
    let log_level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();
}

pub fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::IngestMsp {
            input,
            id_key,
            ingest: ingest_args,
            service,
        } => ingest::run_msp(input, id_key, &ingest_args, &service),
        Commands::IngestTable {
            input,
            limit,
            ingest: ingest_args,
            service,
        } => ingest::run_table(input, limit, &ingest_args, &service),
        Commands::Search {
            input,
            bin_width,
            limit,
            no_payload,
            service,
        } => search::run(input, bin_width, limit, no_payload, &service),
        Commands::Health { service } => health::run(&service),
    }
}
