//! CLI Entry Point for rsa-stream
//!
//! Provides a command-line front end for:
//! - In-memory IQ captures (`capture`)
//! - File round-trip captures through a scoped temporary directory (`capture-file`)
//! - Offline status word decoding and bandwidth resolution
//!
//! Captures run against the simulated analyzer from `rsa-driver-mock`, so
//! the full client path can be exercised without an instrument attached.
//! Results are printed to stdout as JSON; logs go to stderr.
//!
//! # Usage
//!
//! ```bash
//! rsa-stream --sim-sample-rate 10000 capture --duration-ms 500 --strict
//! rsa-stream capture-file --duration-ms 100 --center-frequency 2.4e9 \
//!     --reference-level -10 --bandwidth 5e6
//! rsa-stream decode-status 0x00080000
//! rsa-stream resolve 3e6
//! rsa-stream --set strict_status=true --set default_bandwidth_hz=5e6 capture
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rsa_core::{AcquisitionConfiguration, BandwidthTable, IqCapture, StatusMode};
use rsa_driver_mock::SimulatedAnalyzer;
use rsa_stream::{CancelHandle, IqStreamClient, StreamSettings, Tuning};
use serde::Serialize;
use tracing::{info, warn};

mod logging;

#[derive(Parser)]
#[command(name = "rsa-stream")]
#[command(about = "IQ streaming client for RSA spectrum analyzers", long_about = None)]
struct Cli {
    /// Settings file (defaults to config/rsa-stream.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log filter directive, overriding the settings file
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log span close events with timings
    #[arg(long, global = true)]
    trace_spans: bool,

    /// Override one setting after the file and environment layers
    #[arg(long = "set", value_name = "KEY=VALUE", global = true)]
    overrides: Vec<String>,

    #[command(flatten)]
    simulator: SimulatorArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SimulatorArgs {
    /// Sample rate the simulated analyzer reports instead of the bandwidth ladder's
    #[arg(long, global = true)]
    sim_sample_rate: Option<f64>,

    /// Sample pairs the simulated analyzer delivers per block
    #[arg(long, global = true)]
    sim_block_size: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture IQ into memory
    Capture(CaptureArgs),

    /// Capture IQ through a temporary split SIQ file
    CaptureFile(FileCaptureArgs),

    /// Decode an acquisition status word (decimal or 0x-prefixed hex)
    DecodeStatus {
        #[arg(value_parser = parse_status_word)]
        word: u32,

        /// Fail when any condition is present
        #[arg(long)]
        strict: bool,
    },

    /// Show the bandwidth ladder entry serving a requested bandwidth
    Resolve {
        /// Requested acquisition bandwidth in Hz
        bandwidth: f64,
    },
}

#[derive(Args)]
struct CaptureArgs {
    /// Capture length in milliseconds
    #[arg(long, default_value_t = 100)]
    duration_ms: u32,

    /// Requested acquisition bandwidth in Hz (defaults to the settings value)
    #[arg(long)]
    bandwidth: Option<f64>,

    /// Sample datatype (SINGLE, INT32, INT16, SINGLE_SCALE_INT32)
    #[arg(long, default_value = "SINGLE")]
    datatype: String,

    /// Client buffer request in sample pairs (0 selects the device default)
    #[arg(long)]
    buffer_size: Option<usize>,

    /// Fail when the acquisition status reports any condition
    #[arg(long)]
    strict: bool,
}

#[derive(Args)]
struct FileCaptureArgs {
    /// Capture length in milliseconds
    #[arg(long, default_value_t = 100)]
    duration_ms: u32,

    /// File name inside the temporary directory
    #[arg(long)]
    name: Option<String>,

    /// Center frequency in Hz
    #[arg(long, requires_all = ["reference_level", "bandwidth"])]
    center_frequency: Option<f64>,

    /// Reference level in dBm
    #[arg(long, allow_hyphen_values = true, requires = "center_frequency")]
    reference_level: Option<f64>,

    /// Requested acquisition bandwidth in Hz
    #[arg(long, requires = "center_frequency")]
    bandwidth: Option<f64>,

    /// Fail when the file status reports any condition
    #[arg(long)]
    strict: bool,
}

impl FileCaptureArgs {
    fn tuning(&self) -> Option<Tuning> {
        Some(Tuning {
            center_frequency_hz: self.center_frequency?,
            reference_level_dbm: self.reference_level?,
            bandwidth_hz: self.bandwidth?,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = StreamSettings::load(cli.config.clone())?;
    settings.apply_overrides(cli.overrides.iter().map(String::as_str))?;
    let mut tracing_config =
        logging::TracingConfig::from_settings(&settings).with_span_events(cli.trace_spans);
    if let Some(directive) = &cli.log_level {
        tracing_config = tracing_config.with_directive(directive.clone());
    }
    logging::init(tracing_config)?;

    match cli.command {
        Commands::DecodeStatus { word, strict } => decode_status(word, strict),
        Commands::Resolve { bandwidth } => resolve(bandwidth),
        Commands::Capture(args) => {
            let client = open(&cli.simulator, settings).await?;
            let result = capture(&client, args).await;
            finish(&client, result).await
        }
        Commands::CaptureFile(args) => {
            let client = open(&cli.simulator, settings).await?;
            let result = capture_file(&client, args).await;
            finish(&client, result).await
        }
    }
}

type Client = IqStreamClient<SimulatedAnalyzer>;

async fn open(args: &SimulatorArgs, settings: StreamSettings) -> Result<Client> {
    let mut builder = SimulatedAnalyzer::builder();
    if let Some(rate) = args.sim_sample_rate {
        builder = builder.sample_rate(rate);
    }
    if let Some(pairs) = args.sim_block_size {
        builder = builder.block_size(pairs);
    }
    let client = IqStreamClient::with_settings(builder.build(), settings);
    client.connect().await?;
    Ok(client)
}

async fn capture(client: &Client, args: CaptureArgs) -> rsa_core::Result<IqCapture> {
    let (destination, datatype) = rsa_stream::parse_output_configuration("CLIENT", &args.datatype)?;
    let settings = client.settings();
    let buffer_size = args.buffer_size.unwrap_or(settings.client_buffer_request);
    let bandwidth = args.bandwidth.unwrap_or(settings.default_bandwidth_hz);
    let strict = args.strict || settings.strict_status;
    let config = AcquisitionConfiguration::client(bandwidth)
        .with_output(destination, datatype)
        .with_buffer_size(buffer_size);
    let params = client.configure_stream(config).await?;
    info!(
        sample_rate = params.sample_rate,
        samples = params.samples_for(args.duration_ms),
        "Capturing to memory"
    );

    let cancel = CancelHandle::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping capture");
            on_interrupt.cancel();
        }
    });
    client
        .capture_to_memory_with(args.duration_ms, strict, &cancel)
        .await
}

async fn capture_file(client: &Client, args: FileCaptureArgs) -> rsa_core::Result<IqCapture> {
    let name = args
        .name
        .clone()
        .unwrap_or_else(|| client.settings().temp_filename.clone());
    let strict = args.strict || client.settings().strict_status;
    match args.tuning() {
        Some(tuning) => {
            client
                .capture_to_file_configured(&tuning, args.duration_ms, &name, strict)
                .await
        }
        None => {
            client
                .capture_to_file(args.duration_ms, &name, strict)
                .await
        }
    }
}

/// Disconnect, then print whatever was captured.
async fn finish(client: &Client, result: rsa_core::Result<IqCapture>) -> Result<()> {
    if let Err(e) = client.disconnect().await {
        warn!(error = %e, "Disconnect failed");
    }
    match result {
        Ok(capture) => print_json(&CaptureSummary::new(&capture)),
        Err(err) => {
            // Faults and early ends still carry what was collected.
            if let Some(capture) = err.capture() {
                print_json(&CaptureSummary::new(capture))?;
            }
            Err(err.into())
        }
    }
}

fn decode_status(word: u32, strict: bool) -> Result<()> {
    let report = rsa_core::decode_status(word, StatusMode::from_strict(strict))?;
    print_json(&StatusSummary {
        word: format!("{word:#010x}"),
        clean: report.is_empty(),
        data_lost: report.data_lost(),
        messages: report.messages(),
    })
}

fn resolve(bandwidth: f64) -> Result<()> {
    let entry = BandwidthTable::rsa_family().resolve(bandwidth)?;
    print_json(&entry)
}

fn parse_status_word(text: &str) -> std::result::Result<u32, String> {
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => text.parse(),
    };
    parsed.map_err(|e| format!("invalid status word '{text}': {e}"))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{text}");
    Ok(())
}

#[derive(Serialize)]
struct StatusSummary {
    word: String,
    clean: bool,
    data_lost: bool,
    messages: Vec<&'static str>,
}

#[derive(Serialize)]
struct CaptureSummary {
    samples: usize,
    requested: usize,
    partial: bool,
    sample_rate: f64,
    duration_secs: f64,
    mean_power_dbfs: Option<f64>,
    status: String,
    data_lost: bool,
}

impl CaptureSummary {
    fn new(capture: &IqCapture) -> Self {
        let mean_power = if capture.is_empty() {
            None
        } else {
            let total: f64 = capture
                .samples
                .iter()
                .map(|s| f64::from(s.norm_sqr()))
                .sum();
            Some(total / capture.len() as f64)
        };
        Self {
            samples: capture.len(),
            requested: capture.requested,
            partial: capture.is_partial(),
            sample_rate: capture.sample_rate,
            duration_secs: capture.duration_secs(),
            mean_power_dbfs: mean_power.filter(|p| *p > 0.0).map(|p| 10.0 * p.log10()),
            status: capture.status.to_string(),
            data_lost: capture.status.data_lost(),
        }
    }
}
