//! Precept - command line entry point
//!
//! Loads an exported network and its training config, runs one prediction
//! and prints the raw inputs and raw outputs. Without explicit inputs, values
//! are drawn uniformly from each feature's training range.

use anyhow::{Context, Result};
use clap::Parser;
use precept_inference::{InferenceSession, RunnerConfig};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "precept", version, about = "Run a trained regression network on raw feature values")]
struct Cli {
    /// Path to the exported ONNX network
    model: Option<PathBuf>,

    /// Path to the training config (*.yml)
    config: Option<PathBuf>,

    /// Comma separated raw input values, in config order
    #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
    inputs: Option<Vec<f64>>,

    /// Seed for generated inputs
    #[arg(long)]
    seed: Option<u64>,

    /// Intra-op threads for ONNX inference
    #[arg(long)]
    threads: Option<usize>,

    /// TOML file with runner settings; command line flags take precedence
    #[arg(long)]
    runner_config: Option<PathBuf>,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,

    /// Log format (pretty, json)
    #[arg(long)]
    log_format: Option<String>,
}

struct Settings {
    model_path: PathBuf,
    config_path: PathBuf,
    onnx_threads: usize,
    seed: u64,
    log_level: String,
    log_format: String,
}

impl Settings {
    fn resolve(cli: &Cli) -> Result<Self> {
        let runner = cli
            .runner_config
            .as_ref()
            .map(RunnerConfig::load_from_path)
            .transpose()?;

        let model_path = cli
            .model
            .clone()
            .or_else(|| runner.as_ref().map(|r| PathBuf::from(&r.model_path)))
            .context("No model path given (positional MODEL or runner config)")?;
        let config_path = cli
            .config
            .clone()
            .or_else(|| runner.as_ref().map(|r| PathBuf::from(&r.config_path)))
            .context("No config path given (positional CONFIG or runner config)")?;

        let logging = runner.as_ref().map(|r| r.logging.clone()).unwrap_or_default();

        Ok(Self {
            model_path,
            config_path,
            onnx_threads: cli
                .threads
                .or(runner.as_ref().map(|r| r.onnx_threads))
                .unwrap_or(1),
            seed: cli.seed.or(runner.as_ref().map(|r| r.seed)).unwrap_or(666),
            log_level: logging.level,
            log_format: cli.log_format.clone().unwrap_or(logging.format),
        })
    }
}

fn init_logging(level: &str, format: &str) -> Result<()> {
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("precept_inference={}", level).parse()?)
        .add_directive(format!("precept={}", level).parse()?);

    match format {
        "json" => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
        _ => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::resolve(&cli)?;
    init_logging(&settings.log_level, &settings.log_format)?;

    info!("Starting Precept inference");

    let session = InferenceSession::open_with_threads(
        &settings.model_path,
        &settings.config_path,
        settings.onnx_threads,
    )?;

    let inputs = match &cli.inputs {
        Some(values) => values.clone(),
        None => {
            info!(seed = settings.seed, "Generating inputs inside the training range");
            let mut rng = StdRng::seed_from_u64(settings.seed);
            session
                .min_x()
                .iter()
                .zip(session.max_x())
                .map(|(&lo, &hi)| rng.gen_range(lo..=hi))
                .collect()
        }
    };

    let outputs = session.predict(&inputs)?;

    if cli.json {
        let named = |names: &[String], values: &[f64]| -> Vec<serde_json::Value> {
            names
                .iter()
                .zip(values)
                .map(|(name, value)| json!({ "name": name, "value": value }))
                .collect()
        };
        let report = json!({
            "inputs": named(session.input_names(), &inputs),
            "outputs": named(session.output_names(), &outputs),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Input: {}", format_row(&inputs));
        println!("Output: {}", format_row(&outputs));
    }

    Ok(())
}

fn format_row(values: &[f64]) -> String {
    let cells: Vec<String> = values.iter().map(|v| v.to_string()).collect();
    format!("[ {} ]", cells.join(", "))
}
