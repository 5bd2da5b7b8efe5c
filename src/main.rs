use agrisage::{CoreConfig, DecisionCore, FeatureVector};
use anyhow::{bail, Context};
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Crop recommendation, market risk and policy lookup for one farm
#[derive(Parser, Debug)]
#[command(name = "agrisage")]
#[command(about = "Crop recommendation with explanations, market risk and policy search", long_about = None)]
struct Args {
    /// JSON config file; missing keys use defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding crop_model.json, agrisage_brain.json and Crop_recommendation.csv
    #[arg(long)]
    models_dir: Option<PathBuf>,

    /// Policy documents JSON
    #[arg(long)]
    policy_docs: Option<PathBuf>,

    /// Seed for reproducible simulations
    #[arg(long)]
    seed: Option<u64>,

    /// Nitrogen (kg/ha)
    #[arg(long)]
    n: Option<f64>,

    /// Phosphorus (kg/ha)
    #[arg(long)]
    p: Option<f64>,

    /// Potassium (kg/ha)
    #[arg(long)]
    k: Option<f64>,

    /// Temperature (C)
    #[arg(long)]
    temperature: Option<f64>,

    /// Relative humidity (%)
    #[arg(long)]
    humidity: Option<f64>,

    /// Rainfall (mm)
    #[arg(long)]
    rainfall: Option<f64>,

    /// Soil pH
    #[arg(long)]
    ph: Option<f64>,

    /// Farm size in acres
    #[arg(long, default_value_t = 1.0)]
    acres: f64,

    /// Search policy documents instead of running a recommendation
    #[arg(short, long)]
    query: Option<String>,

    /// Number of policy passages to return
    #[arg(long)]
    top_k: Option<usize>,

    /// Print which backend each service is running on and exit
    #[arg(long)]
    status: bool,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn features(&self) -> anyhow::Result<FeatureVector> {
        let values = [
            ("n", self.n),
            ("p", self.p),
            ("k", self.k),
            ("temperature", self.temperature),
            ("humidity", self.humidity),
            ("rainfall", self.rainfall),
            ("ph", self.ph),
        ];
        let missing: Vec<&str> = values.iter().filter(|(_, v)| v.is_none()).map(|(name, _)| *name).collect();
        if !missing.is_empty() {
            bail!("missing feature values: --{}", missing.join(", --"));
        }
        Ok(FeatureVector::from_array(values.map(|(_, v)| v.unwrap_or_default())))
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting AgriSage v{}", env!("CARGO_PKG_VERSION"));

    let mut config = match &args.config {
        Some(path) => CoreConfig::from_file(path)
            .with_context(|| format!("failed to read config {}", path.display()))?,
        None => CoreConfig::default(),
    };
    if let Some(dir) = &args.models_dir {
        config = config.with_models_dir(dir);
    }
    if let Some(path) = &args.policy_docs {
        config.policy_docs_path = path.clone();
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }

    let core = DecisionCore::load(config).context("failed to initialize decision core")?;

    if args.status {
        return print_json(&core.status());
    }

    if let Some(query) = &args.query {
        let hits = core.query_policies(query, args.top_k);
        info!(hits = hits.len(), "Policy search finished");
        return print_json(&hits);
    }

    let raw = args.features()?;
    let recommendation = core
        .recommend(&raw, args.acres)
        .context("recommendation failed")?;
    print_json(&recommendation)
}
