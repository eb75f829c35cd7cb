//! Aqua qe prediction CLI
//!
//! Serves a trained artifact: batch CSV prediction, single-record prediction,
//! sensitivity sweeps and pharmaceutical comparison.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use aqua_core::{
    compare_pharmaceuticals, predict_csv_file, sweep, sweep_values, AppContext, AquaConfig,
    RawRecord, Value,
};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "aqua-predict")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Predict adsorption capacity qe (mg/g) with a trained model", long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Model artifact directory (overrides configuration)
    #[arg(short, long)]
    model_dir: Option<PathBuf>,

    /// Solute catalog CSV (overrides configuration)
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Predict every row of a CSV file
    Batch {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Predict a single record
    Predict {
        #[command(flatten)]
        record: RecordArgs,
    },
    /// Vary one field of a record and predict each variant
    Sweep {
        #[command(flatten)]
        record: RecordArgs,
        /// Field to vary
        #[arg(long)]
        field: String,
        #[arg(long, required_unless_present = "values")]
        start: Option<f64>,
        #[arg(long, required_unless_present = "values")]
        end: Option<f64>,
        #[arg(long, default_value = "25")]
        points: usize,
        /// Explicit grid instead of start/end/points
        #[arg(long, value_delimiter = ',')]
        values: Option<Vec<f64>>,
    },
    /// Predict the record for every pharmaceutical in the catalog
    Compare {
        #[command(flatten)]
        record: RecordArgs,
    },
}

#[derive(clap::Args, Debug)]
struct RecordArgs {
    /// JSON file with field → value pairs
    #[arg(long)]
    record: Option<PathBuf>,

    /// Field assignment, repeatable: --set "Solution_pH=7"
    #[arg(long = "set", value_name = "FIELD=VALUE")]
    set: Vec<String>,
}

impl RecordArgs {
    fn build(&self) -> Result<RawRecord> {
        let mut record = match &self.record {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read record {}", path.display()))?;
                serde_json::from_str::<RawRecord>(&content).context("Invalid record JSON")?
            }
            None => RawRecord::new(),
        };

        for assignment in &self.set {
            let Some((field, raw)) = assignment.split_once('=') else {
                bail!("Expected FIELD=VALUE, got {assignment:?}");
            };
            record.insert_cell(field, raw);
        }

        // Numeric-looking text from JSON goes through the same cell parsing.
        let normalized: RawRecord = record
            .iter()
            .map(|(k, v)| match v {
                Value::Text(t) => (k.clone(), Value::parse_cell(t).unwrap_or_else(|| v.clone())),
                Value::Num(_) => (k.clone(), v.clone()),
            })
            .collect();
        Ok(normalized)
    }
}

fn init_logging(verbose: bool, level: &str) -> Result<()> {
    let default_level = if verbose { "debug" } else { level };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => AquaConfig::load_from_file(path).context("Failed to load configuration")?,
        None => AquaConfig::default(),
    };
    config.load_from_env().context("Invalid environment override")?;
    if let Some(dir) = &args.model_dir {
        config.paths.model_dir = dir.clone();
    }
    if let Some(catalog) = &args.catalog {
        config.paths.catalog = Some(catalog.clone());
    }

    init_logging(args.verbose, &config.logging.level)?;
    info!("Aqua qe predictor v{}", env!("CARGO_PKG_VERSION"));

    let context = AppContext::initialize(&config).context("Failed to initialize serving context")?;
    let pipeline = &context.pipeline;

    match &args.command {
        Command::Batch { input, output } => {
            let summary = predict_csv_file(pipeline, input, output)
                .with_context(|| format!("Batch prediction failed for {}", input.display()))?;
            info!("Predictions written to: {}", output.display());
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Predict { record } => {
            let prediction = pipeline.predict(&record.build()?)?;
            println!("{}", serde_json::to_string_pretty(&prediction)?);
        }
        Command::Sweep {
            record,
            field,
            start,
            end,
            points,
            values,
        } => {
            let base = record.build()?;
            let results = match (values, start, end) {
                (Some(values), _, _) => sweep_values(pipeline, &base, field, values)?,
                (None, Some(start), Some(end)) => sweep(pipeline, &base, field, *start, *end, *points)?,
                _ => bail!("Provide --values or both --start and --end"),
            };
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
        Command::Compare { record } => {
            let results = compare_pharmaceuticals(pipeline, &record.build()?)?;
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
    }

    Ok(())
}
