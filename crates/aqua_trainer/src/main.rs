//! Aqua qe trainer CLI
//!
//! Compares the boosting backends, tunes the best ranked ones and writes the
//! winning pipeline as a model artifact plus OOF and summary reports.

use std::path::PathBuf;

use anyhow::{Context, Result};
use aqua_core::context::load_catalog;
use aqua_core::{save_artifact, AquaConfig, DomainTransformer};
use aqua_trainer::{TrainingOptions, TrainingSession, TrainingSet};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "aqua-train")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Select and train an adsorption-capacity (qe) model", long_about = None)]
struct Args {
    /// Input CSV dataset with a qe(mg/g) column
    #[arg(short, long)]
    input: PathBuf,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output directory for the model artifact
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Directory for OOF and summary reports
    #[arg(long)]
    report_dir: Option<PathBuf>,

    /// Solute catalog CSV (built-in catalog when omitted)
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Random-search trials per tuned candidate
    #[arg(long)]
    n_iter: Option<usize>,

    /// Number of cross-validation folds
    #[arg(long)]
    folds: Option<usize>,

    /// Random seed for splits, folds and search
    #[arg(long)]
    seed: Option<u64>,

    /// How many ranked candidates to tune
    #[arg(long)]
    top_k: Option<usize>,

    /// Stratify folds by pharmaceutical code
    #[arg(long)]
    stratify: bool,

    /// Also write the enriched dataset to this CSV
    #[arg(long)]
    export_enriched: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn apply(&self, config: &mut AquaConfig) {
        if let Some(dir) = &self.output {
            config.paths.model_dir = dir.clone();
        }
        if let Some(dir) = &self.report_dir {
            config.paths.report_dir = dir.clone();
        }
        if let Some(catalog) = &self.catalog {
            config.paths.catalog = Some(catalog.clone());
        }
        let training = &mut config.training;
        if let Some(n_iter) = self.n_iter {
            training.n_iter = n_iter;
        }
        if let Some(folds) = self.folds {
            training.n_folds = folds;
        }
        if let Some(seed) = self.seed {
            training.seed = seed;
        }
        if let Some(top_k) = self.top_k {
            training.top_k = top_k;
        }
        if self.stratify {
            training.stratify_by_pharmaceutical = true;
        }
    }
}

fn init_logging(verbose: bool, level: &str) -> Result<()> {
    let default_level = if verbose { "debug" } else { level };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
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
    args.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    init_logging(args.verbose, &config.logging.level)?;
    info!("Aqua qe trainer v{}", aqua_trainer::VERSION);
    info!("═══════════════════════════════════════════");

    let catalog = load_catalog(config.paths.catalog.as_deref())
        .context("Failed to load solute catalog")?;
    let transformer = DomainTransformer::new(catalog);

    let data = TrainingSet::from_csv(&args.input, &transformer).context("Failed to load dataset")?;
    if let Some(path) = &args.export_enriched {
        data.write_enriched_csv(path)
            .context("Failed to write enriched dataset")?;
    }

    let training = &config.training;
    info!("Training configuration:");
    info!("  Seed: {}", training.seed);
    info!("  Test size: {}", training.test_size);
    info!("  Folds: {}", training.n_folds);
    info!("  Trials per candidate: {}", training.n_iter);
    info!("  Tuned candidates: {}", training.top_k);
    info!("  Stratified: {}", training.stratify_by_pharmaceutical);

    let session = TrainingSession::new(TrainingOptions::from(training));
    let outcome = session
        .run(&data, &transformer)
        .context("Model selection failed")?;

    let metadata = save_artifact(&config.paths.model_dir, &outcome.pipeline, outcome.cv_metrics.clone())
        .context("Failed to save model artifact")?;
    outcome
        .oof
        .write(&config.paths.report_dir)
        .context("Failed to write OOF report")?;
    outcome
        .summary
        .write(&config.paths.report_dir)
        .context("Failed to write training summary")?;

    info!("═══════════════════════════════════════════");
    info!("✓ Training completed successfully");
    info!("  Model: {} ({})", config.paths.model_dir.display(), metadata.model_type);
    info!("  Hash: {}", metadata.model_hash);
    info!("  OOF R2: {:.4}", outcome.oof.metrics.r2);
    info!("  Reports: {}", config.paths.report_dir.display());

    Ok(())
}
