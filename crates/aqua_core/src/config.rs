//! Configuration for training and serving
//!
//! Loaded from TOML, then overridden by `AQUA_*` environment variables.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::{AquaError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AquaConfig {
    pub paths: PathConfig,
    pub training: TrainingConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    /// Solute catalog CSV; the built-in catalog is used when unset
    pub catalog: Option<PathBuf>,
    /// Artifact directory written by training and read by serving
    pub model_dir: PathBuf,
    /// Where training writes reports
    pub report_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub seed: u64,
    /// Holdout fraction for the candidate comparison
    pub test_size: f64,
    pub n_folds: usize,
    /// Random-search trials per tuned candidate
    pub n_iter: usize,
    /// How many ranked candidates are tuned
    pub top_k: usize,
    /// Keep each pharmaceutical's share equal across folds
    pub stratify_by_pharmaceutical: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            catalog: None,
            model_dir: PathBuf::from("models/best"),
            report_dir: PathBuf::from("reports"),
        }
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            test_size: 0.2,
            n_folds: 5,
            n_iter: 30,
            top_k: 2,
            stratify_by_pharmaceutical: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

fn parse_into<T: FromStr>(key: &str, raw: &str, slot: &mut T) -> bool {
    match raw.trim().parse() {
        Ok(value) => {
            *slot = value;
            true
        }
        Err(_) => {
            warn!(key, value = raw, "ignoring unparsable override");
            false
        }
    }
}

impl AquaConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());
        let content = std::fs::read_to_string(path)?;
        let config: AquaConfig = toml::from_str(&content)
            .map_err(|e| AquaError::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| AquaError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply `AQUA_*` environment overrides.
    pub fn load_from_env(&mut self) -> Result<Vec<String>> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup; returns the keys that were applied.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Vec<String>> {
        let mut applied = Vec::new();
        let mut apply = |key: &str, set: &mut dyn FnMut(&str) -> bool| {
            if let Some(raw) = lookup(key) {
                if set(&raw) {
                    applied.push(key.to_string());
                }
            }
        };

        let training = &mut self.training;
        apply("AQUA_SEED", &mut |raw| parse_into("AQUA_SEED", raw, &mut training.seed));
        apply("AQUA_TEST_SIZE", &mut |raw| {
            parse_into("AQUA_TEST_SIZE", raw, &mut training.test_size)
        });
        apply("AQUA_FOLDS", &mut |raw| parse_into("AQUA_FOLDS", raw, &mut training.n_folds));
        apply("AQUA_TRIALS", &mut |raw| parse_into("AQUA_TRIALS", raw, &mut training.n_iter));
        apply("AQUA_TOP_K", &mut |raw| parse_into("AQUA_TOP_K", raw, &mut training.top_k));

        let paths = &mut self.paths;
        apply("AQUA_CATALOG", &mut |raw| {
            paths.catalog = Some(PathBuf::from(raw));
            true
        });
        apply("AQUA_MODEL_DIR", &mut |raw| {
            paths.model_dir = PathBuf::from(raw);
            true
        });
        apply("AQUA_REPORT_DIR", &mut |raw| {
            paths.report_dir = PathBuf::from(raw);
            true
        });

        let logging = &mut self.logging;
        apply("AQUA_LOG_LEVEL", &mut |raw| {
            logging.level = raw.trim().to_string();
            true
        });

        if !applied.is_empty() {
            info!(keys = ?applied, "applied environment overrides");
        }
        self.validate()?;
        Ok(applied)
    }

    pub fn validate(&self) -> Result<()> {
        let t = &self.training;
        if !(t.test_size > 0.0 && t.test_size < 1.0) {
            return Err(AquaError::Config(format!(
                "test_size must be in (0, 1), got {}",
                t.test_size
            )));
        }
        if t.n_folds < 2 {
            return Err(AquaError::Config(format!(
                "n_folds must be at least 2, got {}",
                t.n_folds
            )));
        }
        if t.n_iter == 0 || t.top_k == 0 {
            return Err(AquaError::Config("n_iter and top_k must be positive".into()));
        }
        Ok(())
    }
}
