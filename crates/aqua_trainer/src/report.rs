//! Out-of-fold error analysis and the training summary

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use aqua_boost::{ModelType, ParamMap};
use aqua_core::SoluteCatalog;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::cv::{CvReport, FoldResult, Spread};
use crate::dataset::TrainingSet;
use crate::errors::Result;
use crate::metrics::{ape_pct, RegressionMetrics};
use crate::pool::{PoolEntry, TuningSummary};

pub const OOF_DETAIL_FILE: &str = "oof_detail.csv";
pub const OOF_BY_DRUG_FILE: &str = "oof_by_drug.csv";
pub const OOF_APE_BINS_FILE: &str = "oof_ape_bins.csv";
pub const OOF_JSON_FILE: &str = "oof_report.json";
pub const SUMMARY_FILE: &str = "training_summary.json";

/// Lower edges of the APE bins, in percent; the last bin is open-ended.
const APE_EDGES: [f64; 8] = [0.0, 5.0, 10.0, 15.0, 20.0, 30.0, 50.0, 100.0];
const APE_LABELS: [&str; 8] = [
    "0–5%", "5–10%", "10–15%", "15–20%", "20–30%", "30–50%", "50–100%", "100%+",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OofRow {
    pub row: usize,
    pub fold: usize,
    pub target_phar: String,
    pub y_true: f64,
    pub y_pred: f64,
    pub err: f64,
    pub abs_err: f64,
    pub sq_err: f64,
    /// `None` when `y_true` is zero
    pub ape_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrugSummary {
    pub target_phar: String,
    pub display_name: Option<String>,
    pub n: usize,
    pub mae: f64,
    pub rmse: f64,
    pub mape: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApeBin {
    pub label: String,
    pub lower: f64,
    pub upper: Option<f64>,
    pub count: usize,
    /// Share of rows with a defined APE
    pub share_pct: f64,
}

fn ape_bin(ape: f64) -> usize {
    APE_EDGES.iter().rposition(|&edge| ape >= edge).unwrap_or(0)
}

/// Out-of-fold predictions broken down by row, pharmaceutical and error size
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OofReport {
    pub metrics: RegressionMetrics,
    /// Sorted by absolute error, largest first
    pub rows: Vec<OofRow>,
    /// Sorted by MAE, largest first
    pub by_drug: Vec<DrugSummary>,
    pub ape_bins: Vec<ApeBin>,
}

impl OofReport {
    pub fn build(data: &TrainingSet, cv: &CvReport, catalog: &SoluteCatalog) -> Self {
        let mut rows: Vec<OofRow> = (0..data.len())
            .map(|row| {
                let (y_true, y_pred) = (data.targets[row], cv.oof[row]);
                let err = y_pred - y_true;
                OofRow {
                    row,
                    fold: cv.fold_of[row],
                    target_phar: data.groups[row].clone(),
                    y_true,
                    y_pred,
                    err,
                    abs_err: err.abs(),
                    sq_err: err * err,
                    ape_pct: ape_pct(y_true, y_pred),
                }
            })
            .collect();

        let mut grouped: BTreeMap<&str, Vec<&OofRow>> = BTreeMap::new();
        for row in &rows {
            grouped.entry(row.target_phar.as_str()).or_default().push(row);
        }
        let mut by_drug: Vec<DrugSummary> = grouped
            .into_iter()
            .map(|(code, group)| {
                let n = group.len();
                let apes: Vec<f64> = group.iter().filter_map(|r| r.ape_pct).collect();
                DrugSummary {
                    target_phar: code.to_string(),
                    display_name: catalog.display_name(code).map(str::to_string),
                    n,
                    mae: group.iter().map(|r| r.abs_err).sum::<f64>() / n as f64,
                    rmse: (group.iter().map(|r| r.sq_err).sum::<f64>() / n as f64).sqrt(),
                    mape: (!apes.is_empty()).then(|| apes.iter().sum::<f64>() / apes.len() as f64),
                }
            })
            .collect();
        by_drug.sort_by(|a, b| b.mae.total_cmp(&a.mae));

        let mut counts = [0usize; APE_EDGES.len()];
        let mut defined = 0;
        for ape in rows.iter().filter_map(|r| r.ape_pct) {
            counts[ape_bin(ape)] += 1;
            defined += 1;
        }
        let ape_bins = (0..APE_EDGES.len())
            .map(|i| ApeBin {
                label: APE_LABELS[i].to_string(),
                lower: APE_EDGES[i],
                upper: APE_EDGES.get(i + 1).copied(),
                count: counts[i],
                share_pct: if defined == 0 {
                    0.0
                } else {
                    counts[i] as f64 / defined as f64 * 100.0
                },
            })
            .collect();

        rows.sort_by(|a, b| b.abs_err.total_cmp(&a.abs_err));

        Self {
            metrics: cv.oof_metrics,
            rows,
            by_drug,
            ape_bins,
        }
    }

    /// Write the three CSV tables and the JSON report into `dir`.
    pub fn write(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;
        write_csv(&dir.join(OOF_DETAIL_FILE), &self.rows)?;
        write_csv(&dir.join(OOF_BY_DRUG_FILE), &self.by_drug)?;
        write_csv(&dir.join(OOF_APE_BINS_FILE), &self.ape_bins)?;
        write_json(&dir.join(OOF_JSON_FILE), self)?;
        info!("OOF report written to: {}", dir.display());
        Ok(())
    }
}

/// Per-fold table of the selected model with mean ± std
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoldTable {
    pub folds: Vec<FoldResult>,
    pub r2: Spread,
    pub rmse: Spread,
    pub mae: Spread,
}

impl FoldTable {
    pub fn from_report(report: &CvReport) -> Self {
        Self {
            folds: report.folds.clone(),
            r2: report.r2(),
            rmse: report.rmse(),
            mae: report.mae(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub created_at: DateTime<Utc>,
    pub rows: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    pub seed: u64,
    pub n_folds: usize,
    pub pool: Vec<PoolEntry>,
    pub tuning: Vec<TuningSummary>,
    pub best_name: String,
    pub best_model_type: ModelType,
    pub best_params: ParamMap,
    pub best_folds: FoldTable,
    pub oof: RegressionMetrics,
    pub test: RegressionMetrics,
}

impl TrainingSummary {
    pub fn write(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;
        write_json(&dir.join(SUMMARY_FILE), self)
    }
}

fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, value)?;
    Ok(())
}
