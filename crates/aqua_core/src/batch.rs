//! Batch prediction over CSV files

use std::io::{Read, Write};
use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use crate::errors::{Result, SchemaError};
use crate::pipeline::InferencePipeline;
use crate::record::{RawRecord, ACTIVATION_ATMOSPHERE, TARGET_PHAR};

/// Prediction column appended to the output
pub const PREDICTION_COLUMN: &str = "qe_pred(mg/g)";
/// Per-row error column appended to the output
pub const ERROR_COLUMN: &str = "error";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub rows: usize,
    pub predicted: usize,
    pub failed: usize,
}

/// One input row padded to the header width, or the reason it cannot be read
struct BatchRow {
    cells: Vec<String>,
    error: Option<String>,
}

impl BatchRow {
    fn parse(row: std::result::Result<csv::StringRecord, csv::Error>, width: usize) -> Self {
        match row {
            Ok(row) if row.len() > width => Self {
                cells: row.iter().take(width).map(str::to_string).collect(),
                error: Some(format!("row has {} fields, header has {width}", row.len())),
            },
            Ok(row) => {
                let mut cells: Vec<String> = row.iter().map(str::to_string).collect();
                cells.resize(width, String::new());
                Self { cells, error: None }
            }
            Err(err) => Self {
                cells: vec![String::new(); width],
                error: Some(err.to_string()),
            },
        }
    }
}

/// Predict every row of a CSV stream and write it back with the prediction
/// and error columns appended. Rows keep their input order.
pub fn predict_csv<R: Read, W: Write>(
    pipeline: &InferencePipeline,
    input: R,
    output: W,
) -> Result<BatchSummary> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(input);
    let headers = reader.headers()?.clone();

    for required in [TARGET_PHAR, ACTIVATION_ATMOSPHERE] {
        if !headers.iter().any(|h| h.trim() == required) {
            return Err(SchemaError::MissingColumn(required.to_string()).into());
        }
    }

    let width = headers.len();
    let rows: Vec<BatchRow> = reader
        .records()
        .map(|row| BatchRow::parse(row, width))
        .collect();

    let valid: Vec<usize> = (0..rows.len()).filter(|&i| rows[i].error.is_none()).collect();
    let records: Vec<RawRecord> = valid
        .iter()
        .map(|&i| RawRecord::from_cells(headers.iter().zip(rows[i].cells.iter().map(String::as_str))))
        .collect();

    let mut outcomes: Vec<std::result::Result<f64, String>> = rows
        .iter()
        .map(|row| Err(row.error.clone().unwrap_or_default()))
        .collect();
    for (&i, result) in valid.iter().zip(pipeline.predict_batch(&records)) {
        outcomes[i] = result.map(|p| p.qe).map_err(|e| e.error.to_string());
    }

    let mut writer = csv::Writer::from_writer(output);
    let mut out_header: Vec<&str> = headers.iter().collect();
    out_header.extend([PREDICTION_COLUMN, ERROR_COLUMN]);
    writer.write_record(&out_header)?;

    let mut summary = BatchSummary {
        rows: rows.len(),
        predicted: 0,
        failed: 0,
    };
    for (i, (row, outcome)) in rows.iter().zip(&outcomes).enumerate() {
        let (prediction, error) = match outcome {
            Ok(qe) => {
                summary.predicted += 1;
                (qe.to_string(), String::new())
            }
            Err(e) => {
                summary.failed += 1;
                warn!(row = i, error = %e, "row could not be predicted");
                (String::new(), e.clone())
            }
        };
        let mut cells = row.cells.clone();
        cells.push(prediction);
        cells.push(error);
        writer.write_record(&cells)?;
    }
    writer.flush()?;

    info!(
        rows = summary.rows,
        predicted = summary.predicted,
        failed = summary.failed,
        "batch prediction finished"
    );
    Ok(summary)
}

pub fn predict_csv_file<P: AsRef<Path>, Q: AsRef<Path>>(
    pipeline: &InferencePipeline,
    input: P,
    output: Q,
) -> Result<BatchSummary> {
    let input = std::fs::File::open(input)?;
    let output = std::fs::File::create(output)?;
    predict_csv(pipeline, input, output)
}
