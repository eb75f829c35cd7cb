//! CSV dataset loading
//!
//! Rows are parsed into [`RawRecord`]s and enriched once at load time. Rows
//! without a usable target or that fail enrichment are skipped with a warning.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use aqua_core::record::TARGET;
use aqua_core::{DomainTransformer, EnrichedRecord, FeatureSchema, RawRecord, Value};
use tracing::{info, warn};

use crate::errors::DatasetError;

/// Enriched training rows with their targets and pharmaceutical groups
#[derive(Clone, Debug)]
pub struct TrainingSet {
    pub records: Vec<EnrichedRecord>,
    pub targets: Vec<f64>,
    /// Normalized `Target_Phar` code per row
    pub groups: Vec<String>,
}

impl TrainingSet {
    /// Build from already enriched rows.
    pub fn new(records: Vec<EnrichedRecord>, targets: Vec<f64>) -> Self {
        let groups = records
            .iter()
            .map(|r| r.code().unwrap_or_default().to_string())
            .collect();
        Self {
            records,
            targets,
            groups,
        }
    }

    /// Load a dataset CSV whose header contains the `qe(mg/g)` target column.
    pub fn from_csv<P: AsRef<Path>>(
        path: P,
        transformer: &DomainTransformer,
    ) -> Result<Self, DatasetError> {
        info!("Loading dataset from: {}", path.as_ref().display());
        let file = File::open(path.as_ref())?;
        Self::from_reader(file, transformer)
    }

    pub fn from_reader<R: Read>(
        reader: R,
        transformer: &DomainTransformer,
    ) -> Result<Self, DatasetError> {
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        let target_idx = headers
            .iter()
            .position(|h| h == TARGET)
            .ok_or_else(|| DatasetError::MissingColumn(TARGET.to_string()))?;

        let mut records = Vec::new();
        let mut targets = Vec::new();
        let mut skipped = 0;

        for (line, row) in reader.records().enumerate() {
            let row = row?;
            let target = row
                .get(target_idx)
                .and_then(Value::parse_cell)
                .and_then(|v| v.as_f64());
            let Some(target) = target else {
                warn!(row = line + 1, "skipping row without a numeric target");
                skipped += 1;
                continue;
            };

            let raw = RawRecord::from_cells(
                headers
                    .iter()
                    .zip(row.iter())
                    .enumerate()
                    .filter(|(i, _)| *i != target_idx)
                    .map(|(_, (h, cell))| (h.as_str(), cell)),
            );
            match transformer.transform(&raw) {
                Ok(enriched) => {
                    records.push(enriched);
                    targets.push(target);
                }
                Err(err) => {
                    warn!(row = line + 1, %err, "skipping row");
                    skipped += 1;
                }
            }
        }

        if records.is_empty() {
            return Err(DatasetError::NoUsableRows { skipped });
        }
        info!("Loaded {} rows ({} skipped)", records.len(), skipped);
        Ok(Self::new(records, targets))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Rows at the given indices, in index order
    pub fn subset(&self, indices: &[usize]) -> Self {
        Self {
            records: indices.iter().map(|&i| self.records[i].clone()).collect(),
            targets: indices.iter().map(|&i| self.targets[i]).collect(),
            groups: indices.iter().map(|&i| self.groups[i].clone()).collect(),
        }
    }

    /// `base` limited to the columns observed in at least one row
    pub fn schema(&self, base: &FeatureSchema) -> FeatureSchema {
        base.restricted_to(|column| self.records.iter().any(|r| r.get(column).is_some()))
    }

    /// Write the enriched rows (all columns, sorted by name) with the target last.
    pub fn write_enriched_csv<P: AsRef<Path>>(&self, path: P) -> Result<(), DatasetError> {
        let columns: BTreeSet<&str> = self
            .records
            .iter()
            .flat_map(|r| r.fields.keys().map(String::as_str))
            .collect();

        let mut writer = csv::Writer::from_path(path.as_ref())?;
        writer.write_record(columns.iter().copied().chain(std::iter::once(TARGET)))?;
        for (record, target) in self.records.iter().zip(&self.targets) {
            let mut cells: Vec<String> = columns
                .iter()
                .map(|c| record.get(c).map(|v| v.to_string()).unwrap_or_default())
                .collect();
            cells.push(target.to_string());
            writer.write_record(&cells)?;
        }
        writer.flush()?;
        info!("Enriched dataset written to: {}", path.as_ref().display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aqua_core::SoluteCatalog;
    use std::sync::Arc;

    const CSV: &str = "\
Target_Phar,Activation_Atmosphere,BET_Surface_Area(m2/g),C_percent,H_percent,qe(mg/g)
CIP,N2,850,70,\"2,5\",120.5
SMX,Air,900,65,3,80
XYZ,N2,700,60,2,50
TC,N2,750,60,2,
";

    fn transformer() -> DomainTransformer {
        DomainTransformer::new(Arc::new(SoluteCatalog::builtin()))
    }

    #[test]
    fn test_load_skips_unusable_rows() {
        let data = TrainingSet::from_reader(CSV.as_bytes(), &transformer()).unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data.targets, vec![120.5, 80.0]);
        assert_eq!(data.groups, vec!["CIP", "SMX"]);
        assert!(data.records[0].get("qe(mg/g)").is_none());
        assert!(data.records[0].get_num("H_C_molar").is_some());
        assert_eq!(data.records[0].get_num("E"), Some(2.20));
    }

    #[test]
    fn test_missing_target_column() {
        let err = TrainingSet::from_reader("Target_Phar\nCIP\n".as_bytes(), &transformer())
            .unwrap_err();
        assert!(matches!(err, DatasetError::MissingColumn(c) if c == TARGET));
    }

    #[test]
    fn test_no_usable_rows() {
        let csv = "Target_Phar,Activation_Atmosphere,qe(mg/g)\nNOPE,N2,1\n";
        let err = TrainingSet::from_reader(csv.as_bytes(), &transformer()).unwrap_err();
        assert!(matches!(err, DatasetError::NoUsableRows { skipped: 1 }));
    }

    #[test]
    fn test_subset_and_schema() {
        let data = TrainingSet::from_reader(CSV.as_bytes(), &transformer()).unwrap();
        let sub = data.subset(&[1]);
        assert_eq!(sub.targets, vec![80.0]);
        assert_eq!(sub.groups, vec!["SMX"]);

        let schema = data.schema(&FeatureSchema::default());
        assert!(schema.numeric.iter().any(|c| c == "BET_Surface_Area(m2/g)"));
        assert!(!schema.numeric.iter().any(|c| c == "Solution_pH"));
    }

    #[test]
    fn test_write_enriched_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("enriched.csv");
        let data = TrainingSet::from_reader(CSV.as_bytes(), &transformer()).unwrap();
        data.write_enriched_csv(&path).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.iter().last(), Some(TARGET));
        assert!(headers.iter().any(|h| h == "C_molar"));
        assert_eq!(reader.records().count(), 2);
    }
}
