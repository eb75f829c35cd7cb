//! Preprocessing composer: median imputation, standardization, one-hot encoding
//!
//! Statistics are estimated once by [`FittedPreprocessor::fit`] and frozen;
//! `transform` only applies them, so identical input always yields a
//! bit-identical vector.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::SchemaError;
use crate::schema::FeatureSchema;
use crate::transform::{EnrichedRecord, QualityWarning};

/// Model input vector, ordered as [`FittedPreprocessor::feature_names`]
pub type FeatureVector = Vec<f64>;

/// Suffix of the trailing one-hot slot for unseen or missing levels
pub const UNSEEN_LEVEL: &str = "__unseen__";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericStats {
    pub name: String,
    pub median: f64,
    pub mean: f64,
    /// Standard deviation, or 1 when it is zero
    pub scale: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryLevels {
    pub name: String,
    /// Sorted observed levels
    pub levels: Vec<String>,
}

impl CategoryLevels {
    fn width(&self) -> usize {
        self.levels.len() + 1
    }
}

/// Frozen preprocessing state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedPreprocessor {
    pub numeric: Vec<NumericStats>,
    pub categorical: Vec<CategoryLevels>,
}

fn median(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

impl FittedPreprocessor {
    pub fn fit(records: &[EnrichedRecord], schema: &FeatureSchema) -> Result<Self, SchemaError> {
        if records.is_empty() {
            return Err(SchemaError::Empty);
        }

        let mut numeric = Vec::with_capacity(schema.numeric.len());
        for name in &schema.numeric {
            let mut observed: Vec<f64> = records
                .iter()
                .filter_map(|r| r.get_num(name))
                .filter(|v| v.is_finite())
                .collect();
            if observed.is_empty() {
                warn!(column = %name, "no observed values; column is imputed as zero");
                numeric.push(NumericStats {
                    name: name.clone(),
                    median: 0.0,
                    mean: 0.0,
                    scale: 1.0,
                });
                continue;
            }
            observed.sort_by(f64::total_cmp);

            let n = observed.len() as f64;
            let mean = observed.iter().sum::<f64>() / n;
            let variance = observed.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
            let std = variance.sqrt();
            let scale = if std > 0.0 && std.is_finite() { std } else { 1.0 };

            numeric.push(NumericStats {
                name: name.clone(),
                median: median(&observed),
                mean,
                scale,
            });
        }

        let mut categorical = Vec::with_capacity(schema.categorical.len());
        for name in &schema.categorical {
            let levels: BTreeSet<String> = records
                .iter()
                .filter_map(|r| r.get_category(name))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .collect();
            if levels.is_empty() {
                warn!(column = %name, "no observed levels; every value maps to the unseen slot");
            }
            categorical.push(CategoryLevels {
                name: name.clone(),
                levels: levels.into_iter().collect(),
            });
        }

        let fitted = Self {
            numeric,
            categorical,
        };
        debug!(
            records = records.len(),
            width = fitted.width(),
            "fitted preprocessor"
        );
        Ok(fitted)
    }

    /// Output vector width
    pub fn width(&self) -> usize {
        self.numeric.len() + self.categorical.iter().map(CategoryLevels::width).sum::<usize>()
    }

    /// Output column names: numeric columns, then `column=level` slots with a
    /// trailing `column=__unseen__` per categorical column.
    pub fn feature_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.numeric.iter().map(|n| n.name.clone()).collect();
        for column in &self.categorical {
            for level in &column.levels {
                names.push(format!("{}={}", column.name, level));
            }
            names.push(format!("{}={}", column.name, UNSEEN_LEVEL));
        }
        names
    }

    /// Enriched columns read by `transform`
    pub fn input_columns(&self) -> Vec<String> {
        self.numeric
            .iter()
            .map(|n| n.name.clone())
            .chain(self.categorical.iter().map(|c| c.name.clone()))
            .collect()
    }

    /// Apply the frozen statistics. Unseen or missing categories go to the
    /// unseen slot and are reported as warnings.
    pub fn transform(&self, record: &EnrichedRecord) -> (FeatureVector, Vec<QualityWarning>) {
        let mut vector = Vec::with_capacity(self.width());
        let mut warnings = Vec::new();

        for stats in &self.numeric {
            let value = record
                .get_num(&stats.name)
                .filter(|v| v.is_finite())
                .unwrap_or(stats.median);
            vector.push((value - stats.mean) / stats.scale);
        }

        for column in &self.categorical {
            let value = record
                .get_category(&column.name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty());
            let hit = value
                .as_deref()
                .and_then(|v| column.levels.iter().position(|l| l == v));
            if hit.is_none() {
                warnings.push(QualityWarning::UnseenCategory {
                    column: column.name.clone(),
                    value: value.clone(),
                });
            }
            let slot = hit.unwrap_or(column.levels.len());
            vector.extend((0..column.width()).map(|i| if i == slot { 1.0 } else { 0.0 }));
        }

        (vector, warnings)
    }

    pub fn transform_many(&self, records: &[EnrichedRecord]) -> Vec<FeatureVector> {
        records.iter().map(|r| self.transform(r).0).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Value;
    use std::collections::BTreeMap;

    fn record(ph: Option<f64>, atmosphere: Option<&str>) -> EnrichedRecord {
        let mut fields = BTreeMap::new();
        if let Some(ph) = ph {
            fields.insert("Solution_pH".to_string(), Value::Num(ph));
        }
        if let Some(a) = atmosphere {
            fields.insert("Activation_Atmosphere".to_string(), Value::from(a));
        }
        EnrichedRecord {
            fields,
            warnings: Vec::new(),
        }
    }

    fn schema() -> FeatureSchema {
        FeatureSchema::new(
            vec!["Solution_pH".into()],
            vec!["Activation_Atmosphere".into()],
        )
    }

    #[test]
    fn test_fit_statistics() {
        let records = vec![
            record(Some(2.0), Some("N2")),
            record(Some(4.0), Some("Air")),
            record(None, Some("N2")),
            record(Some(9.0), Some("SG")),
        ];
        let fitted = FittedPreprocessor::fit(&records, &schema()).unwrap();
        assert_eq!(fitted.numeric[0].median, 4.0);
        assert_eq!(fitted.numeric[0].mean, 5.0);
        assert_eq!(fitted.categorical[0].levels, vec!["Air", "N2", "SG"]);
        assert_eq!(
            fitted.feature_names(),
            vec![
                "Solution_pH",
                "Activation_Atmosphere=Air",
                "Activation_Atmosphere=N2",
                "Activation_Atmosphere=SG",
                "Activation_Atmosphere=__unseen__",
            ]
        );
    }

    #[test]
    fn test_imputation_and_one_hot() {
        let records = vec![record(Some(1.0), Some("N2")), record(Some(3.0), Some("Air"))];
        let fitted = FittedPreprocessor::fit(&records, &schema()).unwrap();

        // median 2, mean 2, std 1
        let (vector, warnings) = fitted.transform(&record(None, Some("N2")));
        assert_eq!(vector, vec![0.0, 0.0, 1.0, 0.0]);
        assert!(warnings.is_empty());

        let (vector, warnings) = fitted.transform(&record(Some(5.0), Some("CO2")));
        assert_eq!(vector, vec![3.0, 0.0, 0.0, 1.0]);
        assert_eq!(
            warnings,
            vec![QualityWarning::UnseenCategory {
                column: "Activation_Atmosphere".into(),
                value: Some("CO2".into())
            }]
        );
    }

    #[test]
    fn test_zero_variance_scale() {
        let records = vec![record(Some(7.0), Some("N2")), record(Some(7.0), Some("N2"))];
        let fitted = FittedPreprocessor::fit(&records, &schema()).unwrap();
        assert_eq!(fitted.numeric[0].scale, 1.0);
        assert_eq!(fitted.transform(&record(Some(8.0), Some("N2"))).0[0], 1.0);
    }

    #[test]
    fn test_schema_errors() {
        assert_eq!(
            FittedPreprocessor::fit(&[], &schema()),
            Err(SchemaError::Empty)
        );
    }

    #[test]
    fn test_unobserved_columns_get_neutral_stats() {
        let records = vec![record(None, None), record(None, None)];
        let fitted = FittedPreprocessor::fit(&records, &schema()).unwrap();
        assert_eq!(fitted.numeric[0].median, 0.0);
        assert_eq!(fitted.numeric[0].mean, 0.0);
        assert_eq!(fitted.numeric[0].scale, 1.0);
        assert!(fitted.categorical[0].levels.is_empty());
        assert_eq!(fitted.width(), 2);

        let (vector, warnings) = fitted.transform(&record(Some(4.0), Some("N2")));
        assert_eq!(vector, vec![4.0, 1.0]);
        assert_eq!(warnings.len(), 1);
        assert_eq!(fitted.transform(&record(None, None)).0, vec![0.0, 1.0]);
    }

    #[test]
    fn test_transform_is_repeatable() {
        let records = vec![record(Some(1.5), Some("N2")), record(Some(3.25), Some("Air"))];
        let fitted = FittedPreprocessor::fit(&records, &schema()).unwrap();
        let input = record(Some(2.2), None);
        let a = fitted.transform(&input).0;
        let b = fitted.transform(&input).0;
        assert_eq!(
            a.iter().map(|v| v.to_bits()).collect::<Vec<_>>(),
            b.iter().map(|v| v.to_bits()).collect::<Vec<_>>()
        );
    }
}
