//! Domain feature transformer: raw record → enriched record
//!
//! Pure and deterministic. Adds molar-basis elemental ratios, merges the solute
//! descriptors for the record's pharmaceutical and collects data-quality
//! warnings that never block a prediction.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::catalog::{normalize_code, SoluteCatalog, DESCRIPTOR_FIELDS};
use crate::errors::ValidationError;
use crate::record::{RawRecord, Value, ACTIVATION_ATMOSPHERE, TARGET, TARGET_PHAR};
use crate::schema::{raw_numeric_columns, MICROPORE_VOLUME, TOTAL_PORE_VOLUME};

/// Atomic weights (g/mol) for the elemental percent fields
const ATOMIC_WEIGHTS: [(&str, f64); 5] = [
    ("C", 12.011),
    ("H", 1.008),
    ("O", 15.999),
    ("N", 14.007),
    ("S", 32.06),
];

/// Non-fatal data-quality signal attached to a record or prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QualityWarning {
    MicroporeExceedsTotal { micropore: f64, total: f64 },
    NonNumeric { field: String, value: String },
    NonPositiveCarbon { value: f64 },
    UnseenCategory { column: String, value: Option<String> },
}

impl fmt::Display for QualityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QualityWarning::MicroporeExceedsTotal { micropore, total } => write!(
                f,
                "micropore volume {micropore} exceeds total pore volume {total}"
            ),
            QualityWarning::NonNumeric { field, value } => {
                write!(f, "non-numeric value {value:?} in {field} treated as missing")
            }
            QualityWarning::NonPositiveCarbon { value } => {
                write!(f, "carbon percent {value} is not positive; molar ratios skipped")
            }
            QualityWarning::UnseenCategory { column, value } => match value {
                Some(v) => write!(f, "unseen category {v:?} in {column}"),
                None => write!(f, "missing category in {column}"),
            },
        }
    }
}

/// Raw fields plus derived fields and the warnings raised while deriving them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRecord {
    pub fields: BTreeMap<String, Value>,
    pub warnings: Vec<QualityWarning>,
}

impl EnrichedRecord {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn get_num(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Value::as_f64)
    }

    /// Categorical view: text as-is, numbers rendered
    pub fn get_category(&self, name: &str) -> Option<String> {
        self.get(name).map(Value::to_string)
    }

    /// Normalized pharmaceutical code
    pub fn code(&self) -> Option<&str> {
        self.get(TARGET_PHAR).and_then(Value::as_text)
    }

    /// Back to a raw record (warnings dropped)
    pub fn to_raw(&self) -> RawRecord {
        self.fields
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// Raw → enriched record transformer bound to a solute catalog
#[derive(Debug, Clone)]
pub struct DomainTransformer {
    catalog: Arc<SoluteCatalog>,
}

impl DomainTransformer {
    pub fn new(catalog: Arc<SoluteCatalog>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &SoluteCatalog {
        &self.catalog
    }

    pub fn transform(&self, raw: &RawRecord) -> Result<EnrichedRecord, ValidationError> {
        let code = mandatory_text(raw, TARGET_PHAR)?;
        let atmosphere = mandatory_text(raw, ACTIVATION_ATMOSPHERE)?;
        let descriptor = self.catalog.resolve(&code)?;

        let mut warnings = Vec::new();
        let mut fields: BTreeMap<String, Value> = raw
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        // Text in a numeric column is treated as missing.
        for column in raw_numeric_columns().chain([TARGET]) {
            if let Some(Value::Text(text)) = fields.get(column) {
                warnings.push(QualityWarning::NonNumeric {
                    field: column.to_string(),
                    value: text.clone(),
                });
                fields.remove(column);
            }
        }

        fields.insert(TARGET_PHAR.to_string(), Value::Text(normalize_code(&code)));
        fields.insert(ACTIVATION_ATMOSPHERE.to_string(), Value::Text(atmosphere));

        add_elemental_ratios(&mut fields, &mut warnings);

        for (name, value) in DESCRIPTOR_FIELDS.iter().zip(descriptor.values()) {
            fields.insert(name.to_string(), Value::Num(value));
        }

        let micropore = fields.get(MICROPORE_VOLUME).and_then(Value::as_f64);
        let total = fields.get(TOTAL_PORE_VOLUME).and_then(Value::as_f64);
        if let (Some(micropore), Some(total)) = (micropore, total) {
            if micropore > total {
                warnings.push(QualityWarning::MicroporeExceedsTotal { micropore, total });
            }
        }

        Ok(EnrichedRecord { fields, warnings })
    }
}

fn mandatory_text(raw: &RawRecord, field: &str) -> Result<String, ValidationError> {
    match raw.get(field) {
        Some(value) => {
            let text = value.to_string();
            let text = text.trim();
            if text.is_empty() {
                Err(ValidationError::MissingField {
                    field: field.to_string(),
                })
            } else {
                Ok(text.to_string())
            }
        }
        None => Err(ValidationError::MissingField {
            field: field.to_string(),
        }),
    }
}

/// `C_molar = C / aw_C` and `X_C_molar = (X / aw_X) / C_molar`, only for C > 0.
fn add_elemental_ratios(fields: &mut BTreeMap<String, Value>, warnings: &mut Vec<QualityWarning>) {
    for (element, _) in ATOMIC_WEIGHTS {
        let name = if element == "C" {
            "C_molar".to_string()
        } else {
            format!("{element}_C_molar")
        };
        fields.remove(&name);
    }

    let carbon = match fields.get("C_percent").and_then(Value::as_f64) {
        Some(c) => c,
        None => return,
    };
    if carbon <= 0.0 {
        warnings.push(QualityWarning::NonPositiveCarbon { value: carbon });
        return;
    }

    let c_molar = carbon / ATOMIC_WEIGHTS[0].1;
    fields.insert("C_molar".to_string(), Value::Num(c_molar));

    for (element, weight) in &ATOMIC_WEIGHTS[1..] {
        let percent = fields
            .get(&format!("{element}_percent"))
            .and_then(Value::as_f64);
        if let Some(percent) = percent {
            let ratio = (percent / weight) / c_molar;
            fields.insert(format!("{element}_C_molar"), Value::Num(ratio.max(0.0)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transformer() -> DomainTransformer {
        DomainTransformer::new(Arc::new(SoluteCatalog::builtin()))
    }

    fn base_record() -> RawRecord {
        RawRecord::new()
            .with("Target_Phar", "cip")
            .with("Activation_Atmosphere", "N2")
    }

    #[test]
    fn test_elemental_ratios() {
        let raw = base_record()
            .with("C_percent", 74.3)
            .with("H_percent", 3.5)
            .with("O_percent", 5.4);
        let enriched = transformer().transform(&raw).unwrap();

        let c_molar = 74.3 / 12.011;
        assert!((enriched.get_num("C_molar").unwrap() - c_molar).abs() < 1e-12);
        assert!((enriched.get_num("H_C_molar").unwrap() - (3.5 / 1.008) / c_molar).abs() < 1e-12);
        assert!((enriched.get_num("O_C_molar").unwrap() - (5.4 / 15.999) / c_molar).abs() < 1e-12);
        assert_eq!(enriched.get_num("N_C_molar"), None);
    }

    #[test]
    fn test_negative_ratio_clamps_to_zero() {
        let raw = base_record().with("C_percent", 50.0).with("N_percent", -1.0);
        let enriched = transformer().transform(&raw).unwrap();
        assert_eq!(enriched.get_num("N_C_molar"), Some(0.0));
    }

    #[test]
    fn test_non_positive_carbon() {
        let raw = base_record().with("C_percent", 0.0).with("H_percent", 2.0);
        let enriched = transformer().transform(&raw).unwrap();
        assert_eq!(enriched.get_num("C_molar"), None);
        assert_eq!(enriched.get_num("H_C_molar"), None);
        assert_eq!(
            enriched.warnings,
            vec![QualityWarning::NonPositiveCarbon { value: 0.0 }]
        );
    }

    #[test]
    fn test_descriptors_overwrite_user_values() {
        let raw = base_record().with("E", 9.9);
        let enriched = transformer().transform(&raw).unwrap();
        assert_eq!(enriched.get_num("E"), Some(2.20));
        assert_eq!(enriched.get_num("V"), Some(2.3040));
        assert_eq!(enriched.code(), Some("CIP"));
    }

    #[test]
    fn test_missing_mandatory_fields() {
        let raw = RawRecord::new().with("Activation_Atmosphere", "N2");
        assert_eq!(
            transformer().transform(&raw),
            Err(ValidationError::MissingField {
                field: "Target_Phar".into()
            })
        );

        let raw = RawRecord::new().with("Target_Phar", "CIP").with("Activation_Atmosphere", " ");
        assert!(matches!(
            transformer().transform(&raw),
            Err(ValidationError::MissingField { .. })
        ));
    }

    #[test]
    fn test_text_in_numeric_column() {
        let raw = base_record().with("Solution_pH", "acidic");
        let enriched = transformer().transform(&raw).unwrap();
        assert!(enriched.get("Solution_pH").is_none());
        assert_eq!(
            enriched.warnings,
            vec![QualityWarning::NonNumeric {
                field: "Solution_pH".into(),
                value: "acidic".into()
            }]
        );
    }

    #[test]
    fn test_unrelated_fields_pass_through() {
        let raw = base_record().with("Reference", "Smith 2020").with("Batch", 3.0);
        let enriched = transformer().transform(&raw).unwrap();
        assert_eq!(enriched.get("Reference"), Some(&Value::from("Smith 2020")));
        assert_eq!(enriched.get_num("Batch"), Some(3.0));
    }
}
