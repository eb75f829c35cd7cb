//! Feature schema: which enriched columns feed the model, in which order

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::record::ACTIVATION_ATMOSPHERE;

/// Numeric model inputs, in vector order
pub const DEFAULT_NUMERIC: [&str; 27] = [
    "Agent/Sample(g/g)",
    "Soaking_Time(min)",
    "Soaking_Temp(K)",
    "Activation_Time(min)",
    "Activation_Temp(K)",
    "Activation_Heating_Rate (K/min)",
    "BET_Surface_Area(m2/g)",
    "Total_Pore_Volume(cm3/g)",
    "Micropore_Volume(cm3/g)",
    "Average_Pore_Diameter(nm)",
    "pHpzc",
    "C_molar",
    "H_C_molar",
    "O_C_molar",
    "N_C_molar",
    "S_C_molar",
    "Initial_Concentration(mg/L)",
    "Solution_pH",
    "Temperature(K)",
    "Agitation_speed(rpm)",
    "Dosage(g/L)",
    "Contact_Time(min)",
    "E",
    "S",
    "A",
    "B",
    "V",
];

/// Elemental weight-percent inputs
pub const PERCENT_FIELDS: [&str; 5] = ["C_percent", "H_percent", "O_percent", "N_percent", "S_percent"];

pub const TOTAL_PORE_VOLUME: &str = "Total_Pore_Volume(cm3/g)";
pub const MICROPORE_VOLUME: &str = "Micropore_Volume(cm3/g)";

/// Numeric columns as they appear in raw input (before enrichment)
pub fn raw_numeric_columns() -> impl Iterator<Item = &'static str> {
    DEFAULT_NUMERIC
        .iter()
        .copied()
        .filter(|c| !c.ends_with("_molar"))
        .chain(PERCENT_FIELDS)
}

/// Ordered numeric and categorical columns for the preprocessor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub numeric: Vec<String>,
    pub categorical: Vec<String>,
}

impl Default for FeatureSchema {
    fn default() -> Self {
        Self {
            numeric: DEFAULT_NUMERIC.iter().map(|c| c.to_string()).collect(),
            categorical: vec![ACTIVATION_ATMOSPHERE.to_string()],
        }
    }
}

impl FeatureSchema {
    pub fn new(numeric: Vec<String>, categorical: Vec<String>) -> Self {
        Self {
            numeric,
            categorical,
        }
    }

    /// Keep only the columns `is_present` accepts, preserving order.
    /// Dropped columns are logged.
    pub fn restricted_to(&self, is_present: impl Fn(&str) -> bool) -> Self {
        let keep = |columns: &[String]| -> Vec<String> {
            columns
                .iter()
                .filter(|c| {
                    let present = is_present(c.as_str());
                    if !present {
                        warn!(column = %c, "schema column not present in dataset");
                    }
                    present
                })
                .cloned()
                .collect()
        };
        Self {
            numeric: keep(&self.numeric),
            categorical: keep(&self.categorical),
        }
    }

    /// Every column the schema reads
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.numeric
            .iter()
            .chain(self.categorical.iter())
            .map(String::as_str)
    }
}
