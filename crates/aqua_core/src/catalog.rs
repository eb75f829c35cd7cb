//! Solute descriptor catalog
//!
//! Maps a pharmaceutical code to its Abraham descriptors (E, S, A, B, V).
//! Codes are matched after trimming and upper-casing. The catalog is loaded
//! once and shared read-only; an unknown code is always an error.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::{AquaError, Result, ValidationError};

/// Descriptor field names, in merge order
pub const DESCRIPTOR_FIELDS: [&str; 5] = ["E", "S", "A", "B", "V"];

/// Abraham solute descriptors
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SoluteDescriptor {
    /// Excess molar refraction
    pub e: f64,
    /// Dipolarity / polarizability
    pub s: f64,
    /// Hydrogen-bond acidity
    pub a: f64,
    /// Hydrogen-bond basicity
    pub b: f64,
    /// McGowan characteristic volume
    pub v: f64,
}

impl SoluteDescriptor {
    pub const fn new(e: f64, s: f64, a: f64, b: f64, v: f64) -> Self {
        Self { e, s, a, b, v }
    }

    /// Values paired with [`DESCRIPTOR_FIELDS`]
    pub fn values(&self) -> [f64; 5] {
        [self.e, self.s, self.a, self.b, self.v]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoluteEntry {
    pub code: String,
    pub display_name: String,
    pub descriptor: SoluteDescriptor,
}

/// Reference entries (UFZ LSER database values)
const BUILTIN: [(&str, &str, SoluteDescriptor); 21] = [
    ("PHE", "Phenol", SoluteDescriptor::new(0.85, 0.95, 0.30, 0.78, 1.1156)),
    ("APAP", "Acetaminophen", SoluteDescriptor::new(1.06, 1.63, 1.04, 0.86, 1.1724)),
    ("ASA", "Acetylsalicylic acid", SoluteDescriptor::new(0.78, 1.69, 0.71, 0.67, 1.2879)),
    ("BENZ", "Benzocaine", SoluteDescriptor::new(1.03, 1.31, 0.31, 0.69, 1.3133)),
    ("CAF", "Caffeine", SoluteDescriptor::new(1.50, 1.72, 0.05, 1.28, 1.3632)),
    ("CIP", "Ciprofloxacin", SoluteDescriptor::new(2.20, 2.34, 0.70, 2.52, 2.3040)),
    ("CIT", "Citalopram", SoluteDescriptor::new(1.83, 1.99, 0.00, 1.53, 2.5328)),
    ("DCF", "Diclofenac", SoluteDescriptor::new(1.81, 1.85, 0.55, 0.77, 2.0250)),
    ("FLX", "Fluoxetine", SoluteDescriptor::new(1.23, 1.30, 0.12, 1.03, 2.2403)),
    ("IBU", "Ibuprofen", SoluteDescriptor::new(0.73, 0.70, 0.56, 0.79, 1.7771)),
    ("MTZ", "Metronidazole", SoluteDescriptor::new(1.12, 1.79, 0.37, 1.04, 1.1919)),
    ("NPX", "Naproxen", SoluteDescriptor::new(1.51, 2.02, 0.60, 0.67, 1.7821)),
    ("NOR", "Norfloxacin", SoluteDescriptor::new(1.98, 2.50, 0.05, 2.39, 2.2724)),
    ("OTC", "Oxytetracycline", SoluteDescriptor::new(3.60, 3.05, 1.65, 3.50, 3.1579)),
    ("SA", "Salicylic acid", SoluteDescriptor::new(0.90, 0.85, 0.73, 0.37, 0.9904)),
    ("SDZ", "Sulfadiazine", SoluteDescriptor::new(2.08, 2.55, 0.65, 1.37, 1.7225)),
    ("SMR", "Sulfamerazine", SoluteDescriptor::new(2.10, 2.65, 0.65, 1.42, 1.8634)),
    ("SMT", "Sulfamethazine", SoluteDescriptor::new(2.13, 2.53, 0.59, 1.53, 2.0043)),
    ("SMX", "Sulfamethoxazole", SoluteDescriptor::new(1.89, 2.23, 0.58, 1.29, 1.7244)),
    ("TC", "Tetracycline", SoluteDescriptor::new(3.50, 3.60, 1.35, 3.29, 3.0992)),
    ("CBZ", "Carbamazepine", SoluteDescriptor::new(2.15, 1.90, 0.50, 1.15, 1.8106)),
];

/// Trim and upper-case a pharmaceutical code.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// One row of a catalog CSV file
#[derive(Debug, Deserialize)]
struct CatalogRow {
    #[serde(rename = "Code")]
    code: String,
    #[serde(rename = "Display_Name")]
    display_name: String,
    #[serde(rename = "E")]
    e: f64,
    #[serde(rename = "S")]
    s: f64,
    #[serde(rename = "A")]
    a: f64,
    #[serde(rename = "B")]
    b: f64,
    #[serde(rename = "V")]
    v: f64,
}

/// Immutable code → descriptor table
#[derive(Debug, Clone)]
pub struct SoluteCatalog {
    entries: Vec<SoluteEntry>,
    index: HashMap<String, usize>,
}

impl SoluteCatalog {
    /// Catalog with the 21 reference pharmaceuticals
    pub fn builtin() -> Self {
        let entries: Vec<SoluteEntry> = BUILTIN
            .iter()
            .map(|(code, name, descriptor)| SoluteEntry {
                code: code.to_string(),
                display_name: name.to_string(),
                descriptor: *descriptor,
            })
            .collect();
        let index = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.code.clone(), i))
            .collect();
        Self { entries, index }
    }

    /// Build from entries; codes are normalized and must be unique.
    pub fn from_entries(entries: Vec<SoluteEntry>) -> Result<Self> {
        if entries.is_empty() {
            return Err(AquaError::Catalog("catalog has no entries".into()));
        }

        let mut normalized = Vec::with_capacity(entries.len());
        let mut index = HashMap::with_capacity(entries.len());
        for mut entry in entries {
            entry.code = normalize_code(&entry.code);
            if entry.code.is_empty() {
                return Err(AquaError::Catalog("entry with an empty code".into()));
            }
            if entry.descriptor.values().iter().any(|v| !v.is_finite()) {
                return Err(AquaError::Catalog(format!(
                    "non-finite descriptor for {}",
                    entry.code
                )));
            }
            if index.insert(entry.code.clone(), normalized.len()).is_some() {
                return Err(AquaError::Catalog(format!("duplicate code {}", entry.code)));
            }
            normalized.push(entry);
        }

        Ok(Self {
            entries: normalized,
            index,
        })
    }

    /// Load a `Code, Display_Name, E, S, A, B, V` CSV file.
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| {
            AquaError::Catalog(format!("cannot open {}: {e}", path.display()))
        })?;
        let catalog = Self::from_reader(file)?;
        info!(
            entries = catalog.len(),
            path = %path.display(),
            "loaded solute catalog"
        );
        Ok(catalog)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let mut entries = Vec::new();
        for (line, row) in csv_reader.deserialize::<CatalogRow>().enumerate() {
            let row = row.map_err(|e| AquaError::Catalog(format!("row {}: {e}", line + 1)))?;
            entries.push(SoluteEntry {
                code: row.code,
                display_name: row.display_name,
                descriptor: SoluteDescriptor::new(row.e, row.s, row.a, row.b, row.v),
            });
        }
        Self::from_entries(entries)
    }

    /// Write the catalog in the same CSV layout `from_csv` reads.
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(["Code", "Display_Name", "E", "S", "A", "B", "V"])?;
        for entry in &self.entries {
            let d = entry.descriptor;
            writer.write_record([
                entry.code.clone(),
                entry.display_name.clone(),
                d.e.to_string(),
                d.s.to_string(),
                d.a.to_string(),
                d.b.to_string(),
                d.v.to_string(),
            ])?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Descriptor for a code, or `ValidationError::ReferenceData`.
    pub fn resolve(&self, code: &str) -> std::result::Result<SoluteDescriptor, ValidationError> {
        self.entry(code)
            .map(|e| e.descriptor)
            .ok_or_else(|| ValidationError::ReferenceData {
                code: code.trim().to_string(),
            })
    }

    pub fn entry(&self, code: &str) -> Option<&SoluteEntry> {
        self.index
            .get(&normalize_code(code))
            .map(|&i| &self.entries[i])
    }

    pub fn display_name(&self, code: &str) -> Option<&str> {
        self.entry(code).map(|e| e.display_name.as_str())
    }

    /// Codes in catalog order
    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.code.as_str())
    }

    pub fn entries(&self) -> &[SoluteEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
