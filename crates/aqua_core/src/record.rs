//! Raw measurement records and cell parsing

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Pharmaceutical (solute) code column
pub const TARGET_PHAR: &str = "Target_Phar";
/// Activation atmosphere (N2 / Air / SG)
pub const ACTIVATION_ATMOSPHERE: &str = "Activation_Atmosphere";
/// Regression target
pub const TARGET: &str = "qe(mg/g)";

/// A single cell value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Num(f64),
    Text(String),
}

impl Value {
    /// Parse a raw cell: trimmed, empty is missing, decimal comma accepted.
    pub fn parse_cell(raw: &str) -> Option<Value> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        match trimmed.replace(',', ".").parse::<f64>() {
            Ok(v) if v.is_finite() => Some(Value::Num(v)),
            _ => Some(Value::Text(trimmed.to_string())),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Num(v) => Some(*v),
            Value::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            Value::Num(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Num(v) => write!(f, "{v}"),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Num(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

/// Field name → value; an absent key means the measurement is missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord {
    fields: BTreeMap<String, Value>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert under the trimmed field name.
    pub fn insert(&mut self, name: &str, value: impl Into<Value>) -> &mut Self {
        self.fields.insert(name.trim().to_string(), value.into());
        self
    }

    /// Builder-style insert
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Insert a raw cell; empty cells leave the field missing.
    pub fn insert_cell(&mut self, name: &str, raw: &str) {
        match Value::parse_cell(raw) {
            Some(value) => {
                self.insert(name, value);
            }
            None => {
                self.fields.remove(name.trim());
            }
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.fields.remove(name.trim())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn get_num(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Value::as_f64)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Build from header/cell pairs as read from a CSV row.
    pub fn from_cells<'a>(cells: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut record = Self::new();
        for (name, raw) in cells {
            record.insert_cell(name, raw);
        }
        record
    }
}

impl FromIterator<(String, Value)> for RawRecord {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut record = Self::new();
        for (name, value) in iter {
            record.insert(&name, value);
        }
        record
    }
}
