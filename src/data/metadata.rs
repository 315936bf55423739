//! Per-sample metadata: isotope treatment, gradient replicate, buoyant density.

use crate::error::{Result, SipError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// A metadata value that can be categorical, continuous, or ordinal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Variable {
    /// Categorical variable with string levels.
    Categorical(String),
    /// Continuous numeric variable.
    Continuous(f64),
    /// Ordinal variable with integer rank.
    Ordinal(i64),
    /// Missing value.
    Missing,
}

impl Variable {
    /// Parse a raw text cell. Empty cells and `NA` are missing.
    pub fn parse(raw: &str, var_type: VariableType) -> Self {
        let raw = raw.trim();
        if is_missing_token(raw) {
            return Variable::Missing;
        }
        match var_type {
            VariableType::Continuous => raw
                .parse::<f64>()
                .map(Variable::Continuous)
                .unwrap_or(Variable::Missing),
            VariableType::Ordinal => raw
                .parse::<i64>()
                .map(Variable::Ordinal)
                .unwrap_or(Variable::Missing),
            VariableType::Categorical => Variable::Categorical(raw.to_string()),
        }
    }

    /// Check if this is a missing value.
    pub fn is_missing(&self) -> bool {
        matches!(self, Variable::Missing)
    }

    /// Try to get as categorical string.
    pub fn as_categorical(&self) -> Option<&str> {
        match self {
            Variable::Categorical(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view of the value, used for comparisons against number literals.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Variable::Continuous(v) => Some(*v),
            Variable::Ordinal(v) => Some(*v as f64),
            Variable::Categorical(s) => s.trim().parse::<f64>().ok(),
            Variable::Missing => None,
        }
    }

    /// Boolean view of the value: `TRUE`/`FALSE` style levels and 0/1.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Variable::Categorical(s) => match s.trim() {
                "TRUE" | "True" | "true" | "T" => Some(true),
                "FALSE" | "False" | "false" | "F" => Some(false),
                _ => None,
            },
            Variable::Ordinal(1) => Some(true),
            Variable::Ordinal(0) => Some(false),
            Variable::Continuous(v) if *v == 1.0 => Some(true),
            Variable::Continuous(v) if *v == 0.0 => Some(false),
            _ => None,
        }
    }

    /// Coerce to `f64` the way a numeric cast of the text would.
    ///
    /// Text that does not parse, and missing values, become NaN. Infinite
    /// values (`Inf`, `-inf`) are kept so the caller can filter them.
    pub fn to_f64(&self) -> f64 {
        match self {
            Variable::Continuous(v) => *v,
            Variable::Ordinal(v) => *v as f64,
            Variable::Categorical(s) => s.trim().parse::<f64>().unwrap_or(f64::NAN),
            Variable::Missing => f64::NAN,
        }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variable::Categorical(s) => write!(f, "{}", s),
            Variable::Continuous(v) => write!(f, "{}", v),
            Variable::Ordinal(v) => write!(f, "{}", v),
            Variable::Missing => write!(f, "NA"),
        }
    }
}

fn is_missing_token(raw: &str) -> bool {
    raw.is_empty() || raw == "NA" || raw == "na"
}

/// Type hint for columns when loading metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VariableType {
    Categorical,
    Continuous,
    Ordinal,
}

/// Sample metadata containing variables for each sample.
#[derive(Debug, Clone)]
pub struct Metadata {
    /// Sample IDs in order.
    sample_ids: Vec<String>,
    /// Column names.
    column_names: Vec<String>,
    /// Data stored as sample_id -> column_name -> Variable.
    data: HashMap<String, HashMap<String, Variable>>,
    /// Type hints for each column.
    column_types: HashMap<String, VariableType>,
}

impl Metadata {
    /// Create empty metadata.
    pub fn new() -> Self {
        Self {
            sample_ids: Vec::new(),
            column_names: Vec::new(),
            data: HashMap::new(),
            column_types: HashMap::new(),
        }
    }

    /// Load metadata from a TSV file.
    ///
    /// Expected format:
    /// - First row: header with column names (first column is sample ID)
    /// - Subsequent rows: sample ID followed by variable values
    ///
    /// Columns are inferred as continuous if all values parse as numbers,
    /// otherwise categorical.
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut lines = reader.lines();

        let header_line = lines
            .next()
            .ok_or_else(|| SipError::EmptyData("Empty metadata file".to_string()))??;
        let header: Vec<&str> = header_line.split('\t').collect();
        if header.len() < 2 {
            return Err(SipError::EmptyData(
                "Metadata must have at least one variable column".to_string(),
            ));
        }
        let column_names: Vec<String> = header[1..].iter().map(|s| s.to_string()).collect();

        let mut raw_data: Vec<(String, Vec<String>)> = Vec::new();
        for line_result in lines {
            let line = line_result?;
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            let sample_id = fields[0].to_string();
            let values: Vec<String> = fields[1..].iter().map(|s| s.to_string()).collect();
            raw_data.push((sample_id, values));
        }

        Self::from_raw(column_names, raw_data)
    }

    /// Build metadata from raw text cells, inferring a type per column.
    ///
    /// `raw_data` holds one `(sample_id, values)` entry per sample, values in
    /// `column_names` order. Short rows are padded with missing values.
    pub fn from_raw(
        column_names: Vec<String>,
        raw_data: Vec<(String, Vec<String>)>,
    ) -> Result<Self> {
        if raw_data.is_empty() {
            return Err(SipError::EmptyData("No samples in metadata".to_string()));
        }

        let mut column_types = HashMap::new();
        for (col_idx, col_name) in column_names.iter().enumerate() {
            let all_numeric = raw_data.iter().all(|(_, values)| {
                values.get(col_idx).map_or(true, |v| {
                    let v = v.trim();
                    is_missing_token(v) || v.parse::<f64>().is_ok()
                })
            });
            let var_type = if all_numeric {
                VariableType::Continuous
            } else {
                VariableType::Categorical
            };
            column_types.insert(col_name.clone(), var_type);
        }

        let mut sample_ids = Vec::with_capacity(raw_data.len());
        let mut data = HashMap::with_capacity(raw_data.len());

        for (sample_id, values) in raw_data {
            if data.contains_key(&sample_id) {
                return Err(SipError::SampleMismatch(format!(
                    "Sample '{}' appears more than once in metadata",
                    sample_id
                )));
            }
            let sample_data: HashMap<String, Variable> = column_names
                .iter()
                .enumerate()
                .map(|(col_idx, col_name)| {
                    let var = match values.get(col_idx) {
                        Some(raw) => Variable::parse(raw, column_types[col_name]),
                        None => Variable::Missing,
                    };
                    (col_name.clone(), var)
                })
                .collect();
            sample_ids.push(sample_id.clone());
            data.insert(sample_id, sample_data);
        }

        Ok(Self {
            sample_ids,
            column_names,
            data,
            column_types,
        })
    }

    /// Sample IDs in order.
    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Column names.
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    /// Number of samples.
    pub fn n_samples(&self) -> usize {
        self.sample_ids.len()
    }

    /// Get a variable value for a specific sample and column.
    pub fn get(&self, sample_id: &str, column: &str) -> Option<&Variable> {
        self.data.get(sample_id).and_then(|m| m.get(column))
    }

    /// Get the type of a column.
    pub fn column_type(&self, column: &str) -> Option<VariableType> {
        self.column_types.get(column).copied()
    }

    /// A read-only view of one sample's record, as seen by control predicates.
    pub fn sample(&self, sample_id: &str) -> Option<SampleView<'_>> {
        self.data
            .get_key_value(sample_id)
            .map(|(id, values)| SampleView { sample_id: id, values })
    }

    /// Check if a sample exists.
    pub fn has_sample(&self, sample_id: &str) -> bool {
        self.data.contains_key(sample_id)
    }

    /// Check if a column exists.
    pub fn has_column(&self, column: &str) -> bool {
        self.column_names.iter().any(|c| c == column)
    }
}

impl Default for Metadata {
    fn default() -> Self {
        Self::new()
    }
}

/// Borrowed metadata record of a single sample.
#[derive(Debug, Clone, Copy)]
pub struct SampleView<'a> {
    sample_id: &'a str,
    values: &'a HashMap<String, Variable>,
}

impl<'a> SampleView<'a> {
    /// Identifier of the sample.
    pub fn sample_id(&self) -> &'a str {
        self.sample_id
    }

    /// Value of a metadata column, `None` when the column does not exist.
    pub fn get(&self, column: &str) -> Option<&'a Variable> {
        self.values.get(column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_tsv() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "sample_id\tsubstrate\tBuoyant_density\tReplicate").unwrap();
        writeln!(file, "F1\t12C-Con\t1.701\t1").unwrap();
        writeln!(file, "F2\t13C-Cel\t1.724\t1").unwrap();
        writeln!(file, "F3\t12C-Con\tNA\t2").unwrap();
        writeln!(file, "F4\t13C-Cel\t1.733\t").unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_metadata() {
        let file = create_test_tsv();
        let meta = Metadata::from_tsv(file.path()).unwrap();

        assert_eq!(meta.n_samples(), 4);
        assert_eq!(meta.sample_ids(), &["F1", "F2", "F3", "F4"]);
        assert_eq!(meta.column_names(), &["substrate", "Buoyant_density", "Replicate"]);
    }

    #[test]
    fn test_column_type_inference() {
        let file = create_test_tsv();
        let meta = Metadata::from_tsv(file.path()).unwrap();

        assert_eq!(meta.column_type("substrate"), Some(VariableType::Categorical));
        assert_eq!(meta.column_type("Buoyant_density"), Some(VariableType::Continuous));
        assert_eq!(meta.column_type("Replicate"), Some(VariableType::Continuous));
    }

    #[test]
    fn test_missing_values() {
        let file = create_test_tsv();
        let meta = Metadata::from_tsv(file.path()).unwrap();

        assert!(meta.get("F3", "Buoyant_density").unwrap().is_missing());
        assert!(meta.get("F4", "Replicate").unwrap().is_missing());
        assert_eq!(meta.get("F2", "substrate").unwrap().as_categorical(), Some("13C-Cel"));
    }

    #[test]
    fn test_sample_view() {
        let file = create_test_tsv();
        let meta = Metadata::from_tsv(file.path()).unwrap();

        let view = meta.sample("F1").unwrap();
        assert_eq!(view.sample_id(), "F1");
        assert_eq!(view.get("Buoyant_density").unwrap().as_number(), Some(1.701));
        assert!(view.get("nope").is_none());
        assert!(meta.sample("F9").is_none());
    }

    #[test]
    fn test_duplicate_sample_rejected() {
        let raw = vec![
            ("S1".to_string(), vec!["a".to_string()]),
            ("S1".to_string(), vec!["b".to_string()]),
        ];
        let result = Metadata::from_raw(vec!["x".to_string()], raw);
        assert!(matches!(result, Err(SipError::SampleMismatch(_))));
    }

    #[test]
    fn test_variable_coercion() {
        assert_eq!(Variable::Categorical(" 1.75 ".into()).to_f64(), 1.75);
        assert!(Variable::Categorical("abc".into()).to_f64().is_nan());
        assert!(Variable::Categorical("Inf".into()).to_f64().is_infinite());
        assert!(Variable::Missing.to_f64().is_nan());
        assert_eq!(Variable::Ordinal(3).to_f64(), 3.0);
    }

    #[test]
    fn test_variable_as_bool() {
        assert_eq!(Variable::Categorical("TRUE".into()).as_bool(), Some(true));
        assert_eq!(Variable::Categorical("false".into()).as_bool(), Some(false));
        assert_eq!(Variable::Continuous(1.0).as_bool(), Some(true));
        assert_eq!(Variable::Categorical("13C".into()).as_bool(), None);
        assert_eq!(Variable::Missing.as_bool(), None);
    }
}
