//! Error types for the sipkit library.

use thiserror::Error;

/// Main error type for the library.
///
/// Only configuration problems are errors. Numeric degeneracies (zero totals,
/// division by a zero density) surface as NaN fields in the per-taxon output.
#[derive(Error, Debug)]
pub enum SipError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid count value '{value}' at row {row}, column {col}")]
    InvalidCount {
        value: String,
        row: usize,
        col: usize,
    },

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Sample ID mismatch: {0}")]
    SampleMismatch(String),

    #[error("Missing column '{0}'")]
    MissingColumn(String),

    #[error("Empty data: {0}")]
    EmptyData(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Unknown isotope '{0}': expected 13C or 18O")]
    UnknownIsotope(String),

    #[error("Control expression parse error: {0}")]
    PredicateParse(String),

    #[error("Control expression for sample '{sample}' failed: {reason}")]
    PredicateEval { sample: String, reason: String },

    #[error("Pipeline error: {0}")]
    Pipeline(String),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, SipError>;
