use std::path::PathBuf;

use polars::prelude::PolarsError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("could not load dataset {path:?}: {reason}")]
    DatasetLoadFailure { path: PathBuf, reason: String },
    #[error("dataset has no rows")]
    EmptyDataset,
    #[error("row {row} has no HeartDisease label")]
    MissingLabel { row: usize },
    #[error("could not load model bundle {path:?}: {reason}")]
    ModelLoadFailure { path: PathBuf, reason: String },
    #[error("unknown {field} value {value:?}")]
    UnknownCategoryValue { field: &'static str, value: String },
    #[error("{field} value {value} outside [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("feature columns do not match the model: expected {expected:?}, found {found:?}")]
    ColumnMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },
    #[error("training failed: {0}")]
    Training(String),
    #[error("prediction failed: {0}")]
    Prediction(String),
    #[error("invalid output format for {path:?}")]
    OutputFormat { path: PathBuf },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Polars(#[from] PolarsError),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Errors caused by a single bad request record. Everything else is fatal
    /// for the current command.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::UnknownCategoryValue { .. } | Error::OutOfRange { .. }
        )
    }

    pub(crate) fn dataset(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Error::DatasetLoadFailure {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn model(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Error::ModelLoadFailure {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_are_recoverable() {
        let unknown = Error::UnknownCategoryValue {
            field: "Sex",
            value: "X".to_string(),
        };
        assert!(unknown.is_validation());

        let range = Error::OutOfRange {
            field: "Age",
            value: 130.0,
            min: 1.0,
            max: 120.0,
        };
        assert!(range.is_validation());
        assert_eq!(range.to_string(), "Age value 130 outside [1, 120]");

        assert!(!Error::EmptyDataset.is_validation());
        assert!(!Error::model("model.json", "missing").is_validation());
    }
}
