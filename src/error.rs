use arrow::error::ArrowError;
use parquet::errors::ParquetError;
use thiserror::Error;

/// Everything that can go wrong while validating a specification or loading a file with it.
///
/// None of these are transient; they surface configuration or data-shape problems and are
/// returned to the caller as-is.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid value for '{key}': {reason}")]
    Configuration { key: String, reason: String },

    #[error("unable to convert into date: {0}")]
    InvalidDate(String),

    #[error("reader with name '{0}' not found")]
    UnknownReader(String),

    #[error("no file spec found for: {file}")]
    NoMatchingSpecification { file: String },

    #[error(
        "column '{field}' contains missing values; either fill all values or configure a default (file={file})"
    )]
    FieldMissingValue { field: String, file: String },

    #[error("filespec '{spec}' is inactive for date {date}")]
    Inactive { spec: String, date: String },

    #[error("column '{0}' not found in data")]
    ColumnNotFound(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Arrow(#[from] ArrowError),

    #[error(transparent)]
    Parquet(#[from] ParquetError),

    #[error(transparent)]
    Excel(#[from] calamine::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    pub(crate) fn config(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Configuration {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
