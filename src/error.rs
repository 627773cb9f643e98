//! Error types for recordstream

use thiserror::Error;

/// Result type alias for recorder operations
pub type Result<T> = std::result::Result<T, RecorderError>;

/// Main error type for all recorder operations
#[derive(Error, Debug)]
pub enum RecorderError {
    /// No destination path has been configured
    #[error("No output path configured; call set().path(..) first")]
    NoPath,

    /// Setting rejected by the configuration surface
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Data of the wrong shape or type for the output format
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    /// Malformed or zero-valued coordinate expression
    #[error("Invalid coordinate: {0}")]
    InvalidCoordinate(String),

    /// Record key that is not part of the header and cannot be added
    #[error("Column '{column}' is not in the header of '{target}'")]
    UnknownColumn { column: String, target: String },

    /// Named sheet or table does not exist
    #[error("Target '{target}' not found. Available: {available}")]
    MissingTarget { target: String, available: String },

    /// Operation the output format cannot perform
    #[error("Operation not supported: {0}")]
    NotSupported(String),

    /// Existing file content could not be interpreted
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// IO error wrapper
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Delimited text error wrapper
    #[error("CSV error: {0}")]
    Csv(String),

    /// JSON error wrapper
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// SQLite error wrapper
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Spreadsheet write error wrapper
    #[error("XLSX error: {0}")]
    Xlsx(String),

    /// Calamine error wrapper
    #[error("Calamine error: {0}")]
    Calamine(String),
}

impl From<csv::Error> for RecorderError {
    fn from(err: csv::Error) -> Self {
        RecorderError::Csv(err.to_string())
    }
}

impl From<umya_spreadsheet::XlsxError> for RecorderError {
    fn from(err: umya_spreadsheet::XlsxError) -> Self {
        RecorderError::Xlsx(err.to_string())
    }
}

impl From<calamine::Error> for RecorderError {
    fn from(err: calamine::Error) -> Self {
        RecorderError::Calamine(err.to_string())
    }
}

impl From<calamine::XlsxError> for RecorderError {
    fn from(err: calamine::XlsxError) -> Self {
        RecorderError::Calamine(err.to_string())
    }
}
