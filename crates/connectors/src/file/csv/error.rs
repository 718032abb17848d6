use thiserror::Error;

/// Structural problems that abort the whole upload.
#[derive(Debug, Error)]
pub enum FileError {
    #[error("File not found: {0}")]
    NotFound(String),
    #[error("Only CSV files are allowed: {0}")]
    InvalidFormat(String),
    #[error("CSV file appears to be empty")]
    MissingHeader,
    #[error("Missing required headers: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("CSV parsing error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("Error reading CSV file at row {row}: {message}")]
    ReadError { row: u64, message: String },
}
