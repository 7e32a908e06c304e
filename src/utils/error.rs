// src/utils/error.rs
use std::path::PathBuf;
use thiserror::Error;

// Define specific error types for different parts of the application
#[derive(Error, Debug)]
pub enum FilingError {
    #[error("Input directory {path} could not be read: {source}")]
    DirectoryUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Document {path} could not be read: {reason}")]
    DocumentUnreadable { path: PathBuf, reason: String },
}

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Malformed numeric capture: '{0}'")]
    MalformedNumber(String),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Malformed result row {row}: {reason}")]
    MalformedRow { row: usize, reason: String },
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error), // Automatically convert IO errors

    #[error("Filing retrieval failed: {0}")]
    Filing(#[from] FilingError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Data processing failed: {0}")]
    Processing(String),
}
