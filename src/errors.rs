use thiserror::Error;
use std::io;
use std::path::PathBuf;

/// Custom error types for the wheat rust analyzer
#[derive(Error, Debug)]
pub enum WheatRustError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to load configuration from {path}: {source}")]
    ConfigLoad {
        source: toml::de::Error,
        path: PathBuf,
    },

    #[error("Failed to load embedding model from {path}: {reason}")]
    ModelLoad {
        path: PathBuf,
        reason: String,
    },

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Reference bank error: {0}")]
    ReferenceBank(String),

    #[error("Morphology error: {0}")]
    Morphology(String),

    #[error("CSV output error: {0}")]
    CsvOutput(#[from] csv::Error),

    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("JSON output error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid input path: {0}")]
    InvalidPath(PathBuf),
}

/// Type alias for Result with our custom error type
pub type Result<T> = std::result::Result<T, WheatRustError>;
