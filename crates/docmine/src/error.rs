use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DocmineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Extraction error: {0}")]
    Extract(#[from] ExtractError),

    #[error("Job error: {0}")]
    Job(#[from] JobError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),
}

/// Errors surfaced by the extraction coordinator and its strategies.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Failed to read input '{path}': {source}")]
    Input {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Missing OCR service configuration: {0}")]
    MissingConfig(&'static str),

    #[error("OCR service request failed: {0}")]
    RemoteService(String),

    #[error("OCR service returned no analyzable content")]
    EmptyResult,

    #[error("Failed to parse PDF: {0}")]
    PdfParse(String),

    #[error("Failed to parse DOCX: {0}")]
    DocxParse(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Extraction cancelled")]
    Cancelled,
}

/// Errors from the job lifecycle layer.
#[derive(Error, Debug)]
pub enum JobError {
    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Invalid job transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Extraction failed: {0}")]
    Extract(#[from] ExtractError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

pub type Result<T> = std::result::Result<T, DocmineError>;
