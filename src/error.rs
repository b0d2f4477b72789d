use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported upload format: {0}")]
    UnsupportedFormat(String),

    #[error("Workbook could not be read: {0}")]
    Workbook(#[from] calamine::Error),

    #[error("CSV could not be read: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Extraction service error: {message}")]
    Extraction { message: String },

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Unknown staging session: {0}")]
    SessionNotFound(Uuid),

    #[error("Unknown candidate: {0}")]
    CandidateNotFound(Uuid),

    #[error("Candidate {0} is committed and can no longer be modified")]
    CandidateImmutable(Uuid),

    #[error("Invalid field value: {message}")]
    InvalidFieldValue { message: String },
}

pub type Result<T> = std::result::Result<T, IngestError>;
